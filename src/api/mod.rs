use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::workflow::links::link_routes;
use crate::AppState;

pub mod handlers;
pub mod inventory;
pub mod links;

/// Scrap photos are the largest bodies we accept.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Build the full HTTP application.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/scrapRequest", post(handlers::scrap_request))
        .route("/newChemicalRequest", post(handlers::new_chemical_request))
        .route("/addChemical", post(inventory::add_chemical))
        .route("/requestChemical", post(inventory::request_chemical))
        .route("/getchemicals", get(inventory::get_chemicals))
        .route("/getUserChemicals", get(inventory::get_user_chemicals));

    // one GET route per (kind, tier, decision); the intent is fixed by the path
    for (path, intent) in link_routes() {
        app = app.route(
            &format!("{}/:token", path),
            get(
                move |State(state): State<Arc<AppState>>, Path(token): Path<String>| async move {
                    links::resolve_link(state, token, intent).await
                },
            ),
        );
    }

    let dashboard_origin = state.config.dashboard_origin.clone();

    app.with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::metrics::encode_metrics(),
    )
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response. Approval tokens travel in
/// URLs, so responses must not be cached or leak a referrer.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.remove("server");

    resp
}
