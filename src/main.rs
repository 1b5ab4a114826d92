use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use labstock::auth::password;
use labstock::cli;
use labstock::config::{self, Config};
use labstock::models::user::{Role, UserAccount, UserStatus};
use labstock::store::memory::MemoryStore;
use labstock::store::postgres::PgStore;
use labstock::store::Datastore;
use labstock::workflow::token::{JwtTokenService, TokenService};
use labstock::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "labstock"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "labstock=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Actor { command }) => {
            let db = connect_db(&cfg).await?;
            handle_actor_command(&db, command).await
        }
        Some(cli::Commands::Request { command }) => {
            let db = connect_db(&cfg).await?;
            handle_request_command(cfg, db, command).await
        }
        Some(cli::Commands::Token { command }) => handle_token_command(&cfg, command),
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Admin commands need durable storage; the in-memory store would vanish on exit.
async fn connect_db(cfg: &Config) -> anyhow::Result<PgStore> {
    let url = cfg
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for this command")?;
    let db = PgStore::connect(url).await?;
    db.migrate().await?;
    Ok(db)
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store: Arc<dyn Datastore> = match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(cfg, store)?);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("labstock listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_actor_command(db: &PgStore, cmd: cli::ActorCommands) -> anyhow::Result<()> {
    match cmd {
        cli::ActorCommands::Create {
            name,
            email,
            password: secret,
            tier,
        } => {
            let user = UserAccount {
                id: Uuid::new_v4(),
                name,
                email: email.trim().to_lowercase(),
                password_hash: password::hash(&secret)?,
                role: Role::from(tier),
                salutation: "Dr".into(),
                designation: "Other".into(),
                department: "Administration".into(),
                contact_number: String::new(),
                joining_date: Utc::now().date_naive(),
                status: UserStatus::Approved,
                created_at: Utc::now(),
            };
            db.insert_user(&user)
                .await
                .with_context(|| format!("could not create {}", user.email))?;
            println!(
                "Actor created:\n  ID:    {}\n  Email: {}\n  Tier:  {}",
                user.id, user.email, tier
            );
        }
    }
    Ok(())
}

async fn handle_request_command(
    cfg: Config,
    db: PgStore,
    cmd: cli::RequestCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::RequestCommands::List { status } => {
            let requests = db.list_requests(status).await?;
            if requests.is_empty() {
                println!("No requests found.");
            } else {
                println!(
                    "{:<38} {:<18} {:<15} {:<24} {}",
                    "ID", "KIND", "STATUS", "SUBMITTER", "SUBJECT"
                );
                for r in requests {
                    println!(
                        "{:<38} {:<18} {:<15} {:<24} {}",
                        r.id, r.kind, r.status, r.submitter_name, r.subject_ref
                    );
                }
            }
        }
        cli::RequestCommands::Notify { id } => {
            let state = AppState::new(cfg, Arc::new(db))?;
            let reminder = state
                .engine
                .renotify(id)
                .await
                .with_context(|| format!("could not re-send links for {}", id))?;
            println!(
                "Links re-sent:\n  Request: {}\n  Status:  {}\n  Tier:    {}\n  Outcome: {}",
                reminder.request_id,
                reminder.status,
                reminder.tokens.tier,
                serde_json::to_string(&reminder.notification)?
            );
        }
    }
    Ok(())
}

fn handle_token_command(cfg: &Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Inspect { token } => {
            // accept a pasted link as well as a bare token
            let raw = token.trim_end_matches('/').rsplit('/').next().unwrap_or(&token);
            let service = JwtTokenService::new(cfg.jwt_secret.as_bytes());
            let claims = service
                .verify(raw)
                .map_err(|e| anyhow::anyhow!("token rejected: {}", e))?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }
    Ok(())
}
