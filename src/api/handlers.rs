use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password;
use crate::auth::session::AuthUser;
use crate::errors::AppError;
use crate::models::user::{Role, UserStatus};
use crate::workflow::submission::{NewChemicalForm, RegistrationForm, ScrapForm, Submission};
use crate::AppState;

#[derive(Serialize)]
pub struct SubmittedResponse {
    pub message: &'static str,
    pub request_id: Uuid,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

/// POST /register: creates a pending account and starts its approval.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<SubmittedResponse>), AppError> {
    let outcome = state.engine.submit(Submission::Registration(form)).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmittedResponse {
            message: "registration submitted for approval",
            request_id: outcome.request.id,
        }),
    ))
}

/// POST /login: only fully approved accounts receive a session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (Some(email), Some(secret)) = (payload.email, payload.password) else {
        return Err(AppError::BadRequest("email and password required".into()));
    };

    let user = state
        .store
        .find_user_by_email(email.trim())
        .await?
        .filter(|u| password::verify(&secret, &u.password_hash))
        .ok_or_else(|| AppError::BadRequest("invalid credentials".into()))?;

    if user.status != UserStatus::Approved {
        return Err(AppError::BadRequest("account is awaiting approval".into()));
    }

    let token = state
        .sessions
        .issue(&user)
        .map_err(|e| AppError::Internal(e.into()))?;
    tracing::info!(user_id = %user.id, "session issued");

    Ok(Json(LoginResponse {
        token,
        role: user.role,
    }))
}

/// POST /scrapRequest: multipart `chemicalId` + `scrapPhoto`.
pub async fn scrap_request(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<SubmittedResponse>, AppError> {
    let mut chemical_id = None;
    let mut photo: Option<(String, Bytes)> = None;
    let mut photo_fields = 0;

    // nothing touches disk until the whole body has parsed
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("chemicalId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                chemical_id = Some(text);
            }
            Some("scrapPhoto") => {
                photo_fields += 1;
                if photo_fields > 1 {
                    return Err(AppError::BadRequest("only one scrapPhoto may be sent".into()));
                }
                let original = field.file_name().unwrap_or("photo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !bytes.is_empty() {
                    photo = Some((original, bytes));
                }
            }
            _ => {}
        }
    }

    let saved = match &photo {
        Some((original, bytes)) => {
            Some(store_upload(&state.config.upload_dir, original, bytes).await?)
        }
        None => None,
    };
    let form = ScrapForm {
        chemical_id,
        scrap_photo: saved.as_ref().map(|p| p.to_string_lossy().into_owned()),
    };

    let result = state
        .engine
        .submit(Submission::Scrap {
            submitter_id: auth.id(),
            form,
        })
        .await;

    match result {
        Ok(outcome) => Ok(Json(SubmittedResponse {
            message: "scrap request sent for approval",
            request_id: outcome.request.id,
        })),
        Err(e) => {
            if let Some(path) = saved {
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("failed to remove orphaned upload {}: {}", path.display(), io);
                }
            }
            Err(e.into())
        }
    }
}

/// POST /newChemicalRequest: JSON `{chemicalName}`.
pub async fn new_chemical_request(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(form): Json<NewChemicalForm>,
) -> Result<Json<SubmittedResponse>, AppError> {
    let outcome = state
        .engine
        .submit(Submission::NewChemical {
            submitter_id: auth.id(),
            form,
        })
        .await?;
    Ok(Json(SubmittedResponse {
        message: "new chemical request sent for approval",
        request_id: outcome.request.id,
    }))
}

/// Writes an upload under `dir` with a collision-free name.
async fn store_upload(dir: &str, original: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir {}: {}", dir, e)))?;

    let path = FsPath::new(dir).join(format!("{}-{}", Uuid::new_v4(), sanitize_filename(original)));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write {}: {}", path.display(), e)))?;
    Ok(path)
}

/// Keeps only the final path component, restricted to a safe character set.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "photo".to_string()
    } else {
        cleaned.to_string()
    }
}
