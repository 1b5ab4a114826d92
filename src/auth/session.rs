use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{JwtCodec, SigningError};
use crate::errors::AppError;
use crate::models::user::{ActorTier, Role, UserAccount};
use crate::AppState;

const SESSION_AUDIENCE: &str = "labstock-session";

/// Claims carried by a login bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
}

pub struct SessionKeys {
    codec: JwtCodec,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            codec: JwtCodec::new(secret, SESSION_AUDIENCE),
            ttl,
        }
    }

    pub fn issue(&self, user: &UserAccount) -> Result<String, SigningError> {
        let claims = SessionClaims {
            sub: user.id,
            name: user.name.clone(),
            role: user.role,
        };
        self.codec.sign(&claims, self.ttl)
    }

    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.codec.verify(token).ok()
    }
}

/// Authenticated caller, decoded from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionClaims);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.sub
    }

    /// Fails with 403 unless the caller acts in an approval tier.
    pub fn require_tier(&self) -> Result<ActorTier, AppError> {
        self.0.role.tier().ok_or(AppError::Forbidden)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AppError::Unauthorized)?;

        match state.sessions.verify(token) {
            Some(claims) => Ok(AuthUser(claims)),
            None => {
                tracing::warn!("rejected bearer token on {}", parts.uri.path());
                Err(AppError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserStatus;
    use chrono::{NaiveDate, Utc};

    fn account(role: Role) -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            name: "Ravi".into(),
            email: "ravi@lab.org".into(),
            password_hash: String::new(),
            role,
            salutation: "Mr".into(),
            designation: "Other".into(),
            department: "Physics".into(),
            contact_number: "1".into(),
            joining_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            status: UserStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let keys = SessionKeys::new(b"k", Duration::minutes(60));
        let user = account(Role::Admin);
        let claims = keys.verify(&keys.issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_plain_user_has_no_tier() {
        let user = AuthUser(SessionClaims {
            sub: Uuid::new_v4(),
            name: "x".into(),
            role: Role::User,
        });
        assert!(matches!(user.require_tier(), Err(AppError::Forbidden)));
    }
}
