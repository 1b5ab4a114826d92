//! Capability tokens: signed, expiring claims that authorize exactly one stage
//! transition on one request.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt::{JwtCodec, SigningError, VerificationError};
use crate::models::approval::RequestKind;
use crate::models::user::ActorTier;

const CAPABILITY_AUDIENCE: &str = "labstock-capability";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Deny => "deny",
        }
    }
}

/// The action is part of the signed payload, so an approve link can never be
/// replayed against a deny endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    pub request_id: Uuid,
    pub subject_id: String,
    pub kind: RequestKind,
    pub action: Decision,
    pub stage: ActorTier,
}

pub trait TokenService: Send + Sync {
    fn issue(&self, claims: &CapabilityClaims, ttl: Duration) -> Result<String, SigningError>;

    fn verify(&self, token: &str) -> Result<CapabilityClaims, VerificationError>;
}

/// HS256 JWT implementation. No revocation list: replay safety comes from the
/// workflow's status guard.
pub struct JwtTokenService {
    codec: JwtCodec,
}

impl JwtTokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            codec: JwtCodec::new(secret, CAPABILITY_AUDIENCE),
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, claims: &CapabilityClaims, ttl: Duration) -> Result<String, SigningError> {
        self.codec.sign(claims, ttl)
    }

    fn verify(&self, token: &str) -> Result<CapabilityClaims, VerificationError> {
        self.codec.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(action: Decision) -> CapabilityClaims {
        CapabilityClaims {
            request_id: Uuid::new_v4(),
            subject_id: "CHEM-001".into(),
            kind: RequestKind::ScrapRequest,
            action,
            stage: ActorTier::SuperAdmin,
        }
    }

    #[test]
    fn test_claims_survive_signing() {
        let svc = JwtTokenService::new(b"lab-secret");
        let c = claims(Decision::Deny);
        let token = svc.issue(&c, Duration::days(7)).unwrap();
        assert_eq!(svc.verify(&token).unwrap(), c);
    }

    #[test]
    fn test_token_is_url_path_safe() {
        let svc = JwtTokenService::new(b"lab-secret");
        let token = svc.issue(&claims(Decision::Approve), Duration::days(7)).unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
    }

    #[test]
    fn test_expired_token_fails_verification() {
        let svc = JwtTokenService::new(b"lab-secret");
        let token = svc.issue(&claims(Decision::Approve), Duration::seconds(-1)).unwrap();
        assert_eq!(svc.verify(&token).unwrap_err(), VerificationError::Expired);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let svc = JwtTokenService::new(b"lab-secret");
        let token = svc.issue(&claims(Decision::Approve), Duration::days(7)).unwrap();
        let deny = svc.issue(&claims(Decision::Deny), Duration::days(7)).unwrap();
        // splice the deny payload onto the approve signature
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = deny.split('.').nth(1).unwrap();
        let forged = parts.join(".");
        assert_eq!(svc.verify(&forged).unwrap_err(), VerificationError::BadSignature);
    }
}
