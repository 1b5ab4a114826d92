//! HS256 JWT encoding shared by capability links and login sessions.
//!
//! Each use gets its own audience so a session token is never accepted as an
//! approval link and vice versa.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
}

impl VerificationError {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationError::Expired => "expired",
            VerificationError::Malformed => "malformed",
            VerificationError::BadSignature => "bad_signature",
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to sign token: {0}")]
pub struct SigningError(String);

/// Registered claims wrapped around the caller's own claims.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(flatten)]
    claims: T,
    aud: String,
    iat: i64,
    exp: i64,
    jti: String,
}

pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    audience: &'static str,
}

impl JwtCodec {
    pub fn new(secret: &[u8], audience: &'static str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            audience,
        }
    }

    pub fn sign<T: Serialize>(&self, claims: &T, ttl: Duration) -> Result<String, SigningError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| SigningError(format!("lifetime {} overflows the clock", ttl)))?;
        let envelope = Envelope {
            claims,
            aud: self.audience.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &envelope, &self.encoding)
            .map_err(|e| SigningError(e.to_string()))
    }

    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, VerificationError> {
        let data = decode::<Envelope<T>>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                ErrorKind::InvalidSignature => VerificationError::BadSignature,
                _ => VerificationError::Malformed,
            }
        })?;
        Ok(data.claims.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Demo {
        sub: String,
        n: u32,
    }

    fn demo() -> Demo {
        Demo { sub: "abc".into(), n: 7 }
    }

    #[test]
    fn test_sign_then_verify() {
        let codec = JwtCodec::new(b"secret", "demo");
        let token = codec.sign(&demo(), Duration::minutes(5)).unwrap();
        assert_eq!(codec.verify::<Demo>(&token).unwrap(), demo());
    }

    #[test]
    fn test_expired_token() {
        let codec = JwtCodec::new(b"secret", "demo");
        let token = codec.sign(&demo(), Duration::seconds(-5)).unwrap();
        assert_eq!(codec.verify::<Demo>(&token).unwrap_err(), VerificationError::Expired);
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let token = JwtCodec::new(b"secret", "demo")
            .sign(&demo(), Duration::minutes(5))
            .unwrap();
        let other = JwtCodec::new(b"other-secret", "demo");
        assert_eq!(
            other.verify::<Demo>(&token).unwrap_err(),
            VerificationError::BadSignature
        );
    }

    #[test]
    fn test_other_audience_is_rejected() {
        let token = JwtCodec::new(b"secret", "session")
            .sign(&demo(), Duration::minutes(5))
            .unwrap();
        let links = JwtCodec::new(b"secret", "capability");
        assert_eq!(
            links.verify::<Demo>(&token).unwrap_err(),
            VerificationError::Malformed
        );
    }

    #[test]
    fn test_unrepresentable_lifetime_is_a_signing_error() {
        let codec = JwtCodec::new(b"secret", "demo");
        assert!(codec.sign(&demo(), Duration::MAX).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = JwtCodec::new(b"secret", "demo");
        assert_eq!(
            codec.verify::<Demo>("not-a-token").unwrap_err(),
            VerificationError::Malformed
        );
    }
}
