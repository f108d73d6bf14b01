//! Session tokens for signed-in users.
//!
//! The OAuth handshake happens elsewhere; once it yields an email and a
//! display name, the server mints an HS256 session token here and verifies
//! it on every request.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{domain::Owner, protocol::UserProfile};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub issuer: String,
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    jti: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub profile: UserProfile,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl VerifiedSession {
    pub fn owner(&self) -> &Owner {
        &self.profile.email
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing bearer token")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("session has been signed out")]
    Revoked,
    #[error("invalid session token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Invalid(err),
        }
    }
}

pub fn mint_session_token(
    cfg: &SessionConfig,
    profile: &UserProfile,
) -> Result<IssuedSession, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(cfg.ttl_seconds);
    let token_id = Uuid::new_v4().to_string();
    let claims = Claims {
        iss: cfg.issuer.clone(),
        sub: profile.email.as_str().to_string(),
        name: profile.name.clone(),
        jti: token_id.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?;
    Ok(IssuedSession {
        token,
        token_id,
        expires_at,
    })
}

pub fn verify_session_token(cfg: &SessionConfig, token: &str) -> Result<VerifiedSession, SessionError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[cfg.issuer.as_str()]);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )?;
    let claims = data.claims;
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| SessionError::Invalid(ErrorKind::InvalidToken.into()))?;

    Ok(VerifiedSession {
        profile: UserProfile {
            email: Owner(claims.sub),
            name: claims.name,
        },
        token_id: claims.jti,
        expires_at,
    })
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, SessionError> {
    let value = header_value.ok_or(SessionError::Missing)?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(SessionError::Missing);
    }
    Ok(token)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
