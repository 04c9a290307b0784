//! Signed, time-bounded bearer tokens.
//!
//! Access tokens are HS256 JWTs keyed by the process-wide [`ServerSecret`].
//! Verification is a pure function of the token, the secret and the clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::secret::ServerSecret;
use crate::domain::UserId;

pub const ACCESS_TOKEN_ISSUER: &str = "sigil";
pub const ACCESS_TOKEN_AUDIENCE: &str = "user.access-token";
/// Bumped when the signing scheme changes; tokens carrying another id are refused.
pub const KEY_ID: &str = "v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject email
    pub name: String,
    /// Subject user id, stringified as JWT requires
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<i32>()
            .ok()
            .filter(|id| *id >= 0)
            .map(UserId::new)
            .ok_or_else(|| TokenError::Malformed(format!("invalid subject: {}", self.sub)))
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Clone)]
pub struct TokenMinter {
    secret: ServerSecret,
}

impl TokenMinter {
    #[must_use]
    pub const fn new(secret: ServerSecret) -> Self {
        Self { secret }
    }

    pub fn mint(
        &self,
        email: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.mint_at(email, user_id, Utc::now(), expires_at)
    }

    pub fn mint_at(
        &self,
        email: &str,
        user_id: UserId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::Signing("server secret is empty".to_string()));
        }

        let header = Header {
            alg: Algorithm::HS256,
            kid: Some(KEY_ID.to_string()),
            ..Header::default()
        };

        let claims = AccessTokenClaims {
            name: email.to_string(),
            sub: user_id.to_string(),
            iss: ACCESS_TOKEN_ISSUER.to_string(),
            aud: ACCESS_TOKEN_AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify against an explicit clock. Expired means `now >= exp`.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessTokenClaims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if header.alg != Algorithm::HS256 {
            return Err(TokenError::Malformed(format!(
                "unexpected signing algorithm: {:?}",
                header.alg
            )));
        }

        if header.kid.as_deref() != Some(KEY_ID) {
            return Err(TokenError::Malformed("unexpected key id".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_issuer(&[ACCESS_TOKEN_ISSUER]);
        validation.set_audience(&[ACCESS_TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        })?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims.user_id()?;

        Ok(data.claims)
    }
}
