//! Domain service for sign-in and session issuance.
//!
//! Every sign-in path (password, sign-up, SSO) ends in the same issuance step:
//! mint a token, record it in the user's registry, then bind it to a cookie.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{CookieError, PasswordError, TokenError};
use crate::db::User;
use crate::db::repositories::access_token::AccessTokenRecord;
use crate::domain::{Role, RowStatus, UserId};
use crate::idp::IdpError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User has been archived")]
    UserArchived,

    #[error("Sign up is not allowed")]
    SignupDisabled,

    #[error("Invalid username: {0}")]
    InvalidUsernameFormat(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Identity provider not found")]
    ProviderNotFound,

    #[error(transparent)]
    Provider(#[from] IdpError),

    #[error("Identifier {0} is not allowed")]
    IdentifierRejected(String),

    #[error("Invalid identifier filter: {0}")]
    InvalidIdentifierFilter(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error(transparent)]
    Credential(#[from] PasswordError),

    /// Carries a cookie that clears the stale session, when one can be built.
    #[error("Unauthenticated")]
    Unauthenticated(Option<String>),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code, also used as the metrics outcome label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserNotFound => "user_not_found",
            Self::UserArchived => "user_archived",
            Self::SignupDisabled => "signup_disabled",
            Self::InvalidUsernameFormat(_) => "invalid_username",
            Self::InvalidPassword(_) => "invalid_password",
            Self::UserAlreadyExists(_) => "user_already_exists",
            Self::ProviderNotFound => "provider_not_found",
            Self::Provider(IdpError::Exchange(_)) => "provider_exchange_failed",
            Self::Provider(IdpError::ProfileFetch(_)) => "provider_profile_failed",
            Self::Provider(IdpError::InvalidConfig(_)) => "provider_invalid_config",
            Self::Provider(IdpError::Unsupported(_)) => "provider_unsupported",
            Self::IdentifierRejected(_) => "identifier_rejected",
            Self::InvalidIdentifierFilter(_) => "invalid_identifier_filter",
            Self::Token(TokenError::Expired) => "token_expired",
            Self::Token(TokenError::InvalidSignature) => "token_invalid_signature",
            Self::Token(TokenError::Malformed(_)) => "token_malformed",
            Self::Token(TokenError::Signing(_)) => "token_signing_failed",
            Self::Cookie(CookieError::MissingOrigin) => "missing_origin",
            Self::Credential(PasswordError::Hashing(_)) => "hashing_failed",
            Self::Credential(PasswordError::CorruptCredential(_)) => "corrupt_credential",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::Database(_) => "database_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Storage or runtime failure, as opposed to a rejected request.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

// Store methods report failures through anyhow.
impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Transport metadata the orchestrator needs from the inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request origin, used to pick cookie attributes.
    pub origin: Option<String>,
    /// Token presented via bearer header or session cookie.
    pub access_token: Option<String>,
}

/// User DTO for responses. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub email: String,
    pub nickname: String,
    pub row_status: RowStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            email: user.email,
            nickname: user.nickname,
            row_status: user.row_status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Outcome of a successful sign-in.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// Complete `Set-Cookie` header value.
    pub cookie: String,
}

/// Registry entry as exposed to the owning user.
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenInfo {
    pub id: i32,
    /// Tail of the token, enough to tell entries apart.
    pub token_preview: String,
    pub description: String,
    pub issued_at: String,
    pub expires_at: String,
}

impl From<AccessTokenRecord> for AccessTokenInfo {
    fn from(record: AccessTokenRecord) -> Self {
        let tail_start = record
            .access_token
            .char_indices()
            .rev()
            .nth(7)
            .map_or(0, |(i, _)| i);

        Self {
            id: record.id,
            token_preview: format!("...{}", &record.access_token[tail_start..]),
            description: record.description,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies a username/password pair and issues a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`], [`AuthError::UserArchived`] or
    /// [`AuthError::InvalidCredentials`] when the pair is not accepted.
    async fn sign_in(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        never_expire: bool,
    ) -> Result<Session, AuthError>;

    /// Registers an account and signs it in. The first account becomes HOST.
    async fn sign_up(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    /// Completes an authorization-code flow, provisioning the user if needed.
    async fn sign_in_with_sso(
        &self,
        ctx: &RequestContext,
        idp_id: i32,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session, AuthError>;

    /// Returns a cookie that clears the session.
    async fn sign_out(&self, ctx: &RequestContext) -> Result<String, AuthError>;

    /// Resolves the caller from the presented token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] with a clearing cookie when the
    /// token is absent, invalid, revoked or belongs to an archived user.
    async fn auth_status(&self, ctx: &RequestContext) -> Result<UserProfile, AuthError>;

    /// Resolves a token to its user without building cookies.
    async fn authenticate(&self, access_token: &str) -> Result<User, AuthError>;

    async fn list_access_tokens(&self, user_id: UserId) -> Result<Vec<AccessTokenInfo>, AuthError>;

    async fn revoke_access_token(&self, user_id: UserId, token_id: i32) -> Result<(), AuthError>;
}
