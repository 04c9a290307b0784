use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::auth::{CookieError, PasswordError, TokenError};
use crate::idp::IdpError;
use crate::services::AuthError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    InternalError(String),

    Unauthorized(String),

    Auth(AuthError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Auth(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

/// Status for each domain failure. The body code comes from [`AuthError::code`].
const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::Unauthenticated(_)
        | AuthError::Token(
            TokenError::Expired | TokenError::InvalidSignature | TokenError::Malformed(_),
        ) => StatusCode::UNAUTHORIZED,
        AuthError::UserNotFound | AuthError::ProviderNotFound => StatusCode::NOT_FOUND,
        AuthError::UserArchived
        | AuthError::SignupDisabled
        | AuthError::IdentifierRejected(_)
        | AuthError::PermissionDenied => StatusCode::FORBIDDEN,
        AuthError::InvalidUsernameFormat(_)
        | AuthError::InvalidPassword(_)
        | AuthError::InvalidIdentifierFilter(_)
        | AuthError::Provider(IdpError::InvalidConfig(_))
        | AuthError::Cookie(CookieError::MissingOrigin) => StatusCode::BAD_REQUEST,
        AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
        AuthError::Provider(IdpError::Exchange(_) | IdpError::ProfileFetch(_)) => {
            StatusCode::BAD_GATEWAY
        }
        AuthError::Provider(IdpError::Unsupported(_)) => StatusCode::NOT_IMPLEMENTED,
        AuthError::Token(TokenError::Signing(_))
        | AuthError::Credential(PasswordError::Hashing(_) | PasswordError::CorruptCredential(_))
        | AuthError::Database(_)
        | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut set_cookie = None;

        let (status, code, error_message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            ApiError::Auth(err) => {
                let status = auth_status(&err);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(code = err.code(), "Request failed: {}", err);
                    "An internal error occurred".to_string()
                } else {
                    if status == StatusCode::BAD_GATEWAY {
                        tracing::warn!(code = err.code(), "Identity provider error: {}", err);
                    }
                    err.to_string()
                };
                let code = err.code();
                if let AuthError::Unauthenticated(cookie) = err {
                    set_cookie = cookie;
                }
                (status, code, message)
            }
        };

        let body = ApiResponse::<()>::error(error_message, code);
        let mut response = match set_cookie {
            Some(cookie) => (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response(),
            None => (status, Json(body)).into_response(),
        };
        response.extensions_mut().insert(ErrorCode(code));
        response
    }
}

/// Machine-readable failure code, left on the response for request logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
