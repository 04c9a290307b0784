use axum::{
    Extension, Json,
    extract::{FromRequestParts, Path, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use std::convert::Infallible;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, MessageResponse, SessionResponse, SignInRequest,
    SignInWithSsoRequest, SignUpRequest, validation,
};
use crate::auth::token_from_cookie_header;
use crate::db::User;
use crate::services::{AccessTokenInfo, RequestContext, Session, UserProfile};

/// Authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ============================================================================
// Request metadata
// ============================================================================

/// Origin of the request: the `Origin` header, else the origin of `Referer`.
///
/// Browsers omit `Origin` on some same-origin requests while still sending
/// `Referer`. The result only picks cookie attributes and never authorizes.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(origin.to_string());
    }

    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| url::Url::parse(v).ok())
        .map(|url| url.origin())
        .filter(url::Origin::is_tuple)
        .map(|origin| origin.ascii_serialization())
}

/// Token from `Authorization: Bearer`, falling back to the session cookie.
fn request_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(ToString::to_string)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            origin: request_origin(&parts.headers),
            access_token: request_token(&parts.headers),
        })
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware that accepts:
/// 1. `Authorization: Bearer <jwt>` header
/// 2. Session cookie
///
/// The token must verify, still be in the user's registry and belong to a
/// user that is not archived.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = request_token(request.headers()) else {
        return Err(ApiError::Unauthorized("Missing access token".to_string()));
    };

    match state.auth_service().authenticate(&token).await {
        Ok(user) => {
            tracing::Span::current().record("user_id", user.id.value());
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        Err(e) if e.is_infrastructure() => Err(e.into()),
        Err(e) => {
            tracing::debug!(reason = e.code(), "Rejected access token");
            Err(ApiError::Unauthorized("Invalid access token".to_string()))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn session_response(session: Session) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, session.cookie)],
        Json(ApiResponse::success(SessionResponse {
            user: session.user,
            expires_at: session.expires_at.to_rfc3339(),
        })),
    )
}

/// POST /auth/signin
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_required("username", &payload.username)?;
    validation::validate_required("password", &payload.password)?;

    let session = state
        .auth_service()
        .sign_in(&ctx, &payload.username, &payload.password, payload.never_expire)
        .await?;

    Ok(session_response(session))
}

/// POST /auth/signup
/// The first account on an instance becomes the host.
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .auth_service()
        .sign_up(&ctx, &payload.username, &payload.password)
        .await?;

    Ok(session_response(session))
}

/// POST /auth/signin/sso
pub async fn sign_in_with_sso(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(payload): Json<SignInWithSsoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_id(payload.idp_id, "identity provider")?;
    validation::validate_required("code", &payload.code)?;
    validation::validate_redirect_uri(&payload.redirect_uri)?;

    let session = state
        .auth_service()
        .sign_in_with_sso(&ctx, payload.idp_id, &payload.redirect_uri, &payload.code)
        .await?;

    Ok(session_response(session))
}

/// POST /auth/signout
/// Clears the cookie only; the token stays in the registry until revoked.
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let cookie = state.auth_service().sign_out(&ctx).await?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(MessageResponse {
            message: "Signed out".to_string(),
        })),
    ))
}

/// GET /auth/status
pub async fn auth_status(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let user = state.auth_service().auth_status(&ctx).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// GET /auth/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<AccessTokenInfo>>>, ApiError> {
    let tokens = state.auth_service().list_access_tokens(user.id).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

/// DELETE /auth/tokens/{id}
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_id(id, "token")?;

    state
        .auth_service()
        .revoke_access_token(user.id, id)
        .await
        .map_err(|e| match e {
            crate::services::AuthError::Unauthenticated(_) => ApiError::not_found("Token", id),
            other => other.into(),
        })?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Token revoked".to_string(),
    })))
}
