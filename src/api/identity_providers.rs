//! Identity provider endpoints.
//!
//! Listing and consent-URL lookup are public so the login page can offer SSO
//! buttons; writes require the host account.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiResponse, AppState, AuthorizeUrlQuery, AuthorizeUrlResponse, MessageResponse,
    validation,
};
use crate::services::{CreateIdentityProvider, IdentityProviderView, UpdateIdentityProvider};

/// GET /identity-providers
pub async fn list_identity_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<IdentityProviderView>>>, ApiError> {
    let providers = state.workspace_service().list_identity_providers().await?;
    Ok(Json(ApiResponse::success(providers)))
}

/// POST /identity-providers
pub async fn create_identity_provider(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(mut payload): Json<CreateIdentityProvider>,
) -> Result<Json<ApiResponse<IdentityProviderView>>, ApiError> {
    payload.name = validation::validate_provider_name(&payload.name)?.to_string();

    let created = state
        .workspace_service()
        .create_identity_provider(&actor, payload)
        .await?;

    Ok(Json(ApiResponse::success(created)))
}

/// PATCH /identity-providers/{id}
///
/// Only the fields present in the body change.
pub async fn update_identity_provider(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(mut payload): Json<UpdateIdentityProvider>,
) -> Result<Json<ApiResponse<IdentityProviderView>>, ApiError> {
    validation::validate_id(id, "identity provider")?;
    if let Some(name) = &payload.name {
        payload.name = Some(validation::validate_provider_name(name)?.to_string());
    }

    let updated = state
        .workspace_service()
        .update_identity_provider(&actor, id, payload)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /identity-providers/{id}
pub async fn delete_identity_provider(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_id(id, "identity provider")?;

    state
        .workspace_service()
        .delete_identity_provider(&actor, id)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Identity provider {id} deleted"),
    })))
}

/// GET /identity-providers/{id}/authorize-url?redirect_uri=...&state=...
pub async fn authorize_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<AuthorizeUrlQuery>,
) -> Result<Json<ApiResponse<AuthorizeUrlResponse>>, ApiError> {
    validation::validate_id(id, "identity provider")?;
    validation::validate_redirect_uri(&query.redirect_uri)?;

    let url = state
        .workspace_service()
        .authorization_url(id, &query.redirect_uri, &query.state)
        .await?;

    Ok(Json(ApiResponse::success(AuthorizeUrlResponse { url })))
}
