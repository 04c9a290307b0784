use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, validation};
use crate::domain::{RowStatus, UserId};
use crate::services::UserProfile;

async fn set_row_status(
    state: &AppState,
    actor: &crate::db::User,
    id: i32,
    status: RowStatus,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    validation::validate_id(id, "user")?;

    let user = state
        .workspace_service()
        .set_user_row_status(actor, UserId::new(id), status)
        .await?;

    Ok(Json(ApiResponse::success(user)))
}

/// POST /users/{id}/archive
pub async fn archive_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    set_row_status(&state, &actor, id, RowStatus::Archived).await
}

/// POST /users/{id}/restore
pub async fn restore_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    set_row_status(&state, &actor, id, RowStatus::Normal).await
}
