use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState};
use crate::db::WorkspaceGeneralSetting;

/// GET /workspace/general
pub async fn get_general_setting(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<WorkspaceGeneralSetting>>, ApiError> {
    let setting = state.workspace_service().general_setting(&actor).await?;
    Ok(Json(ApiResponse::success(setting)))
}

/// PUT /workspace/general
pub async fn update_general_setting(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(payload): Json<WorkspaceGeneralSetting>,
) -> Result<Json<ApiResponse<WorkspaceGeneralSetting>>, ApiError> {
    let setting = state
        .workspace_service()
        .update_general_setting(&actor, payload)
        .await?;
    Ok(Json(ApiResponse::success(setting)))
}
