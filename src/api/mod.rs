use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
mod identity_providers;
mod observability;
mod system;
mod types;
mod users;
mod validation;
mod workspace;

pub use error::{ApiError, ErrorCode};
pub use types::*;

use tokio::sync::RwLock;

use crate::services::{AuthService, WorkspaceService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn workspace_service(&self) -> &Arc<dyn WorkspaceService> {
        &self.shared.workspace_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

/// Cookies are only sent cross-site when the origin is listed explicitly,
/// so a wildcard entry mirrors the request origin instead of `*`.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|s| s.parse().ok()).collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin/sso", post(auth::sign_in_with_sso))
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/status", get(auth::auth_status))
        .route(
            "/identity-providers",
            get(identity_providers::list_identity_providers),
        )
        .route(
            "/identity-providers/{id}/authorize-url",
            get(identity_providers::authorize_url),
        )
        .route("/health", get(system::health))
        .with_state(state);

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(cors_layer(&cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/tokens", get(auth::list_tokens))
        .route("/auth/tokens/{id}", delete(auth::revoke_token))
        .route(
            "/identity-providers",
            post(identity_providers::create_identity_provider),
        )
        .route(
            "/identity-providers/{id}",
            delete(identity_providers::delete_identity_provider)
                .patch(identity_providers::update_identity_provider),
        )
        .route(
            "/workspace/general",
            get(workspace::get_general_setting).put(workspace::update_general_setting),
        )
        .route("/users/{id}/archive", post(users::archive_user))
        .route("/users/{id}/restore", post(users::restore_user))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
