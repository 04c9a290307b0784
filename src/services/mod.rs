pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{
    AccessTokenInfo, AuthError, AuthService, RequestContext, Session, UserProfile,
};
pub use auth_service_impl::SeaOrmAuthService;

pub mod workspace_service;
pub mod workspace_service_impl;
pub use workspace_service::{
    CreateIdentityProvider, IdentityProviderView, UpdateIdentityProvider, WorkspaceService,
};
pub use workspace_service_impl::SeaOrmWorkspaceService;
