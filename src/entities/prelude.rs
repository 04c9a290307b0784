pub use super::identity_providers::Entity as IdentityProviders;
pub use super::user_access_tokens::Entity as UserAccessTokens;
pub use super::users::Entity as Users;
pub use super::workspace_settings::Entity as WorkspaceSettings;
