pub mod prelude;

pub mod identity_providers;
pub mod user_access_tokens;
pub mod users;
pub mod workspace_settings;
