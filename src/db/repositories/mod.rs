pub mod access_token;
pub mod identity_provider;
pub mod user;
pub mod workspace_setting;
