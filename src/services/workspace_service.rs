//! Domain service for instance administration: identity providers, the
//! general workspace setting and account lifecycle.

use serde::{Deserialize, Serialize};

use crate::db::{IdentityProviderRecord, User, WorkspaceGeneralSetting};
use crate::domain::{IdentityProviderType, RowStatus, UserId};
use crate::services::auth_service::{AuthError, UserProfile};

/// Identity provider as shown to clients. Secrets are stripped.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityProviderView {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub identifier_filter: String,
    pub config: serde_json::Value,
}

impl From<IdentityProviderRecord> for IdentityProviderView {
    fn from(record: IdentityProviderRecord) -> Self {
        let mut config = record.config;
        if let Some(obj) = config.as_object_mut() {
            obj.remove("client_secret");
        }

        Self {
            id: record.id,
            name: record.name,
            provider_type: record.provider_type,
            identifier_filter: record.identifier_filter,
            config,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIdentityProvider {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: IdentityProviderType,
    #[serde(default)]
    pub identifier_filter: String,
    pub config: serde_json::Value,
}

/// Partial update; absent fields keep their stored value. A config without a
/// `client_secret` keeps the stored secret, since views never return it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateIdentityProvider {
    pub name: Option<String>,
    pub identifier_filter: Option<String>,
    pub config: Option<serde_json::Value>,
}

#[async_trait::async_trait]
pub trait WorkspaceService: Send + Sync {
    async fn list_identity_providers(&self) -> Result<Vec<IdentityProviderView>, AuthError>;

    /// HOST only.
    async fn create_identity_provider(
        &self,
        actor: &User,
        input: CreateIdentityProvider,
    ) -> Result<IdentityProviderView, AuthError>;

    /// HOST only. The provider keeps its id.
    async fn update_identity_provider(
        &self,
        actor: &User,
        id: i32,
        input: UpdateIdentityProvider,
    ) -> Result<IdentityProviderView, AuthError>;

    /// HOST only.
    async fn delete_identity_provider(&self, actor: &User, id: i32) -> Result<(), AuthError>;

    /// Consent URL for starting an SSO login against provider `id`.
    async fn authorization_url(
        &self,
        id: i32,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, AuthError>;

    /// HOST only.
    async fn general_setting(&self, actor: &User) -> Result<WorkspaceGeneralSetting, AuthError>;

    /// HOST only.
    async fn update_general_setting(
        &self,
        actor: &User,
        setting: WorkspaceGeneralSetting,
    ) -> Result<WorkspaceGeneralSetting, AuthError>;

    /// HOST or ADMIN. Archived users can no longer sign in.
    async fn set_user_row_status(
        &self,
        actor: &User,
        user_id: UserId,
        status: RowStatus,
    ) -> Result<UserProfile, AuthError>;
}
