use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::{Role, RowStatus, UserId};

pub mod migrator;
pub mod repositories;

pub use repositories::access_token::AccessTokenRecord;
pub use repositories::identity_provider::{
    IdentityProviderRecord, IdentityProviderUpdate, NewIdentityProvider,
};
pub use repositories::user::{NewUser, User};
pub use repositories::workspace_setting::WorkspaceGeneralSetting;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to an in-memory database sees its own empty
        // schema, so pin those to a single connection.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn access_token_repo(&self) -> repositories::access_token::AccessTokenRepository {
        repositories::access_token::AccessTokenRepository::new(self.conn.clone())
    }

    fn identity_provider_repo(&self) -> repositories::identity_provider::IdentityProviderRepository {
        repositories::identity_provider::IdentityProviderRepository::new(self.conn.clone())
    }

    fn workspace_setting_repo(&self) -> repositories::workspace_setting::WorkspaceSettingRepository {
        repositories::workspace_setting::WorkspaceSettingRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo()
            .get_by_username_with_password(username)
            .await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>> {
        self.user_repo().list_by_role(role).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<Option<User>> {
        self.user_repo().create(new_user).await
    }

    pub async fn set_user_row_status(&self, id: UserId, status: RowStatus) -> Result<Option<User>> {
        self.user_repo().set_row_status(id, status).await
    }

    // ========== Access Token Registry ==========

    pub async fn upsert_access_token(
        &self,
        user_id: UserId,
        access_token: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.access_token_repo()
            .upsert(user_id, access_token, description, expires_at)
            .await
    }

    pub async fn access_token_exists(&self, user_id: UserId, access_token: &str) -> Result<bool> {
        self.access_token_repo()
            .exists(user_id, access_token)
            .await
    }

    pub async fn list_access_tokens(&self, user_id: UserId) -> Result<Vec<AccessTokenRecord>> {
        self.access_token_repo().list_for_user(user_id).await
    }

    pub async fn delete_access_token(&self, user_id: UserId, id: i32) -> Result<bool> {
        self.access_token_repo().delete(user_id, id).await
    }

    // ========== Identity Providers ==========

    pub async fn get_identity_provider(&self, id: i32) -> Result<Option<IdentityProviderRecord>> {
        self.identity_provider_repo().get(id).await
    }

    pub async fn list_identity_providers(&self) -> Result<Vec<IdentityProviderRecord>> {
        self.identity_provider_repo().list().await
    }

    pub async fn create_identity_provider(
        &self,
        new: NewIdentityProvider,
    ) -> Result<IdentityProviderRecord> {
        self.identity_provider_repo().create(new).await
    }

    pub async fn update_identity_provider(
        &self,
        id: i32,
        update: IdentityProviderUpdate,
    ) -> Result<Option<IdentityProviderRecord>> {
        self.identity_provider_repo().update(id, update).await
    }

    pub async fn delete_identity_provider(&self, id: i32) -> Result<bool> {
        self.identity_provider_repo().delete(id).await
    }

    // ========== Workspace Settings ==========

    pub async fn get_workspace_setting(&self, name: &str) -> Result<Option<String>> {
        self.workspace_setting_repo().get(name).await
    }

    pub async fn set_workspace_setting(&self, name: &str, value: &str) -> Result<()> {
        self.workspace_setting_repo().upsert(name, value).await
    }

    pub async fn insert_workspace_setting_if_absent(&self, name: &str, value: &str) -> Result<String> {
        self.workspace_setting_repo()
            .insert_if_absent(name, value)
            .await
    }

    pub async fn get_general_setting(&self) -> Result<WorkspaceGeneralSetting> {
        self.workspace_setting_repo().general().await
    }

    pub async fn set_general_setting(&self, setting: &WorkspaceGeneralSetting) -> Result<()> {
        self.workspace_setting_repo().set_general(setting).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdentityProviderType;

    async fn store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            role,
            email: String::new(),
            nickname: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn create_user_reports_username_conflict_as_none() {
        let store = store().await;

        let alice = store
            .create_user(new_user("alice", Role::Host))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.role, Role::Host);
        assert_eq!(alice.row_status, RowStatus::Normal);

        let dup = store.create_user(new_user("alice", Role::User)).await.unwrap();
        assert!(dup.is_none());
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_by_role_and_archive() {
        let store = store().await;
        let host = store
            .create_user(new_user("host", Role::Host))
            .await
            .unwrap()
            .unwrap();
        store
            .create_user(new_user("bob", Role::User))
            .await
            .unwrap()
            .unwrap();

        let hosts = store.list_users_by_role(Role::Host).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].username, "host");

        let archived = store
            .set_user_row_status(host.id, RowStatus::Archived)
            .await
            .unwrap()
            .unwrap();
        assert!(archived.row_status.is_archived());

        let missing = store
            .set_user_row_status(UserId::new(999), RowStatus::Archived)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn access_token_registry_is_per_user() {
        let store = store().await;
        let alice = store
            .create_user(new_user("alice", Role::Host))
            .await
            .unwrap()
            .unwrap();
        let bob = store
            .create_user(new_user("bob", Role::User))
            .await
            .unwrap()
            .unwrap();
        let expires = Utc::now() + chrono::Duration::days(7);

        store
            .upsert_access_token(alice.id, "tok-a", "user login", expires)
            .await
            .unwrap();
        store
            .upsert_access_token(alice.id, "tok-a", "user login", expires)
            .await
            .unwrap();

        assert!(store.access_token_exists(alice.id, "tok-a").await.unwrap());
        assert!(!store.access_token_exists(bob.id, "tok-a").await.unwrap());

        let tokens = store.list_access_tokens(alice.id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].description, "user login");

        assert!(!store.delete_access_token(bob.id, tokens[0].id).await.unwrap());
        assert!(store.delete_access_token(alice.id, tokens[0].id).await.unwrap());
        assert!(!store.access_token_exists(alice.id, "tok-a").await.unwrap());
    }

    #[tokio::test]
    async fn identity_provider_crud() {
        let store = store().await;
        let created = store
            .create_identity_provider(NewIdentityProvider {
                name: "Corp".to_string(),
                provider_type: IdentityProviderType::OAuth2,
                identifier_filter: "^.*@corp\\.com$".to_string(),
                config: serde_json::json!({ "client_id": "abc" }),
            })
            .await
            .unwrap();

        let fetched = store
            .get_identity_provider(created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.config["client_id"], "abc");

        assert_eq!(store.list_identity_providers().await.unwrap().len(), 1);
        assert!(store.delete_identity_provider(created.id).await.unwrap());
        assert!(store.get_identity_provider(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn workspace_settings_insert_if_absent_keeps_first_value() {
        let store = store().await;

        let first = store
            .insert_workspace_setting_if_absent("secret-session", "one")
            .await
            .unwrap();
        let second = store
            .insert_workspace_setting_if_absent("secret-session", "two")
            .await
            .unwrap();
        assert_eq!(first, "one");
        assert_eq!(second, "one");

        assert_eq!(
            store.get_general_setting().await.unwrap(),
            WorkspaceGeneralSetting::default()
        );
        let setting = WorkspaceGeneralSetting {
            disallow_signup: true,
            disallow_password_login: false,
        };
        store.set_general_setting(&setting).await.unwrap();
        assert_eq!(store.get_general_setting().await.unwrap(), setting);
    }
}
