use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::{CredentialHasher, ServerSecret, TokenMinter};
use crate::config::Config;
use crate::db::Store;
use crate::idp::{HttpProviderFactory, ProviderFactory};
use crate::services::{AuthService, SeaOrmAuthService, SeaOrmWorkspaceService, WorkspaceService};

/// Build a shared HTTP client with reasonable defaults for provider calls.
/// This client should be reused across all identity providers to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(
    timeout_seconds: u64,
    user_agent: &str,
) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(user_agent)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub workspace_service: Arc<dyn WorkspaceService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(
            config.sso.exchange_timeout_seconds,
            &config.sso.user_agent,
        )?;
        let providers = Arc::new(HttpProviderFactory::new(
            http_client,
            std::time::Duration::from_secs(config.sso.exchange_timeout_seconds),
        ));

        Self::with_providers(config, providers).await
    }

    /// Same as [`SharedState::new`] with a caller-supplied provider factory.
    pub async fn with_providers(
        config: Config,
        providers: Arc<dyn ProviderFactory>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let secret = ServerSecret::load_or_generate(&store, config.general.mode).await?;
        let minter = TokenMinter::new(secret);
        let hasher = CredentialHasher::new(&config.security)
            .map_err(|e| anyhow::anyhow!("Invalid credential hasher settings: {e}"))?;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            minter,
            hasher,
            providers,
            &config,
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let workspace_service = Arc::new(SeaOrmWorkspaceService::new(store.clone()))
            as Arc<dyn WorkspaceService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            auth_service,
            workspace_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
