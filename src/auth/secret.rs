//! Process-wide signing secret.
//!
//! Initialized once at startup and injected into the [`TokenMinter`]; it is
//! never mutated afterwards. Rotating it invalidates every issued token.
//!
//! [`TokenMinter`]: super::token::TokenMinter

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::Mode;
use crate::db::Store;

/// Workspace setting holding the generated secret.
pub const SECRET_SETTING_NAME: &str = "secret-session";

const DEV_SECRET: &str = "sigil-dev-secret";

#[derive(Clone)]
pub struct ServerSecret(Arc<str>);

impl ServerSecret {
    #[must_use]
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fetch the persisted secret, generating and storing one on first start.
    /// Development mode uses a fixed value instead.
    pub async fn load_or_generate(store: &Store, mode: Mode) -> Result<Self> {
        if mode == Mode::Dev {
            info!("Using development signing secret");
            return Ok(Self::new(DEV_SECRET));
        }

        let existing = store
            .get_workspace_setting(SECRET_SETTING_NAME)
            .await
            .context("Failed to read signing secret")?;

        let generated = uuid::Uuid::new_v4().to_string();

        let stored = match existing {
            Some(value) if !value.is_empty() => return Ok(Self::new(value)),
            // A blanked row would otherwise survive the insert below.
            Some(_) => {
                store
                    .set_workspace_setting(SECRET_SETTING_NAME, &generated)
                    .await
                    .context("Failed to replace empty signing secret")?;
                generated
            }
            // A concurrent first start may have won the race; keep whichever landed.
            None => store
                .insert_workspace_setting_if_absent(SECRET_SETTING_NAME, &generated)
                .await
                .context("Failed to persist signing secret")?,
        };

        if stored.is_empty() {
            anyhow::bail!("Signing secret {SECRET_SETTING_NAME} is empty");
        }

        info!("Generated new signing secret");
        Ok(Self::new(stored))
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSecret(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_leak() {
        let secret = ServerSecret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "ServerSecret(****)");
    }

    #[tokio::test]
    async fn prod_secret_is_generated_once_and_reused() {
        let store = Store::new("sqlite::memory:").await.unwrap();

        let first = ServerSecret::load_or_generate(&store, Mode::Prod)
            .await
            .unwrap();
        let second = ServerSecret::load_or_generate(&store, Mode::Prod)
            .await
            .unwrap();

        assert!(!first.is_empty());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[tokio::test]
    async fn empty_stored_secret_is_replaced() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        store
            .set_workspace_setting(SECRET_SETTING_NAME, "")
            .await
            .unwrap();

        let secret = ServerSecret::load_or_generate(&store, Mode::Prod)
            .await
            .unwrap();

        assert!(!secret.is_empty());
        let persisted = store
            .get_workspace_setting(SECRET_SETTING_NAME)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.as_bytes(), secret.as_bytes());

        let again = ServerSecret::load_or_generate(&store, Mode::Prod)
            .await
            .unwrap();
        assert_eq!(again.as_bytes(), secret.as_bytes());
    }

    #[tokio::test]
    async fn dev_secret_is_fixed() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let secret = ServerSecret::load_or_generate(&store, Mode::Dev)
            .await
            .unwrap();
        assert_eq!(secret.as_bytes(), DEV_SECRET.as_bytes());
        assert!(
            store
                .get_workspace_setting(SECRET_SETTING_NAME)
                .await
                .unwrap()
                .is_none()
        );
    }
}
