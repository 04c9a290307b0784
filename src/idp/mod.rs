//! Pluggable SSO backends.
//!
//! Each provider family implements [`IdentityProvider`]. The session
//! orchestrator only ever sees the trait; a [`ProviderFactory`] turns a stored
//! provider row into the right implementation based on its type tag.

pub mod oauth2;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::db::IdentityProviderRecord;
use crate::domain::IdentityProviderType;

pub use oauth2::{FieldMapping, OAuth2Config, OAuth2Provider};

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Failed to fetch user profile: {0}")]
    ProfileFetch(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported identity provider type: {0}")]
    Unsupported(String),
}

/// Profile returned by a provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderUserInfo {
    pub identifier: String,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trade an authorization code for a provider access token.
    async fn exchange_token(&self, redirect_uri: &str, code: &str) -> Result<String, IdpError>;

    /// Fetch the profile behind a provider access token.
    async fn user_info(&self, access_token: &str) -> Result<IdentityProviderUserInfo, IdpError>;
}

pub trait ProviderFactory: Send + Sync {
    fn build(&self, record: &IdentityProviderRecord) -> Result<Box<dyn IdentityProvider>, IdpError>;
}

/// Builds network-backed providers sharing one HTTP client.
#[derive(Clone)]
pub struct HttpProviderFactory {
    client: reqwest::Client,
    exchange_timeout: Duration,
}

impl HttpProviderFactory {
    #[must_use]
    pub const fn new(client: reqwest::Client, exchange_timeout: Duration) -> Self {
        Self {
            client,
            exchange_timeout,
        }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, record: &IdentityProviderRecord) -> Result<Box<dyn IdentityProvider>, IdpError> {
        match record
            .kind()
            .map_err(|_| IdpError::Unsupported(record.provider_type.clone()))?
        {
            IdentityProviderType::OAuth2 => {
                let config = OAuth2Config::from_value(&record.config)?;
                let provider =
                    OAuth2Provider::new(config, self.client.clone(), self.exchange_timeout)?;
                Ok(Box::new(provider))
            }
        }
    }
}
