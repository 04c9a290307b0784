//! OAuth2 authorization-code provider.
//!
//! Builds the consent URL, trades the returned code for an access token and
//! maps the user-info JSON onto a profile through a configurable field mapping.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{IdentityProvider, IdentityProviderUserInfo, IdpError};

/// Names of the user-info JSON fields that carry each profile attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub identifier: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_info_url: String,
    pub scopes: Vec<String>,
    pub field_mapping: FieldMapping,
}

impl OAuth2Config {
    pub fn from_value(value: &Value) -> Result<Self, IdpError> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| IdpError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IdpError> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("token_url", &self.token_url),
            ("user_info_url", &self.user_info_url),
            ("field_mapping.identifier", &self.field_mapping.identifier),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(IdpError::InvalidConfig(format!("{name} is required")));
            }
        }

        Ok(())
    }

    /// Consent page URL the browser should be sent to.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, IdpError> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| IdpError::InvalidConfig(format!("auth_url: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code");
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            query.append_pair("state", state);
        }

        Ok(url.into())
    }

    /// Copy safe to hand to unauthenticated clients.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            client_secret: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Authorization-code flow against a generic OAuth2 server.
pub struct OAuth2Provider {
    config: OAuth2Config,
    client: Client,
    timeout: Duration,
}

impl OAuth2Provider {
    pub fn new(config: OAuth2Config, client: Client, timeout: Duration) -> Result<Self, IdpError> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            timeout,
        })
    }

    async fn request_token(&self, redirect_uri: &str, code: &str) -> Result<String, IdpError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| IdpError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdpError::Exchange(format!("status={status}, body={body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdpError::Exchange(format!("invalid token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(IdpError::Exchange(
                "token response has no access_token".to_string(),
            ));
        }

        Ok(token.access_token)
    }

    async fn request_profile(&self, access_token: &str) -> Result<Map<String, Value>, IdpError> {
        let response = self
            .client
            .get(&self.config.user_info_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| IdpError::ProfileFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdpError::ProfileFetch(format!("status={status}")));
        }

        response
            .json()
            .await
            .map_err(|e| IdpError::ProfileFetch(format!("invalid profile JSON: {e}")))
    }

    fn map_profile(&self, claims: &Map<String, Value>) -> Result<IdentityProviderUserInfo, IdpError> {
        let field = |name: &str| -> Option<String> {
            if name.is_empty() {
                return None;
            }
            claims
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        let mapping = &self.config.field_mapping;
        let identifier = field(&mapping.identifier).ok_or_else(|| {
            IdpError::ProfileFetch(format!(
                "profile is missing identifier field `{}`",
                mapping.identifier
            ))
        })?;

        Ok(IdentityProviderUserInfo {
            display_name: field(&mapping.display_name).unwrap_or_else(|| identifier.clone()),
            email: field(&mapping.email).unwrap_or_default(),
            identifier,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    async fn exchange_token(&self, redirect_uri: &str, code: &str) -> Result<String, IdpError> {
        let token = tokio::time::timeout(self.timeout, self.request_token(redirect_uri, code))
            .await
            .map_err(|_| IdpError::Exchange(format!("timed out after {:?}", self.timeout)))??;

        debug!(token_url = %self.config.token_url, "OAuth2 code exchanged");
        Ok(token)
    }

    async fn user_info(&self, access_token: &str) -> Result<IdentityProviderUserInfo, IdpError> {
        let claims = tokio::time::timeout(self.timeout, self.request_profile(access_token))
            .await
            .map_err(|_| IdpError::ProfileFetch(format!("timed out after {:?}", self.timeout)))??;

        self.map_profile(&claims)
    }
}
