use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::domain::{IdentityProviderType, UnknownVariant};
use crate::entities::{identity_providers, prelude::*};

/// Stored SSO configuration. `config` is provider-specific and interpreted by
/// the provider family named in `provider_type`.
///
/// The type tag is kept as stored so rows written by a newer build surface as
/// an unsupported provider rather than a corrupt table.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityProviderRecord {
    pub id: i32,
    pub name: String,
    pub provider_type: String,
    pub identifier_filter: String,
    pub config: serde_json::Value,
    pub created_at: String,
}

impl TryFrom<identity_providers::Model> for IdentityProviderRecord {
    type Error = anyhow::Error;

    fn try_from(m: identity_providers::Model) -> Result<Self> {
        Ok(Self {
            id: m.id,
            config: serde_json::from_str(&m.config)
                .with_context(|| format!("Corrupt config for identity provider {}", m.id))?,
            name: m.name,
            provider_type: m.provider_type,
            identifier_filter: m.identifier_filter,
            created_at: m.created_at,
        })
    }
}

impl IdentityProviderRecord {
    pub fn kind(&self) -> std::result::Result<IdentityProviderType, UnknownVariant> {
        self.provider_type.parse()
    }
}

#[derive(Debug, Clone)]
pub struct NewIdentityProvider {
    pub name: String,
    pub provider_type: IdentityProviderType,
    pub identifier_filter: String,
    pub config: serde_json::Value,
}

/// Fields to change on an existing provider; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct IdentityProviderUpdate {
    pub name: Option<String>,
    pub identifier_filter: Option<String>,
    pub config: Option<serde_json::Value>,
}

pub struct IdentityProviderRepository {
    conn: DatabaseConnection,
}

impl IdentityProviderRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<IdentityProviderRecord>> {
        let row = IdentityProviders::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query identity provider")?;

        row.map(IdentityProviderRecord::try_from).transpose()
    }

    pub async fn list(&self) -> Result<Vec<IdentityProviderRecord>> {
        let rows = IdentityProviders::find()
            .order_by_asc(identity_providers::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list identity providers")?;

        rows.into_iter()
            .map(IdentityProviderRecord::try_from)
            .collect()
    }

    pub async fn create(&self, new: NewIdentityProvider) -> Result<IdentityProviderRecord> {
        let active = identity_providers::ActiveModel {
            name: Set(new.name),
            provider_type: Set(new.provider_type.as_str().to_string()),
            identifier_filter: Set(new.identifier_filter),
            config: Set(new.config.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to create identity provider")?;

        IdentityProviderRecord::try_from(model)
    }

    pub async fn update(
        &self,
        id: i32,
        update: IdentityProviderUpdate,
    ) -> Result<Option<IdentityProviderRecord>> {
        let Some(model) = IdentityProviders::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query identity provider")?
        else {
            return Ok(None);
        };

        let mut active: identity_providers::ActiveModel = model.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(filter) = update.identifier_filter {
            active.identifier_filter = Set(filter);
        }
        if let Some(config) = update.config {
            active.config = Set(config.to_string());
        }

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update identity provider")?;

        IdentityProviderRecord::try_from(model).map(Some)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let res = IdentityProviders::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete identity provider")?;

        Ok(res.rows_affected > 0)
    }
}
