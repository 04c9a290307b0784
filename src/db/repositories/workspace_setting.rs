use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use serde::{Deserialize, Serialize};

use crate::entities::{prelude::*, workspace_settings};

pub const GENERAL_SETTING_NAME: &str = "general";

/// Instance-wide switches consulted by sign-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceGeneralSetting {
    pub disallow_signup: bool,
    pub disallow_password_login: bool,
}

pub struct WorkspaceSettingRepository {
    conn: DatabaseConnection,
}

impl WorkspaceSettingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        let row = WorkspaceSettings::find_by_id(name.to_string())
            .one(&self.conn)
            .await
            .with_context(|| format!("Failed to read workspace setting {name}"))?;

        Ok(row.map(|r| r.value))
    }

    pub async fn upsert(&self, name: &str, value: &str) -> Result<()> {
        let active = workspace_settings::ActiveModel {
            name: Set(name.to_string()),
            value: Set(value.to_string()),
        };

        WorkspaceSettings::insert(active)
            .on_conflict(
                OnConflict::column(workspace_settings::Column::Name)
                    .update_column(workspace_settings::Column::Value)
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .with_context(|| format!("Failed to write workspace setting {name}"))?;

        Ok(())
    }

    /// Insert `value` unless a setting already exists; returns whichever value
    /// is stored afterwards.
    pub async fn insert_if_absent(&self, name: &str, value: &str) -> Result<String> {
        let active = workspace_settings::ActiveModel {
            name: Set(name.to_string()),
            value: Set(value.to_string()),
        };

        WorkspaceSettings::insert(active)
            .on_conflict(
                OnConflict::column(workspace_settings::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .with_context(|| format!("Failed to write workspace setting {name}"))?;

        self.get(name)
            .await?
            .with_context(|| format!("Workspace setting {name} vanished after insert"))
    }

    pub async fn general(&self) -> Result<WorkspaceGeneralSetting> {
        match self.get(GENERAL_SETTING_NAME).await? {
            Some(raw) => serde_json::from_str(&raw).context("Corrupt general workspace setting"),
            None => Ok(WorkspaceGeneralSetting::default()),
        }
    }

    pub async fn set_general(&self, setting: &WorkspaceGeneralSetting) -> Result<()> {
        let raw = serde_json::to_string(setting)?;
        self.upsert(GENERAL_SETTING_NAME, &raw).await
    }
}
