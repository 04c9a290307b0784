use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::UserId;
use crate::entities::{prelude::*, user_access_tokens};

/// One entry of a user's token registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRecord {
    pub id: i32,
    pub user_id: UserId,
    pub access_token: String,
    pub description: String,
    pub issued_at: String,
    pub expires_at: String,
}

/// Repository for the per-user token registry
pub struct AccessTokenRepository {
    conn: DatabaseConnection,
}

impl AccessTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: user_access_tokens::Model) -> AccessTokenRecord {
        AccessTokenRecord {
            id: m.id,
            user_id: UserId::new(m.user_id),
            access_token: m.access_token,
            description: m.description,
            issued_at: m.issued_at,
            expires_at: m.expires_at,
        }
    }

    /// Record a token for a user. Re-recording the same token is a no-op.
    pub async fn upsert(
        &self,
        user_id: UserId,
        access_token: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.exists(user_id, access_token).await? {
            return Ok(());
        }

        let active = user_access_tokens::ActiveModel {
            user_id: Set(user_id.value()),
            access_token: Set(access_token.to_string()),
            description: Set(description.to_string()),
            issued_at: Set(Utc::now().to_rfc3339()),
            expires_at: Set(expires_at.to_rfc3339()),
            ..Default::default()
        };

        UserAccessTokens::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to record access token")?;

        Ok(())
    }

    pub async fn exists(&self, user_id: UserId, access_token: &str) -> Result<bool> {
        let count = UserAccessTokens::find()
            .filter(user_access_tokens::Column::UserId.eq(user_id.value()))
            .filter(user_access_tokens::Column::AccessToken.eq(access_token))
            .count(&self.conn)
            .await
            .context("Failed to look up access token")?;

        Ok(count > 0)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<AccessTokenRecord>> {
        let rows = UserAccessTokens::find()
            .filter(user_access_tokens::Column::UserId.eq(user_id.value()))
            .order_by_desc(user_access_tokens::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list access tokens")?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Delete one token owned by `user_id`. Returns whether a row was removed.
    pub async fn delete(&self, user_id: UserId, id: i32) -> Result<bool> {
        let res = UserAccessTokens::delete_many()
            .filter(user_access_tokens::Column::Id.eq(id))
            .filter(user_access_tokens::Column::UserId.eq(user_id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to delete access token")?;

        Ok(res.rows_affected > 0)
    }
}
