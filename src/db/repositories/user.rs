use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use crate::domain::{Role, RowStatus, UserId};
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub email: String,
    pub nickname: String,
    pub row_status: RowStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        Ok(Self {
            id: UserId::new(model.id),
            role: model
                .role
                .parse()
                .with_context(|| format!("Corrupt role for user {}", model.id))?,
            row_status: model
                .row_status
                .parse()
                .with_context(|| format!("Corrupt row status for user {}", model.id))?,
            username: model.username,
            email: model.email,
            nickname: model.nickname,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Fields required to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
    pub email: String,
    pub nickname: String,
    pub password_hash: String,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(User::try_from).transpose()
    }

    /// Get user by username together with the stored password hash
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(|u| {
            let password_hash = u.password_hash.clone();
            User::try_from(u).map(|user| (user, password_hash))
        })
        .transpose()
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(User::try_from).transpose()
    }

    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users by role")?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn count(&self) -> Result<u64> {
        users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    /// Insert a new user.
    ///
    /// Returns `Ok(None)` when the username is already taken, so callers racing
    /// on the same name can fall back to a lookup instead of failing.
    pub async fn create(&self, new_user: NewUser) -> Result<Option<User>> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new_user.username),
            role: Set(new_user.role.as_str().to_string()),
            password_hash: Set(new_user.password_hash),
            email: Set(new_user.email),
            nickname: Set(new_user.nickname),
            row_status: Set(RowStatus::Normal.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => User::try_from(model).map(Some),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to create user")),
        }
    }

    pub async fn set_row_status(&self, id: UserId, status: RowStatus) -> Result<Option<User>> {
        let Some(user) = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user for row status update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        active.row_status = Set(status.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        let model = active.update(&self.conn).await?;

        User::try_from(model).map(Some)
    }
}
