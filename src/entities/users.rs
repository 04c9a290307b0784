use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Lowercase login name, also the SSO external identifier for provisioned users.
    #[sea_orm(unique)]
    pub username: String,

    /// `HOST`, `ADMIN` or `USER`
    pub role: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    pub email: String,

    pub nickname: String,

    /// `NORMAL` or `ARCHIVED`
    pub row_status: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_access_tokens::Entity")]
    UserAccessTokens,
}

impl Related<super::user_access_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserAccessTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
