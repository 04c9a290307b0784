use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "identity_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Provider family tag, currently only `OAUTH2`
    pub provider_type: String,

    /// Empty string means every external identifier is accepted.
    pub identifier_filter: String,

    /// Provider-specific JSON configuration
    #[sea_orm(column_type = "Text")]
    pub config: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
