use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A message pinned to a coordinate.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spotted")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub owner_account_id: Uuid,
    #[sea_orm(belongs_to, from = "owner_account_id", to = "id")]
    pub owner: HasOne<super::account::Entity>,

    pub anonymous: bool,

    /// Mirrors the owner's `disabled` flag. Archived rows are hidden from every read.
    #[sea_orm(default_value = false)]
    pub archived: bool,

    pub latitude: f64,
    pub longitude: f64,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
