//! Asset entity for SeaORM

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub token_id: String,
    pub owner_address: String,
    pub registered_at: DateTimeWithTimeZone,
    pub expires_at: DateTimeWithTimeZone,
    /// Group slugs this name belongs to (e.g. "999club", "3-letter")
    pub groups: Json,
    pub highest_offer_id: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
