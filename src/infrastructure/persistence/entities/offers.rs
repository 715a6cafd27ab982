//! Offer entity for SeaORM

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub asset_id: i64,
    pub buyer_address: String,
    pub amount: Decimal,
    /// Token contract address, or "eth" for the native currency
    pub currency: String,
    pub expires_at: DateTimeWithTimeZone,
    /// One of: pending, unfunded, accepted, rejected, expired
    pub status: String,
    pub unfunded_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
