//! Activity record entity for SeaORM
//!
//! Append-only; rows are never updated or deleted.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub asset_id: i64,
    /// One of: minted, burned, transferred, listed, listing_cancelled,
    /// listing_unfunded, offer_made, offer_unfunded, refunded, sold, expired
    pub event_type: String,
    pub actor: String,
    pub counterparty: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    /// Listing or offer id for protocol-sourced records
    pub order_id: Option<i64>,
    pub metadata: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
