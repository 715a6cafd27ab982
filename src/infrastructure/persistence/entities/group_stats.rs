//! Group statistics entity for SeaORM

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "group_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_slug: String,
    pub floor_price: Option<Decimal>,
    pub sale_volume: Decimal,
    pub sale_count: i64,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
