//! Validation state entity for SeaORM
//!
//! One row per (entity kind, entity id). Purely a scheduling cursor for the
//! funding validation engine, never a source of truth.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "validation_states")]
pub struct Model {
    /// "listing" or "offer"
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_kind: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_id: i64,
    pub last_checked_at: DateTimeWithTimeZone,
    pub next_check_at: DateTimeWithTimeZone,
    pub consecutive_failures: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
