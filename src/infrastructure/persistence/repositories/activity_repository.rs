//! Repository for the append-only activity ledger
//!
//! Writes are deduplicated by the event's source-specific natural key, and
//! every successful insert fires a pg_notify signal carrying only the new
//! row id; feed consumers fetch the full record themselves.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, Set, Statement,
};

use crate::domain::models::activity::dedup_cutoff;
use crate::domain::models::{ActivityEvent, ActivitySource};
use crate::infrastructure::persistence::entities::activity_records;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging;

const ACTIVITY_CHANNEL: &str = "nameswap_activity";

/// Repository for activity ledger operations
#[derive(Clone, Debug)]
pub struct ActivityRepository {
    conn: Arc<DatabaseConnection>,
    dedup_window_secs: i64,
}

impl ActivityRepository {
    /// Create a new ActivityRepository
    pub fn new(conn: Arc<DatabaseConnection>, dedup_window_secs: i64) -> Self {
        Self {
            conn,
            dedup_window_secs,
        }
    }

    /// Append an event unless its natural key already exists
    ///
    /// Returns the new record id, or None when the event was a duplicate.
    pub async fn append(&self, event: &ActivityEvent) -> Result<Option<i64>, DbError> {
        if self.is_duplicate(event).await? {
            logging::log_debug(&format!("Skipping duplicate activity event: {}", event));
            return Ok(None);
        }

        let model = activity_records::ActiveModel {
            asset_id: Set(event.asset_id),
            event_type: Set(event.event_type.clone()),
            actor: Set(event.actor.clone()),
            counterparty: Set(event.counterparty.clone()),
            price: Set(event.price),
            currency: Set(event.currency.clone()),
            tx_hash: Set(event.tx_hash.clone()),
            block_number: Set(event.block_number),
            order_id: Set(event.order_id),
            metadata: Set(event.metadata.clone()),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };

        let inserted = match model.insert(self.conn.as_ref()).await {
            Ok(inserted) => inserted,
            Err(e) => {
                let err: DbError = e.into();
                // A concurrent writer with the same natural key got there first
                if err.is_unique_violation() {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        self.notify(inserted.id).await?;
        Ok(Some(inserted.id))
    }

    async fn is_duplicate(&self, event: &ActivityEvent) -> Result<bool, DbError> {
        let count = match event.source {
            ActivitySource::Blockchain => {
                activity_records::Entity::find()
                    .filter(activity_records::Column::AssetId.eq(event.asset_id))
                    .filter(activity_records::Column::EventType.eq(event.event_type.clone()))
                    .filter(activity_records::Column::TxHash.eq(event.tx_hash.clone()))
                    .filter(activity_records::Column::BlockNumber.eq(event.block_number))
                    .filter(activity_records::Column::Actor.eq(event.actor.clone()))
                    .count(self.conn.as_ref())
                    .await?
            }
            ActivitySource::Protocol => {
                // Capture re-delivery tolerance: same order event inside the window
                let cutoff =
                    dedup_cutoff(Utc::now().fixed_offset(), self.dedup_window_secs);
                activity_records::Entity::find()
                    .filter(activity_records::Column::OrderId.eq(event.order_id))
                    .filter(activity_records::Column::EventType.eq(event.event_type.clone()))
                    .filter(activity_records::Column::CreatedAt.gte(cutoff))
                    .count(self.conn.as_ref())
                    .await?
            }
        };
        Ok(count > 0)
    }

    /// Lightweight change signal for real-time feed consumers
    async fn notify(&self, record_id: i64) -> Result<(), DbError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_notify($1, $2)",
            [ACTIVITY_CHANNEL.into(), record_id.to_string().into()],
        );
        self.conn.execute(stmt).await?;
        Ok(())
    }

    /// Recent sale records for one group's member assets
    pub async fn find_sales_for_assets(
        &self,
        asset_ids: &[i64],
    ) -> Result<Vec<activity_records::Model>, DbError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = activity_records::Entity::find()
            .filter(activity_records::Column::AssetId.is_in(asset_ids.to_vec()))
            .filter(activity_records::Column::EventType.eq("sold"))
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }
}
