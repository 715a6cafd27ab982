//! Repository for validation state operations
//!
//! Validation states are a scheduling cursor only. Losing a row costs one
//! redundant check, never correctness.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::domain::models::EntityKind;
use crate::infrastructure::persistence::entities::validation_states;
use crate::infrastructure::persistence::error::DbError;

/// Repository for validation state operations
#[derive(Clone, Debug)]
pub struct ValidationStateRepository {
    conn: Arc<DatabaseConnection>,
}

impl ValidationStateRepository {
    /// Create a new ValidationStateRepository
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Get the validation state for one entity
    pub async fn get(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<Option<validation_states::Model>, DbError> {
        let result = validation_states::Entity::find_by_id((kind.as_str().to_string(), entity_id))
            .one(self.conn.as_ref())
            .await?;
        Ok(result)
    }

    /// Record the outcome of a check and schedule the next one
    ///
    /// `check_failed` counts transient failures (RPC trouble), not definitive
    /// invalid results; the consecutive counter resets on any clean check.
    pub async fn touch(
        &self,
        kind: EntityKind,
        entity_id: i64,
        check_failed: bool,
        next_check_at: DateTime<FixedOffset>,
    ) -> Result<(), DbError> {
        let now = Utc::now().fixed_offset();
        let existing = self.get(kind, entity_id).await?;

        match existing {
            Some(state) => {
                let failures = if check_failed {
                    state.consecutive_failures + 1
                } else {
                    0
                };
                let mut active: validation_states::ActiveModel = state.into();
                active.last_checked_at = Set(now);
                active.next_check_at = Set(next_check_at);
                active.consecutive_failures = Set(failures);
                active.update(self.conn.as_ref()).await?;
            }
            None => {
                let model = validation_states::ActiveModel {
                    entity_kind: Set(kind.as_str().to_string()),
                    entity_id: Set(entity_id),
                    last_checked_at: Set(now),
                    next_check_at: Set(next_check_at),
                    consecutive_failures: Set(if check_failed { 1 } else { 0 }),
                };
                match model.insert(self.conn.as_ref()).await {
                    Ok(_) => {}
                    Err(e) => {
                        // Concurrent first check; the other writer won
                        let err: DbError = e.into();
                        if !err.is_unique_violation() {
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
