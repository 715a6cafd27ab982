//! Durable Postgres-backed job queue
//!
//! At-least-once delivery: jobs are fetched with FOR UPDATE SKIP LOCKED so
//! multiple worker processes can drain the same topic. A job that throws is
//! retried with exponential backoff until max_retries, then parked in the
//! `failed` state where an operator can see it. Completed jobs are archived,
//! never deleted.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, Set, Statement,
};
use serde_json::Value;
use uuid::Uuid;

use crate::infrastructure::persistence::entities::jobs;
use crate::infrastructure::queue::error::QueueError;
use crate::utils::logging;

const DEFAULT_MAX_RETRIES: i32 = 3;
const BACKOFF_BASE_SECS: i64 = 30;

/// A fetched job ready for execution
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub topic: String,
    pub payload: Value,
    pub retry_count: i32,
    pub max_retries: i32,
}

/// Exponential backoff delay before the next attempt, in seconds
pub fn backoff_secs(retry_count: i32) -> i64 {
    BACKOFF_BASE_SECS * 2_i64.pow(retry_count.max(0) as u32)
}

/// Durable job queue over the jobs table
#[derive(Clone)]
pub struct JobQueue {
    conn: Arc<DatabaseConnection>,
}

impl JobQueue {
    /// Create a new JobQueue
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Enqueue a job for immediate execution
    pub async fn send(&self, topic: &str, payload: Value) -> Result<Uuid, QueueError> {
        self.insert(topic, payload, Utc::now().fixed_offset(), None)
            .await
    }

    /// Enqueue a job to run at a specific time
    pub async fn send_at(
        &self,
        topic: &str,
        payload: Value,
        start_after: chrono::DateTime<chrono::FixedOffset>,
    ) -> Result<Uuid, QueueError> {
        self.insert(topic, payload, start_after, None).await
    }

    /// Enqueue a job unless an unfinished job with the same singleton key exists
    ///
    /// Used by the cron schedulers so overlapping ticks collapse into one job.
    pub async fn send_singleton(
        &self,
        topic: &str,
        payload: Value,
        singleton_key: &str,
    ) -> Result<Option<Uuid>, QueueError> {
        let pending = jobs::Entity::find()
            .filter(jobs::Column::SingletonKey.eq(singleton_key))
            .filter(jobs::Column::State.is_in(["created", "active"]))
            .count(self.conn.as_ref())
            .await?;

        if pending > 0 {
            return Ok(None);
        }

        let id = self
            .insert(topic, payload, Utc::now().fixed_offset(), Some(singleton_key))
            .await?;
        Ok(Some(id))
    }

    async fn insert(
        &self,
        topic: &str,
        payload: Value,
        start_after: chrono::DateTime<chrono::FixedOffset>,
        singleton_key: Option<&str>,
    ) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        let now = Utc::now().fixed_offset();

        let model = jobs::ActiveModel {
            id: Set(id),
            topic: Set(topic.to_string()),
            payload: Set(payload),
            state: Set("created".to_string()),
            retry_count: Set(0),
            max_retries: Set(DEFAULT_MAX_RETRIES),
            singleton_key: Set(singleton_key.map(|s| s.to_string())),
            start_after: Set(start_after),
            started_at: Set(None),
            completed_at: Set(None),
            last_error: Set(None),
            created_at: Set(now),
        };

        model.insert(self.conn.as_ref()).await?;
        Ok(id)
    }

    /// Claim up to `limit` runnable jobs for one topic
    pub async fn fetch(&self, topic: &str, limit: u64) -> Result<Vec<Job>, QueueError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE jobs SET state = 'active', started_at = now()
            WHERE id IN (
                SELECT id FROM jobs
                WHERE topic = $1 AND state = 'created' AND start_after <= now()
                ORDER BY start_after
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, topic, payload, retry_count, max_retries
            "#,
            [topic.into(), (limit as i64).into()],
        );

        let rows = self.conn.query_all(stmt).await?;
        let mut fetched = Vec::with_capacity(rows.len());
        for row in rows {
            fetched.push(Job {
                id: row.try_get("", "id").map_err(QueueError::from)?,
                topic: row.try_get("", "topic").map_err(QueueError::from)?,
                payload: row.try_get("", "payload").map_err(QueueError::from)?,
                retry_count: row.try_get("", "retry_count").map_err(QueueError::from)?,
                max_retries: row.try_get("", "max_retries").map_err(QueueError::from)?,
            });
        }
        Ok(fetched)
    }

    /// Mark a job completed
    pub async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        if let Some(job) = jobs::Entity::find_by_id(id).one(self.conn.as_ref()).await? {
            let mut active: jobs::ActiveModel = job.into();
            active.state = Set("completed".to_string());
            active.completed_at = Set(Some(Utc::now().fixed_offset()));
            active.update(self.conn.as_ref()).await?;
        }
        Ok(())
    }

    /// Record a failed attempt; reschedule with backoff or park as failed
    pub async fn fail(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let job = match jobs::Entity::find_by_id(id).one(self.conn.as_ref()).await? {
            Some(job) => job,
            None => return Ok(()),
        };

        let attempts = job.retry_count + 1;
        let exhausted = attempts > job.max_retries;
        let mut active: jobs::ActiveModel = job.into();
        active.last_error = Set(Some(error.to_string()));

        if exhausted {
            active.state = Set("failed".to_string());
            active.completed_at = Set(Some(Utc::now().fixed_offset()));
            logging::log_error(&format!(
                "Job {} exhausted retries and was parked as failed: {}",
                id, error
            ));
        } else {
            let delay = backoff_secs(attempts - 1);
            active.state = Set("created".to_string());
            active.retry_count = Set(attempts);
            active.start_after =
                Set((Utc::now() + chrono::Duration::seconds(delay)).fixed_offset());
            logging::log_warning(&format!(
                "Job {} failed (attempt {}), retrying in {}s: {}",
                id, attempts, delay, error
            ));
        }

        active.update(self.conn.as_ref()).await?;
        Ok(())
    }

    /// Archive completed jobs older than the retention window
    ///
    /// Failed jobs are left in place; they are the operator's signal.
    pub async fn archive_completed(&self, older_than_secs: i64) -> Result<u64, QueueError> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(older_than_secs)).fixed_offset();
        let result = jobs::Entity::update_many()
            .col_expr(jobs::Column::State, sea_orm::sea_query::Expr::value("archived"))
            .filter(jobs::Column::State.eq("completed"))
            .filter(jobs::Column::CompletedAt.lt(cutoff))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    /// Count failed jobs, for operator visibility
    pub async fn failed_count(&self) -> Result<u64, QueueError> {
        let count = jobs::Entity::find()
            .filter(jobs::Column::State.eq("failed"))
            .count(self.conn.as_ref())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_secs(0), 30);
        assert_eq!(backoff_secs(1), 60);
        assert_eq!(backoff_secs(2), 120);
        assert_eq!(backoff_secs(3), 240);
    }

    #[test]
    fn test_backoff_clamps_negative_retry_count() {
        assert_eq!(backoff_secs(-1), 30);
    }
}
