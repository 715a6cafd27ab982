//! Change sources for the capture engine
//!
//! Two interchangeable implementations of one interface, selected at
//! startup: a trigger-based LISTEN/NOTIFY source (preferred) and a polling
//! source over per-table updated-at cursors (fallback when trigger install
//! or the listen connection fails).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use serde_json::Value;
use sqlx::postgres::PgListener;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::domain::errors::CaptureError;
use crate::infrastructure::persistence::repositories::Repositories;
use crate::utils::logging;

const CHANGE_CHANNEL: &str = "nameswap_row_changes";

/// Tables the capture engine watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedTable {
    Assets,
    Listings,
    Offers,
}

impl WatchedTable {
    pub const ALL: [WatchedTable; 3] =
        [WatchedTable::Assets, WatchedTable::Listings, WatchedTable::Offers];

    pub fn table_name(&self) -> &'static str {
        match self {
            WatchedTable::Assets => "assets",
            WatchedTable::Listings => "listings",
            WatchedTable::Offers => "offers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assets" => Some(WatchedTable::Assets),
            "listings" => Some(WatchedTable::Listings),
            "offers" => Some(WatchedTable::Offers),
            _ => None,
        }
    }
}

/// Row operation observed on a watched table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(ChangeOp::Insert),
            "UPDATE" => Some(ChangeOp::Update),
            "DELETE" => Some(ChangeOp::Delete),
            _ => None,
        }
    }
}

/// One observed mutation
///
/// `new_row`/`old_row` are advisory: handlers must re-read current joined
/// state by id for anything that feeds the index, because payloads can be
/// stale or truncated. They are reliable for delta detection (old vs new
/// owner) on the event that carried them.
#[derive(Debug, Clone)]
pub struct TableChange {
    pub table: WatchedTable,
    pub op: ChangeOp,
    pub id: i64,
    pub new_row: Option<Value>,
    pub old_row: Option<Value>,
    /// Row timestamp used by the polling source to advance its cursor
    pub observed_at: Option<DateTime<FixedOffset>>,
}

/// A stream of table changes
#[async_trait]
pub trait ChangeSource: Send {
    /// Human-readable source description, for startup logging
    fn describe(&self) -> &'static str;

    /// Wait for and return the next batch of changes
    async fn next_batch(&mut self) -> Result<Vec<TableChange>, CaptureError>;

    /// Acknowledge one successfully processed change
    async fn ack(&mut self, change: &TableChange);
}

/// Decode one NOTIFY payload into a TableChange
pub fn decode_change_payload(payload: &str) -> Result<TableChange, CaptureError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| CaptureError::DecodeError(format!("Invalid change payload: {}", e)))?;

    let table = value
        .get("table")
        .and_then(Value::as_str)
        .and_then(WatchedTable::parse)
        .ok_or_else(|| {
            CaptureError::DecodeError(format!("Unknown table in payload: {}", payload))
        })?;
    let op = value
        .get("op")
        .and_then(Value::as_str)
        .and_then(ChangeOp::parse)
        .ok_or_else(|| CaptureError::DecodeError(format!("Unknown op in payload: {}", payload)))?;
    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| CaptureError::DecodeError(format!("Missing id in payload: {}", payload)))?;

    Ok(TableChange {
        table,
        op,
        id,
        new_row: value.get("new").filter(|v| !v.is_null()).cloned(),
        old_row: value.get("old").filter(|v| !v.is_null()).cloned(),
        observed_at: None,
    })
}

/// Trigger-based change source over LISTEN/NOTIFY
///
/// Holds the single long-lived listen connection for this process; do not
/// run more than one per process.
pub struct TriggerChangeSource {
    listener: PgListener,
}

impl TriggerChangeSource {
    /// Install the notify triggers and open the listen connection
    ///
    /// Any failure here is reported to the caller, who falls back to
    /// polling; it is never fatal.
    pub async fn connect(
        conn: &DatabaseConnection,
        database_url: &str,
    ) -> Result<Self, CaptureError> {
        install_triggers(conn).await?;

        let mut listener = PgListener::connect(database_url)
            .await
            .map_err(|e| CaptureError::ListenError(format!("Failed to connect listener: {}", e)))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| CaptureError::ListenError(format!("Failed to listen: {}", e)))?;

        Ok(Self { listener })
    }
}

#[async_trait]
impl ChangeSource for TriggerChangeSource {
    fn describe(&self) -> &'static str {
        "trigger/notify"
    }

    async fn next_batch(&mut self) -> Result<Vec<TableChange>, CaptureError> {
        let notification = self
            .listener
            .recv()
            .await
            .map_err(|e| CaptureError::ListenError(format!("Listen connection lost: {}", e)))?;

        match decode_change_payload(notification.payload()) {
            Ok(change) => Ok(vec![change]),
            Err(e) => {
                // A malformed payload must not stall the stream
                logging::log_error(&format!("Dropping undecodable change payload: {}", e));
                Ok(Vec::new())
            }
        }
    }

    async fn ack(&mut self, _change: &TableChange) {}
}

/// Install the notify trigger function and per-table triggers, idempotently
async fn install_triggers(conn: &DatabaseConnection) -> Result<(), CaptureError> {
    // Payloads near the 8000-byte notify limit degrade to id-only; handlers
    // re-read current state by id regardless.
    let function_sql = r#"
        CREATE OR REPLACE FUNCTION nameswap_notify_row_change() RETURNS trigger AS $$
        DECLARE
            payload text;
            row_id bigint;
        BEGIN
            IF TG_OP = 'DELETE' THEN
                row_id := OLD.id;
                payload := json_build_object(
                    'table', TG_TABLE_NAME, 'op', TG_OP, 'id', row_id,
                    'old', row_to_json(OLD))::text;
            ELSE
                row_id := NEW.id;
                payload := json_build_object(
                    'table', TG_TABLE_NAME, 'op', TG_OP, 'id', row_id,
                    'new', row_to_json(NEW),
                    'old', CASE WHEN TG_OP = 'UPDATE' THEN row_to_json(OLD) ELSE NULL END)::text;
            END IF;
            IF octet_length(payload) > 7900 THEN
                payload := json_build_object(
                    'table', TG_TABLE_NAME, 'op', TG_OP, 'id', row_id)::text;
            END IF;
            PERFORM pg_notify('nameswap_row_changes', payload);
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql;
    "#;

    conn.execute(Statement::from_string(DbBackend::Postgres, function_sql))
        .await
        .map_err(|e| CaptureError::ListenError(format!("Failed to install function: {}", e)))?;

    // One command per execute: the prepared-statement path rejects
    // multi-command SQL strings
    for table in WatchedTable::ALL {
        let name = table.table_name();
        for sql in trigger_statements(name) {
            conn.execute(Statement::from_string(DbBackend::Postgres, sql))
                .await
                .map_err(|e| {
                    CaptureError::ListenError(format!(
                        "Failed to install trigger on {}: {}",
                        name, e
                    ))
                })?;
        }
    }

    Ok(())
}

/// The drop/create pair for one table's capture trigger, one command each
fn trigger_statements(table: &str) -> [String; 2] {
    [
        format!("DROP TRIGGER IF EXISTS nameswap_capture_{table} ON {table}"),
        format!(
            "CREATE TRIGGER nameswap_capture_{table} \
             AFTER INSERT OR UPDATE OR DELETE ON {table} \
             FOR EACH ROW EXECUTE FUNCTION nameswap_notify_row_change()"
        ),
    ]
}

/// Per-table cursor state that only advances past acked rows, in order
///
/// Rows are registered in the order they were fetched; the cursor for a
/// table moves only while the acks arrive in that same order. An unacked
/// (failed) row therefore pins its cursor, and the next poll re-fetches it
/// along with everything after it.
struct CursorTracker {
    cursors: [DateTime<FixedOffset>; 3],
    pending: [VecDeque<(i64, DateTime<FixedOffset>)>; 3],
}

impl CursorTracker {
    fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            cursors: [start, start, start],
            pending: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
        }
    }

    fn index(table: WatchedTable) -> usize {
        match table {
            WatchedTable::Assets => 0,
            WatchedTable::Listings => 1,
            WatchedTable::Offers => 2,
        }
    }

    fn cursor(&self, table: WatchedTable) -> DateTime<FixedOffset> {
        self.cursors[Self::index(table)]
    }

    /// Forget leftover expectations before a new poll
    fn begin_batch(&mut self) {
        for queue in &mut self.pending {
            queue.clear();
        }
    }

    /// Register a fetched row awaiting its ack
    fn expect(&mut self, table: WatchedTable, id: i64, observed_at: DateTime<FixedOffset>) {
        self.pending[Self::index(table)].push_back((id, observed_at));
    }

    /// Ack one row; advances the cursor only when no earlier row is unacked
    fn ack(&mut self, table: WatchedTable, id: i64) {
        let index = Self::index(table);
        match self.pending[index].front() {
            Some(&(front_id, observed_at)) if front_id == id => {
                self.pending[index].pop_front();
                if observed_at > self.cursors[index] {
                    self.cursors[index] = observed_at;
                }
            }
            // An earlier row failed; keep the cursor pinned so the next
            // poll re-fetches it
            _ => {}
        }
    }
}

/// Polling change source over updated-at cursors
///
/// Cannot distinguish inserts from updates; everything surfaces as Update,
/// which is safe because handlers re-read state by id. Deletes are not
/// observed; the periodic resync repairs those.
pub struct PollingChangeSource {
    repositories: Arc<Repositories>,
    poll_interval: Duration,
    batch_size: u64,
    tracker: CursorTracker,
}

impl PollingChangeSource {
    /// Create a polling source starting from the current time
    pub fn new(
        repositories: Arc<Repositories>,
        poll_interval_ms: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            repositories,
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_size,
            tracker: CursorTracker::new(Utc::now().fixed_offset()),
        }
    }
}

#[async_trait]
impl ChangeSource for PollingChangeSource {
    fn describe(&self) -> &'static str {
        "polling"
    }

    async fn next_batch(&mut self) -> Result<Vec<TableChange>, CaptureError> {
        sleep(self.poll_interval).await;
        self.tracker.begin_batch();
        let mut changes = Vec::new();

        let assets = self
            .repositories
            .asset
            .find_updated_after(self.tracker.cursor(WatchedTable::Assets), self.batch_size)
            .await?;
        for asset in assets {
            self.tracker
                .expect(WatchedTable::Assets, asset.id, asset.updated_at);
            changes.push(TableChange {
                table: WatchedTable::Assets,
                op: ChangeOp::Update,
                id: asset.id,
                new_row: serde_json::to_value(&asset).ok(),
                old_row: None,
                observed_at: Some(asset.updated_at),
            });
        }

        let listings = self
            .repositories
            .listing
            .find_updated_after(self.tracker.cursor(WatchedTable::Listings), self.batch_size)
            .await?;
        for listing in listings {
            self.tracker
                .expect(WatchedTable::Listings, listing.id, listing.updated_at);
            changes.push(TableChange {
                table: WatchedTable::Listings,
                op: ChangeOp::Update,
                id: listing.id,
                new_row: serde_json::to_value(&listing).ok(),
                old_row: None,
                observed_at: Some(listing.updated_at),
            });
        }

        let offers = self
            .repositories
            .offer
            .find_updated_after(self.tracker.cursor(WatchedTable::Offers), self.batch_size)
            .await?;
        for offer in offers {
            self.tracker
                .expect(WatchedTable::Offers, offer.id, offer.updated_at);
            changes.push(TableChange {
                table: WatchedTable::Offers,
                op: ChangeOp::Update,
                id: offer.id,
                new_row: serde_json::to_value(&offer).ok(),
                old_row: None,
                observed_at: Some(offer.updated_at),
            });
        }

        Ok(changes)
    }

    /// Advance the table cursor past a processed row
    async fn ack(&mut self, change: &TableChange) {
        self.tracker.ack(change.table, change.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_payload() {
        let payload = json!({
            "table": "listings",
            "op": "UPDATE",
            "id": 42,
            "new": { "id": 42, "status": "active" },
            "old": { "id": 42, "status": "unfunded" }
        })
        .to_string();

        let change = decode_change_payload(&payload).unwrap();
        assert_eq!(change.table, WatchedTable::Listings);
        assert_eq!(change.op, ChangeOp::Update);
        assert_eq!(change.id, 42);
        assert!(change.new_row.is_some());
        assert!(change.old_row.is_some());
    }

    #[test]
    fn test_decode_truncated_payload_keeps_id() {
        // Oversized rows degrade to id-only payloads
        let payload = json!({ "table": "assets", "op": "UPDATE", "id": 7 }).to_string();
        let change = decode_change_payload(&payload).unwrap();
        assert_eq!(change.id, 7);
        assert!(change.new_row.is_none());
        assert!(change.old_row.is_none());
    }

    #[test]
    fn test_decode_delete_payload() {
        let payload = json!({
            "table": "assets",
            "op": "DELETE",
            "id": 9,
            "old": { "id": 9 }
        })
        .to_string();
        let change = decode_change_payload(&payload).unwrap();
        assert_eq!(change.op, ChangeOp::Delete);
        assert!(change.new_row.is_none());
    }

    #[test]
    fn test_decode_rejects_unknown_table() {
        let payload = json!({ "table": "users", "op": "INSERT", "id": 1 }).to_string();
        assert!(decode_change_payload(&payload).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_change_payload("not json").is_err());
    }

    #[test]
    fn test_cursor_advances_only_past_acked_rows_in_order() {
        let start = Utc::now().fixed_offset();
        let t1 = start + chrono::Duration::seconds(1);
        let t2 = start + chrono::Duration::seconds(2);
        let t3 = start + chrono::Duration::seconds(3);

        let mut tracker = CursorTracker::new(start);
        tracker.begin_batch();
        tracker.expect(WatchedTable::Listings, 1, t1);
        tracker.expect(WatchedTable::Listings, 2, t2);
        tracker.expect(WatchedTable::Listings, 3, t3);

        // Row 1 processed, row 2 failed (never acked), row 3 processed:
        // the cursor must stay at row 1 so row 2 is re-fetched
        tracker.ack(WatchedTable::Listings, 1);
        tracker.ack(WatchedTable::Listings, 3);
        assert_eq!(tracker.cursor(WatchedTable::Listings), t1);

        // Other tables are unaffected
        assert_eq!(tracker.cursor(WatchedTable::Assets), start);
    }

    #[test]
    fn test_cursor_advances_through_fully_acked_batch() {
        let start = Utc::now().fixed_offset();
        let t1 = start + chrono::Duration::seconds(1);
        let t2 = start + chrono::Duration::seconds(2);

        let mut tracker = CursorTracker::new(start);
        tracker.begin_batch();
        tracker.expect(WatchedTable::Offers, 5, t1);
        tracker.expect(WatchedTable::Offers, 6, t2);
        tracker.ack(WatchedTable::Offers, 5);
        tracker.ack(WatchedTable::Offers, 6);
        assert_eq!(tracker.cursor(WatchedTable::Offers), t2);
    }

    #[test]
    fn test_trigger_statements_are_single_commands() {
        // Multi-command strings are rejected by the extended query protocol,
        // so the drop and create must ship as separate statements
        for table in WatchedTable::ALL {
            let statements = trigger_statements(table.table_name());
            assert_eq!(statements.len(), 2);
            for sql in &statements {
                assert!(!sql.contains(';'), "not a single command: {}", sql);
            }
            assert!(statements[0].starts_with("DROP TRIGGER IF EXISTS"));
            assert!(statements[1].starts_with("CREATE TRIGGER"));
        }
    }
}
