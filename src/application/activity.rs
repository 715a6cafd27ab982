//! Activity ledger service
//!
//! Thin seam over the activity repository: ledger writes are best-effort
//! from the caller's perspective — a failed append is logged, never allowed
//! to abort the state transition that produced it.

use crate::domain::models::ActivityEvent;
use crate::infrastructure::persistence::repositories::ActivityRepository;
use crate::utils::logging;

/// Records domain events into the append-only ledger
#[derive(Clone)]
pub struct ActivityService {
    repository: ActivityRepository,
}

impl ActivityService {
    /// Create a new ActivityService
    pub fn new(repository: ActivityRepository) -> Self {
        Self { repository }
    }

    /// Append an event, swallowing (but logging) failures
    pub async fn record(&self, event: ActivityEvent) {
        match self.repository.append(&event).await {
            Ok(Some(id)) => {
                logging::log_debug(&format!("Recorded activity {} as record {}", event, id));
            }
            Ok(None) => {}
            Err(e) => {
                logging::log_error(&format!("Failed to record activity {}: {}", event, e));
            }
        }
    }
}
