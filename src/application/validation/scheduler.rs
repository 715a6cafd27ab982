//! Periodic validation sweeps
//!
//! The sweeps only select ids and enqueue jobs; the validators do the actual
//! chain work from the queue, so a slow RPC endpoint backs up the queue
//! instead of blocking the schedulers.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::application::jobs::topics;
use crate::config::ValidationConfig;
use crate::domain::errors::ValidationError;
use crate::infrastructure::persistence::repositories::Repositories;
use crate::infrastructure::queue::JobQueue;
use crate::utils::logging;

/// How many offers one batch-validation job carries
const OFFER_CHUNK_SIZE: usize = 50;

/// Enqueues validation work on a schedule
pub struct ValidationScheduler {
    repositories: Arc<Repositories>,
    queue: JobQueue,
    config: ValidationConfig,
}

impl ValidationScheduler {
    /// Create a new ValidationScheduler
    pub fn new(repositories: Arc<Repositories>, queue: JobQueue, config: ValidationConfig) -> Self {
        Self {
            repositories,
            queue,
            config,
        }
    }

    /// Sweep active listings due for an ownership check
    pub async fn sweep_listings(&self) -> Result<(), ValidationError> {
        let due = self
            .repositories
            .listing
            .find_due_for_validation(self.config.batch_size)
            .await?;

        for listing_id in &due {
            self.queue
                .send(
                    topics::VALIDATE_LISTING_OWNERSHIP,
                    json!({ "listingId": listing_id }),
                )
                .await?;
        }

        if !due.is_empty() {
            logging::log_debug(&format!(
                "Listing sweep queued {} ownership checks",
                due.len()
            ));
        }
        Ok(())
    }

    /// Sweep all pending offers into chunked balance-check jobs
    pub async fn sweep_offers(&self) -> Result<(), ValidationError> {
        let pending = self.repositories.offer.find_all_pending_ids().await?;
        let chunks = pending.chunks(OFFER_CHUNK_SIZE);
        let chunk_count = chunks.len();

        for chunk in chunks {
            self.queue
                .send(
                    topics::BATCH_VALIDATE_OFFERS,
                    json!({ "offerIds": chunk }),
                )
                .await?;
        }

        if !pending.is_empty() {
            logging::log_debug(&format!(
                "Offer sweep queued {} offers in {} batches",
                pending.len(),
                chunk_count
            ));
        }
        Ok(())
    }

    /// Recheck unfunded entities, with refund intent
    ///
    /// Only entities that went unfunded within the recheck window are
    /// revisited; anything older stays unfunded until a user acts on it.
    pub async fn recheck_unfunded(&self) -> Result<(), ValidationError> {
        let cutoff = (Utc::now()
            - chrono::Duration::seconds(self.config.unfunded_max_age_secs))
        .fixed_offset();

        let listings = self
            .repositories
            .listing
            .find_unfunded_since(cutoff, self.config.batch_size)
            .await?;
        for listing in &listings {
            self.queue
                .send(
                    topics::REVALIDATE_UNFUNDED_LISTING,
                    json!({ "listingId": listing.id }),
                )
                .await?;
        }

        let offer_ids = self
            .repositories
            .offer
            .find_unfunded_since(cutoff, self.config.batch_size)
            .await?;
        for chunk in offer_ids.chunks(OFFER_CHUNK_SIZE) {
            self.queue
                .send(
                    topics::REVALIDATE_UNFUNDED_OFFERS,
                    json!({ "offerIds": chunk }),
                )
                .await?;
        }

        if !listings.is_empty() || !offer_ids.is_empty() {
            logging::log_info(&format!(
                "Unfunded recheck queued {} listings and {} offers",
                listings.len(),
                offer_ids.len()
            ));
        }
        Ok(())
    }
}
