//! Queue topics and the job dispatcher
//!
//! One dispatcher covers every topic the service owns. Handlers map
//! `ValidationError::NotFound` to a completed job (the entity is gone, a
//! retry cannot help); everything else surfaces as Err so the queue applies
//! its retry budget.

use serde_json::Value;
use std::sync::Arc;

use crate::application::capture::Resyncer;
use crate::application::expiry::ExpiryEngine;
use crate::application::stats::StatsEngine;
use crate::application::validation::{ListingValidator, OfferValidator, ValidationScheduler};
use crate::config::QueueConfig;
use crate::domain::errors::ValidationError;
use crate::infrastructure::queue::{Job, JobHandler, JobQueue, QueueError};
use crate::utils::logging;

/// Queue topic names
pub mod topics {
    /// Single-listing ownership check
    pub const VALIDATE_LISTING_OWNERSHIP: &str = "validate-listing-ownership";
    /// Single-offer balance check
    pub const VALIDATE_OFFER_BALANCE: &str = "validate-offer-balance";
    /// Chunked balance check over many offers
    pub const BATCH_VALIDATE_OFFERS: &str = "batch-validate-offers";
    /// Unfunded-listing recheck, carries refund intent
    pub const REVALIDATE_UNFUNDED_LISTING: &str = "revalidate-unfunded-listing";
    /// Unfunded-offer recheck, carries refund intent
    pub const REVALIDATE_UNFUNDED_OFFERS: &str = "revalidate-unfunded-offers";
    /// Precise expiry of one order at its deadline
    pub const EXPIRE_ORDERS: &str = "expire-orders";
    /// Safety-net sweep over both order tables
    pub const BATCH_EXPIRE_ORDERS: &str = "batch-expire-orders";
    /// Recompute an asset's cached highest offer
    pub const RECALCULATE_HIGHEST_OFFER: &str = "recalculate-highest-offer";
    /// Recompute one group's aggregate stats
    pub const RECALCULATE_GROUP_STATS: &str = "recalculate-group-stats";
    /// Cron: enqueue due listing ownership checks
    pub const SWEEP_LISTING_VALIDATION: &str = "sweep-listing-validation";
    /// Cron: enqueue pending-offer balance checks
    pub const SWEEP_OFFER_VALIDATION: &str = "sweep-offer-validation";
    /// Cron: enqueue unfunded rechecks with refund intent
    pub const RECHECK_UNFUNDED: &str = "recheck-unfunded";
    /// Cron: archive old completed jobs
    pub const ARCHIVE_COMPLETED_JOBS: &str = "archive-completed-jobs";
    /// Cron: full search index rebuild, repairing accumulated drift
    pub const RESYNC_INDEX: &str = "resync-index";
}

/// Every topic the dispatcher subscribes to
pub fn all_topics() -> Vec<&'static str> {
    vec![
        topics::VALIDATE_LISTING_OWNERSHIP,
        topics::VALIDATE_OFFER_BALANCE,
        topics::BATCH_VALIDATE_OFFERS,
        topics::REVALIDATE_UNFUNDED_LISTING,
        topics::REVALIDATE_UNFUNDED_OFFERS,
        topics::EXPIRE_ORDERS,
        topics::BATCH_EXPIRE_ORDERS,
        topics::RECALCULATE_HIGHEST_OFFER,
        topics::RECALCULATE_GROUP_STATS,
        topics::SWEEP_LISTING_VALIDATION,
        topics::SWEEP_OFFER_VALIDATION,
        topics::RECHECK_UNFUNDED,
        topics::ARCHIVE_COMPLETED_JOBS,
        topics::RESYNC_INDEX,
    ]
}

/// Routes fetched jobs to the owning service
pub struct Dispatcher {
    listing_validator: Arc<ListingValidator>,
    offer_validator: Arc<OfferValidator>,
    scheduler: Arc<ValidationScheduler>,
    expiry: Arc<ExpiryEngine>,
    stats: Arc<StatsEngine>,
    resyncer: Arc<Resyncer>,
    queue: JobQueue,
    config: QueueConfig,
}

impl Dispatcher {
    /// Create a new Dispatcher
    pub fn new(
        listing_validator: Arc<ListingValidator>,
        offer_validator: Arc<OfferValidator>,
        scheduler: Arc<ValidationScheduler>,
        expiry: Arc<ExpiryEngine>,
        stats: Arc<StatsEngine>,
        resyncer: Arc<Resyncer>,
        queue: JobQueue,
        config: QueueConfig,
    ) -> Self {
        Self {
            listing_validator,
            offer_validator,
            scheduler,
            expiry,
            stats,
            resyncer,
            queue,
            config,
        }
    }

    async fn dispatch(&self, job: &Job) -> Result<(), ValidationError> {
        match job.topic.as_str() {
            topics::VALIDATE_LISTING_OWNERSHIP => {
                let listing_id = payload_i64(&job.payload, "listingId")?;
                self.listing_validator.check_listing(listing_id, false).await
            }
            topics::REVALIDATE_UNFUNDED_LISTING => {
                let listing_id = payload_i64(&job.payload, "listingId")?;
                self.listing_validator.check_listing(listing_id, true).await
            }
            topics::VALIDATE_OFFER_BALANCE => {
                let offer_id = payload_i64(&job.payload, "offerId")?;
                self.offer_validator.check_offer(offer_id, false).await
            }
            topics::BATCH_VALIDATE_OFFERS => {
                let offer_ids = payload_i64_list(&job.payload, "offerIds")?;
                self.offer_validator.validate_batch(&offer_ids, false).await
            }
            topics::REVALIDATE_UNFUNDED_OFFERS => {
                let offer_ids = payload_i64_list(&job.payload, "offerIds")?;
                self.offer_validator.validate_batch(&offer_ids, true).await
            }
            topics::EXPIRE_ORDERS => {
                let entity_type = payload_str(&job.payload, "type")?;
                let id = payload_i64(&job.payload, "id")?;
                self.expiry.expire_one(&entity_type, id).await
            }
            topics::BATCH_EXPIRE_ORDERS => self.expiry.sweep().await,
            topics::RECALCULATE_HIGHEST_OFFER => {
                let asset_id = payload_i64(&job.payload, "assetId")?;
                self.expiry.recalculate_highest_offer(asset_id).await
            }
            topics::RECALCULATE_GROUP_STATS => {
                let group = payload_str(&job.payload, "group")?;
                self.stats.recalculate(&group).await
            }
            topics::SWEEP_LISTING_VALIDATION => self.scheduler.sweep_listings().await,
            topics::SWEEP_OFFER_VALIDATION => self.scheduler.sweep_offers().await,
            topics::RECHECK_UNFUNDED => self.scheduler.recheck_unfunded().await,
            topics::ARCHIVE_COMPLETED_JOBS => {
                let archived = self
                    .queue
                    .archive_completed(self.config.archive_after_secs)
                    .await?;
                if archived > 0 {
                    logging::log_debug(&format!("Archived {} completed jobs", archived));
                }
                // Failed jobs stay parked for inspection; surface how many
                let failed = self.queue.failed_count().await?;
                if failed > 0 {
                    logging::log_warning(&format!(
                        "{} failed jobs awaiting manual inspection",
                        failed
                    ));
                }
                Ok(())
            }
            topics::RESYNC_INDEX => self
                .resyncer
                .run()
                .await
                .map_err(|e| ValidationError::ProcessingError(e.to_string())),
            other => {
                // A stale job from an older deployment; complete it so it
                // does not burn retries forever
                logging::log_warning(&format!("No handler for topic '{}'", other));
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for Dispatcher {
    fn topics(&self) -> Vec<String> {
        all_topics().into_iter().map(str::to_string).collect()
    }

    async fn handle(&self, job: &Job) -> Result<(), QueueError> {
        match self.dispatch(job).await {
            Ok(()) => Ok(()),
            Err(ValidationError::NotFound(msg)) => {
                logging::log_warning(&format!(
                    "Job {} target vanished, completing: {}",
                    job.id, msg
                ));
                Ok(())
            }
            Err(e) => Err(QueueError::Other(e.to_string())),
        }
    }
}

fn payload_i64(payload: &Value, key: &str) -> Result<i64, ValidationError> {
    payload
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing_field(payload, key))
}

fn payload_str(payload: &Value, key: &str) -> Result<String, ValidationError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_field(payload, key))
}

fn payload_i64_list(payload: &Value, key: &str) -> Result<Vec<i64>, ValidationError> {
    let list = payload
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| missing_field(payload, key))?;
    list.iter()
        .map(|v| v.as_i64().ok_or_else(|| missing_field(payload, key)))
        .collect()
}

fn missing_field(payload: &Value, key: &str) -> ValidationError {
    ValidationError::ProcessingError(format!("Payload missing '{}': {}", key, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_accessors() {
        let payload = json!({ "listingId": 7, "type": "listing", "offerIds": [1, 2, 3] });
        assert_eq!(payload_i64(&payload, "listingId").unwrap(), 7);
        assert_eq!(payload_str(&payload, "type").unwrap(), "listing");
        assert_eq!(
            payload_i64_list(&payload, "offerIds").unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let payload = json!({});
        assert!(payload_i64(&payload, "listingId").is_err());
        assert!(payload_str(&payload, "type").is_err());
        assert!(payload_i64_list(&payload, "offerIds").is_err());
    }

    #[test]
    fn test_malformed_id_list_is_an_error() {
        let payload = json!({ "offerIds": [1, "two", 3] });
        assert!(payload_i64_list(&payload, "offerIds").is_err());
    }

    #[test]
    fn test_subscription_covers_cron_topics() {
        let topics = all_topics();
        for cron in [
            topics::BATCH_EXPIRE_ORDERS,
            topics::SWEEP_LISTING_VALIDATION,
            topics::SWEEP_OFFER_VALIDATION,
            topics::RECHECK_UNFUNDED,
            topics::ARCHIVE_COMPLETED_JOBS,
            topics::RESYNC_INDEX,
        ] {
            assert!(topics.contains(&cron), "missing subscription for {}", cron);
        }

        let mut deduped = topics.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), topics.len());
    }
}
