//! Change-capture engine
//!
//! Consumes table changes from a ChangeSource and keeps the search index,
//! activity ledger and downstream jobs in step with the relational store.
//! Every index write re-runs the enrichment query against current state, so
//! applying changes out of order still converges.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::activity::ActivityService;
use crate::application::capture::change_source::{
    ChangeOp, ChangeSource, TableChange, WatchedTable,
};
use crate::application::jobs::topics;
use crate::application::notifications::{NotificationType, Notifier};
use crate::domain::errors::CaptureError;
use crate::domain::models::ActivityEvent;
use crate::domain::services::enrichment::build_document;
use crate::domain::services::ownership::{classify_ownership_change, OwnershipChange};
use crate::infrastructure::persistence::repositories::Repositories;
use crate::infrastructure::queue::JobQueue;
use crate::infrastructure::search::SearchClient;
use crate::utils::logging;

/// Keeps the search index current with the relational store
pub struct CaptureEngine {
    repositories: Arc<Repositories>,
    search: Arc<SearchClient>,
    activity: ActivityService,
    notifier: Notifier,
    queue: JobQueue,
}

impl CaptureEngine {
    /// Create a new CaptureEngine
    pub fn new(
        repositories: Arc<Repositories>,
        search: Arc<SearchClient>,
        activity: ActivityService,
        notifier: Notifier,
        queue: JobQueue,
    ) -> Self {
        Self {
            repositories,
            search,
            activity,
            notifier,
            queue,
        }
    }

    /// Consume the change stream until the source fails
    pub async fn run(&self, mut source: Box<dyn ChangeSource>) -> Result<(), CaptureError> {
        logging::log_info(&format!(
            "Capture engine running with {} change source",
            source.describe()
        ));

        loop {
            let batch = source.next_batch().await?;
            for change in batch {
                match self.handle_change(&change).await {
                    Ok(()) => source.ack(&change).await,
                    Err(e) => {
                        // Unacked rows come around again on the polling
                        // source; the resync repairs the rest.
                        logging::log_error(&format!(
                            "Failed to handle change {:?} id {}: {}",
                            change.table, change.id, e
                        ));
                    }
                }
            }
        }
    }

    /// Apply one observed change
    pub async fn handle_change(&self, change: &TableChange) -> Result<(), CaptureError> {
        match change.table {
            WatchedTable::Assets => self.handle_asset_change(change).await,
            WatchedTable::Listings => self.handle_listing_change(change).await,
            WatchedTable::Offers => self.handle_offer_change(change).await,
        }
    }

    async fn handle_asset_change(&self, change: &TableChange) -> Result<(), CaptureError> {
        if change.op == ChangeOp::Delete {
            self.search.delete_document(change.id).await?;
            return Ok(());
        }

        self.detect_ownership_change(change).await;
        self.sync_asset(change.id).await
    }

    /// Mint/burn/transfer detection on asset updates
    ///
    /// This is the single place database-observed ownership changes become
    /// activity records.
    async fn detect_ownership_change(&self, change: &TableChange) {
        let new_owner = match row_str(&change.new_row, "owner_address") {
            Some(owner) => owner,
            None => return,
        };
        let old_owner = row_str(&change.old_row, "owner_address");

        // Inserts carry no old row; a fresh row with an owner is a mint
        let classified = match change.op {
            ChangeOp::Insert => classify_ownership_change(None, &new_owner),
            _ if change.old_row.is_some() => {
                classify_ownership_change(old_owner.as_deref(), &new_owner)
            }
            _ => None,
        };

        let event = match classified {
            Some(OwnershipChange::Minted { to }) => {
                ActivityEvent::blockchain(change.id, "minted", &to, None, None)
            }
            Some(OwnershipChange::Burned { from }) => {
                ActivityEvent::blockchain(change.id, "burned", &from, None, None)
            }
            Some(OwnershipChange::Transferred { from, to }) => {
                // An owner change invalidates any listing by the old owner;
                // fast-path a validation check instead of waiting for the sweep
                if let Ok(Some(listing)) = self
                    .repositories
                    .listing
                    .find_active_by_asset(change.id)
                    .await
                {
                    self.enqueue(
                        topics::VALIDATE_LISTING_OWNERSHIP,
                        json!({ "listingId": listing.id }),
                    )
                    .await;
                }
                ActivityEvent::blockchain(change.id, "transferred", &from, None, None)
                    .with_counterparty(&to)
            }
            None => return,
        };

        self.activity.record(event).await;
    }

    async fn handle_listing_change(&self, change: &TableChange) -> Result<(), CaptureError> {
        let asset_id = row_i64(&change.new_row, "asset_id")
            .or(row_i64(&change.old_row, "asset_id"));

        match change.op {
            ChangeOp::Insert => {
                if let Some(listing) = self.repositories.listing.get_by_id(change.id).await? {
                    self.activity
                        .record(
                            ActivityEvent::protocol(
                                listing.asset_id,
                                "listed",
                                &listing.seller_address,
                                listing.id,
                            )
                            .with_price(listing.price, &listing.currency),
                        )
                        .await;
                    self.notifier
                        .send(
                            NotificationType::NewListing,
                            &listing.seller_address,
                            listing.asset_id,
                            json!({ "listingId": listing.id, "price": listing.price }),
                        )
                        .await;
                    self.schedule_precise_expiry("listing", listing.id, listing.expires_at)
                        .await;
                    self.enqueue(
                        topics::VALIDATE_LISTING_OWNERSHIP,
                        json!({ "listingId": listing.id }),
                    )
                    .await;
                    self.enqueue_group_stats(listing.asset_id).await;
                }
            }
            ChangeOp::Update => {
                self.handle_listing_update(change).await;
            }
            ChangeOp::Delete => {}
        }

        match asset_id {
            Some(asset_id) => self.sync_asset(asset_id).await,
            None => self.sync_asset_of_listing(change.id).await,
        }
    }

    /// Status and price deltas on a listing row
    async fn handle_listing_update(&self, change: &TableChange) {
        let old_status = row_str(&change.old_row, "status");
        let new_status = row_str(&change.new_row, "status");
        let asset_id = match row_i64(&change.new_row, "asset_id") {
            Some(asset_id) => asset_id,
            None => return,
        };
        let seller = row_str(&change.new_row, "seller_address").unwrap_or_default();

        if old_status.is_some() && old_status != new_status {
            match new_status.as_deref() {
                Some("sold") => {
                    if let Some(listing) = self
                        .repositories
                        .listing
                        .get_by_id(change.id)
                        .await
                        .ok()
                        .flatten()
                    {
                        self.activity
                            .record(
                                ActivityEvent::protocol(asset_id, "sold", &seller, change.id)
                                    .with_price(listing.price, &listing.currency),
                            )
                            .await;
                        self.notifier
                            .send(
                                NotificationType::Sale,
                                &seller,
                                asset_id,
                                json!({ "listingId": change.id }),
                            )
                            .await;
                    }
                    self.enqueue_group_stats(asset_id).await;
                }
                Some("cancelled") => {
                    self.activity
                        .record(ActivityEvent::protocol(
                            asset_id,
                            "listing_cancelled",
                            &seller,
                            change.id,
                        ))
                        .await;
                    self.enqueue_group_stats(asset_id).await;
                }
                _ => {}
            }
        } else if let (Some(old_price), Some(new_price)) = (
            row_value(&change.old_row, "price"),
            row_value(&change.new_row, "price"),
        ) {
            if old_price != new_price {
                self.notifier
                    .send(
                        NotificationType::PriceChange,
                        &seller,
                        asset_id,
                        json!({ "listingId": change.id, "price": new_price }),
                    )
                    .await;
                self.enqueue_group_stats(asset_id).await;
            }
        }
    }

    async fn handle_offer_change(&self, change: &TableChange) -> Result<(), CaptureError> {
        let asset_id =
            row_i64(&change.new_row, "asset_id").or(row_i64(&change.old_row, "asset_id"));

        match change.op {
            ChangeOp::Insert => {
                if let Some(offer) = self.repositories.offer.get_by_id(change.id).await? {
                    self.activity
                        .record(
                            ActivityEvent::protocol(
                                offer.asset_id,
                                "offer_made",
                                &offer.buyer_address,
                                offer.id,
                            )
                            .with_price(offer.amount, &offer.currency),
                        )
                        .await;
                    if let Some(asset) =
                        self.repositories.asset.get_by_id(offer.asset_id).await?
                    {
                        self.notifier
                            .send(
                                NotificationType::NewOffer,
                                &asset.owner_address,
                                offer.asset_id,
                                json!({ "offerId": offer.id, "amount": offer.amount }),
                            )
                            .await;
                    }
                    self.schedule_precise_expiry("offer", offer.id, offer.expires_at)
                        .await;
                    self.enqueue(
                        topics::VALIDATE_OFFER_BALANCE,
                        json!({ "offerId": offer.id }),
                    )
                    .await;
                    self.enqueue(
                        topics::RECALCULATE_HIGHEST_OFFER,
                        json!({ "assetId": offer.asset_id }),
                    )
                    .await;
                }
            }
            ChangeOp::Update => {
                // An offer leaving pending can invalidate the cached best offer
                let old_status = row_str(&change.old_row, "status");
                let new_status = row_str(&change.new_row, "status");
                if old_status.as_deref() == Some("pending")
                    && new_status.as_deref() != Some("pending")
                {
                    if let Some(asset_id) = asset_id {
                        self.enqueue(
                            topics::RECALCULATE_HIGHEST_OFFER,
                            json!({ "assetId": asset_id }),
                        )
                        .await;
                    }
                }
            }
            ChangeOp::Delete => {}
        }

        match asset_id {
            Some(asset_id) => self.sync_asset(asset_id).await,
            None => self.sync_asset_of_offer(change.id).await,
        }
    }

    /// Re-run enrichment for one asset and republish its document
    ///
    /// Idempotent upsert by id; the query reads current state, never the
    /// change payload.
    pub async fn sync_asset(&self, asset_id: i64) -> Result<(), CaptureError> {
        let asset = match self.repositories.asset.get_by_id(asset_id).await? {
            Some(asset) => asset,
            None => {
                // Deleted between event and handling
                self.search.delete_document(asset_id).await?;
                return Ok(());
            }
        };

        let listing = self
            .repositories
            .listing
            .find_active_by_asset(asset_id)
            .await?;
        let aggregates = self.repositories.offer.aggregates_for_asset(asset_id).await?;

        let document = build_document(
            &asset,
            listing.as_ref(),
            &aggregates,
            chrono::Utc::now().fixed_offset(),
        );
        self.search.upsert_document(&document).await?;
        Ok(())
    }

    async fn sync_asset_of_listing(&self, listing_id: i64) -> Result<(), CaptureError> {
        if let Some(listing) = self.repositories.listing.get_by_id(listing_id).await? {
            self.sync_asset(listing.asset_id).await?;
        }
        Ok(())
    }

    async fn sync_asset_of_offer(&self, offer_id: i64) -> Result<(), CaptureError> {
        if let Some(offer) = self.repositories.offer.get_by_id(offer_id).await? {
            self.sync_asset(offer.asset_id).await?;
        }
        Ok(())
    }

    async fn schedule_precise_expiry(
        &self,
        entity_type: &str,
        id: i64,
        expires_at: chrono::DateTime<chrono::FixedOffset>,
    ) {
        let payload = json!({ "type": entity_type, "id": id });
        if let Err(e) = self
            .queue
            .send_at(topics::EXPIRE_ORDERS, payload, expires_at)
            .await
        {
            logging::log_error(&format!(
                "Failed to schedule expiry for {} {}: {}",
                entity_type, id, e
            ));
        }
    }

    async fn enqueue(&self, topic: &str, payload: Value) {
        if let Err(e) = self.queue.send(topic, payload).await {
            logging::log_error(&format!("Failed to enqueue {} job: {}", topic, e));
        }
    }

    /// Stats recompute for every group the asset belongs to
    async fn enqueue_group_stats(&self, asset_id: i64) {
        let asset = match self.repositories.asset.get_by_id(asset_id).await {
            Ok(Some(asset)) => asset,
            _ => return,
        };
        if let Some(groups) = asset.groups.as_array() {
            for group in groups.iter().filter_map(Value::as_str) {
                self.enqueue(
                    topics::RECALCULATE_GROUP_STATS,
                    json!({ "group": group }),
                )
                .await;
            }
        }
    }
}

/// Delay before restarting a stopped capture stream, capped exponential
pub fn restart_delay(attempt: u32) -> std::time::Duration {
    const BASE_SECS: u64 = 5;
    const MAX_SECS: u64 = 300;
    let secs = BASE_SECS
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
        .min(MAX_SECS);
    std::time::Duration::from_secs(secs)
}

fn row_str(row: &Option<Value>, key: &str) -> Option<String> {
    row.as_ref()
        .and_then(|r| r.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn row_i64(row: &Option<Value>, key: &str) -> Option<i64> {
    row.as_ref().and_then(|r| r.get(key)).and_then(Value::as_i64)
}

fn row_value(row: &Option<Value>, key: &str) -> Option<Value> {
    row.as_ref().and_then(|r| r.get(key)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_restart_delay_backs_off_and_caps() {
        assert_eq!(restart_delay(1), Duration::from_secs(5));
        assert_eq!(restart_delay(2), Duration::from_secs(10));
        assert_eq!(restart_delay(4), Duration::from_secs(40));
        assert_eq!(restart_delay(7), Duration::from_secs(300));
        assert_eq!(restart_delay(100), Duration::from_secs(300));
    }
}
