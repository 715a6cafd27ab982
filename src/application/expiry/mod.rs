//! Order expiry
//!
//! Two paths end in the same conditional update: a precise job scheduled at
//! the order's deadline, and a periodic sweep that catches anything the
//! precise path missed (lost jobs, deadlines edited after scheduling). The
//! update filters on status and deadline, so the two paths racing is
//! harmless.

use serde_json::json;
use std::sync::Arc;

use crate::application::activity::ActivityService;
use crate::application::jobs::topics;
use crate::config::ExpiryConfig;
use crate::domain::errors::ValidationError;
use crate::domain::models::ActivityEvent;
use crate::infrastructure::persistence::entities::{listings, offers};
use crate::infrastructure::persistence::repositories::Repositories;
use crate::infrastructure::queue::JobQueue;
use crate::utils::logging;

/// Expires listings and offers past their deadline
pub struct ExpiryEngine {
    repositories: Arc<Repositories>,
    queue: JobQueue,
    activity: ActivityService,
    config: ExpiryConfig,
}

impl ExpiryEngine {
    /// Create a new ExpiryEngine
    pub fn new(
        repositories: Arc<Repositories>,
        queue: JobQueue,
        activity: ActivityService,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            repositories,
            queue,
            activity,
            config,
        }
    }

    /// Precise expiry of one order, fired at its scheduled deadline
    ///
    /// No-op when the order already left its live state or its deadline was
    /// pushed out after this job was scheduled.
    pub async fn expire_one(&self, entity_type: &str, id: i64) -> Result<(), ValidationError> {
        match entity_type {
            "listing" => {
                if self.repositories.listing.expire_if_due(id).await? {
                    if let Some(listing) = self.repositories.listing.get_by_id(id).await? {
                        self.record_expired_listing(&listing).await;
                    }
                }
            }
            "offer" => {
                if self.repositories.offer.expire_if_due(id).await? {
                    if let Some(offer) = self.repositories.offer.get_by_id(id).await? {
                        self.record_expired_offer(&offer).await;
                        self.recalc_if_highest(&offer).await;
                    }
                }
            }
            other => {
                logging::log_warning(&format!("Unknown expiry entity type: {}", other));
            }
        }
        Ok(())
    }

    /// Safety-net sweep over both order tables
    pub async fn sweep(&self) -> Result<(), ValidationError> {
        let batch_size = self.config.sweep_batch_size;
        let mut expired_listings = 0_u64;
        let mut expired_offers = 0_u64;

        loop {
            let batch = self
                .repositories
                .listing
                .expire_overdue_batch(batch_size)
                .await?;
            let batch_len = batch.len();
            for listing in &batch {
                self.record_expired_listing(listing).await;
            }
            expired_listings += batch_len as u64;
            if batch_len < batch_size as usize {
                break;
            }
        }

        loop {
            let batch = self
                .repositories
                .offer
                .expire_overdue_batch(batch_size)
                .await?;
            let batch_len = batch.len();
            for offer in &batch {
                self.record_expired_offer(offer).await;
                self.recalc_if_highest(offer).await;
            }
            expired_offers += batch_len as u64;
            if batch_len < batch_size as usize {
                break;
            }
        }

        if expired_listings > 0 || expired_offers > 0 {
            logging::log_info(&format!(
                "Expiry sweep closed {} listings and {} offers",
                expired_listings, expired_offers
            ));
        }
        Ok(())
    }

    /// Recompute the cached highest offer on an asset
    pub async fn recalculate_highest_offer(&self, asset_id: i64) -> Result<(), ValidationError> {
        let highest = self.repositories.offer.find_highest_pending(asset_id).await?;
        self.repositories
            .asset
            .set_highest_offer(asset_id, highest.map(|o| o.id))
            .await?;
        Ok(())
    }

    async fn record_expired_listing(&self, listing: &listings::Model) {
        self.activity
            .record(
                ActivityEvent::protocol(
                    listing.asset_id,
                    "listing_expired",
                    &listing.seller_address,
                    listing.id,
                )
                .with_price(listing.price, &listing.currency),
            )
            .await;
    }

    async fn record_expired_offer(&self, offer: &offers::Model) {
        self.activity
            .record(
                ActivityEvent::protocol(
                    offer.asset_id,
                    "offer_expired",
                    &offer.buyer_address,
                    offer.id,
                )
                .with_price(offer.amount, &offer.currency),
            )
            .await;
    }

    /// If the expired offer was an asset's cached best, queue a recompute
    async fn recalc_if_highest(&self, offer: &offers::Model) {
        let holders = match self
            .repositories
            .asset
            .find_by_highest_offer(&[offer.id])
            .await
        {
            Ok(holders) => holders,
            Err(e) => {
                logging::log_error(&format!(
                    "Failed to look up assets holding offer {} as highest: {}",
                    offer.id, e
                ));
                return;
            }
        };
        for asset in holders {
            if let Err(e) = self
                .queue
                .send(
                    topics::RECALCULATE_HIGHEST_OFFER,
                    json!({ "assetId": asset.id }),
                )
                .await
            {
                logging::log_error(&format!(
                    "Failed to enqueue highest-offer recompute for asset {}: {}",
                    asset.id, e
                ));
            }
        }
    }
}
