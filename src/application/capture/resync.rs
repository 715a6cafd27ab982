//! Full bulk resync of the search index
//!
//! Pages through every asset joined with its current active listing and
//! pending offer aggregates, and bulk-writes enriched documents. Runs at
//! startup and again on a periodic cron, repairing any drift the
//! incremental path missed.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::config::CaptureConfig;
use crate::domain::errors::CaptureError;
use crate::domain::services::enrichment::build_document;
use crate::infrastructure::persistence::repositories::offer_repository::OfferAggregates;
use crate::infrastructure::persistence::repositories::Repositories;
use crate::infrastructure::search::SearchClient;
use crate::utils::logging;

/// Pages assets into the search index
pub struct Resyncer {
    repositories: Arc<Repositories>,
    search: Arc<SearchClient>,
    config: CaptureConfig,
}

impl Resyncer {
    /// Create a new Resyncer
    pub fn new(
        repositories: Arc<Repositories>,
        search: Arc<SearchClient>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            repositories,
            search,
            config,
        }
    }

    /// Rebuild the whole index, one page at a time
    pub async fn run(&self) -> Result<(), CaptureError> {
        let page_size = self.config.resync_batch_size;
        let mut after_id = 0_i64;
        let mut total = 0_u64;
        let mut failed = 0_u64;

        logging::log_info(&format!("Starting full resync (page size {})", page_size));

        loop {
            let assets = self.repositories.asset.page_after(after_id, page_size).await?;
            if assets.is_empty() {
                break;
            }
            let page_len = assets.len();
            after_id = assets[page_len - 1].id;

            let asset_ids: Vec<i64> = assets.iter().map(|a| a.id).collect();
            let listings = self
                .repositories
                .listing
                .find_active_by_assets(&asset_ids)
                .await?;
            let offers = self
                .repositories
                .offer
                .find_pending_by_assets(&asset_ids)
                .await?;

            let listing_by_asset: HashMap<i64, _> =
                listings.into_iter().map(|l| (l.asset_id, l)).collect();
            let mut aggregates_by_asset: HashMap<i64, OfferAggregates> = HashMap::new();
            for offer in offers {
                let entry = aggregates_by_asset.entry(offer.asset_id).or_default();
                entry.count += 1;
                if entry.max_amount.map_or(true, |max| offer.amount > max) {
                    entry.max_amount = Some(offer.amount);
                }
            }

            let now = Utc::now().fixed_offset();
            let no_offers = OfferAggregates::default();
            let documents: Vec<_> = assets
                .iter()
                .map(|asset| {
                    build_document(
                        asset,
                        listing_by_asset.get(&asset.id),
                        aggregates_by_asset.get(&asset.id).unwrap_or(&no_offers),
                        now,
                    )
                })
                .collect();

            // Per-document failures are logged by the client; the page and
            // the resync continue
            let failures = self.search.bulk_upsert(&documents).await?;
            failed += failures.len() as u64;
            total += page_len as u64;

            if page_len < page_size as usize {
                break;
            }
            sleep(Duration::from_millis(self.config.resync_pause_ms)).await;
        }

        logging::log_info(&format!(
            "Full resync complete: {} documents, {} failures",
            total, failed
        ));
        Ok(())
    }
}
