//! Listing ownership validation
//!
//! The cheap always-on path compares the relational store's cached owner
//! against the listing's seller. A small sampled fraction of checks also
//! asks the chain directly, to catch relational-store lag; RPC trouble in
//! that sampling path is logged and swallowed, never failing the primary
//! check.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::application::activity::ActivityService;
use crate::application::notifications::{NotificationType, Notifier};
use crate::config::ValidationConfig;
use crate::domain::errors::ValidationError;
use crate::domain::models::{ActivityEvent, EntityKind, ListingStatus, UnfundedReason};
use crate::domain::services::transitions::{
    decide_transition, CheckOutcome, EntityPhase, TransitionDecision,
};
use crate::application::validation::SampleSource;
use crate::infrastructure::ethereum::ChainReader;
use crate::infrastructure::persistence::entities::{assets, listings};
use crate::infrastructure::persistence::repositories::Repositories;
use crate::utils::logging;

/// Validates listing sellers still own their assets
pub struct ListingValidator {
    repositories: Arc<Repositories>,
    ethereum: Arc<dyn ChainReader>,
    sampler: Arc<dyn SampleSource>,
    activity: ActivityService,
    notifier: Notifier,
    config: ValidationConfig,
}

impl ListingValidator {
    /// Create a new ListingValidator
    pub fn new(
        repositories: Arc<Repositories>,
        ethereum: Arc<dyn ChainReader>,
        sampler: Arc<dyn SampleSource>,
        activity: ActivityService,
        notifier: Notifier,
        config: ValidationConfig,
    ) -> Self {
        Self {
            repositories,
            ethereum,
            sampler,
            activity,
            notifier,
            config,
        }
    }

    /// Run one ownership check against a listing
    ///
    /// `refund_intent` is only passed by the unfunded-recheck job; routine
    /// checks can never revive an unfunded listing.
    pub async fn check_listing(
        &self,
        listing_id: i64,
        refund_intent: bool,
    ) -> Result<(), ValidationError> {
        let listing = match self.repositories.listing.get_by_id(listing_id).await? {
            Some(listing) => listing,
            None => {
                logging::log_warning(&format!(
                    "Listing {} vanished before validation; skipping",
                    listing_id
                ));
                return Ok(());
            }
        };
        let asset = match self.repositories.asset.get_by_id(listing.asset_id).await? {
            Some(asset) => asset,
            None => {
                logging::log_warning(&format!(
                    "Asset {} for listing {} vanished; skipping",
                    listing.asset_id, listing_id
                ));
                return Ok(());
            }
        };

        let outcome = self.check_ownership(&listing, &asset).await;
        let phase = listing_phase(&listing);
        let decision = decide_transition(phase, &outcome, refund_intent);
        let retry = self.apply_decision(&listing, &decision).await?;
        self.touch_state(listing_id, retry).await?;
        Ok(())
    }

    async fn check_ownership(
        &self,
        listing: &listings::Model,
        asset: &assets::Model,
    ) -> CheckOutcome {
        if !asset
            .owner_address
            .eq_ignore_ascii_case(&listing.seller_address)
        {
            return CheckOutcome::Unfunded(UnfundedReason::OwnershipLost);
        }

        // Sampled direct chain read, to catch a stale relational cache
        if self
            .sampler
            .should_sample(self.config.ownership_sample_rate)
        {
            match self.ethereum.get_name_owner(&asset.token_id).await {
                Ok(chain_owner) => {
                    if !chain_owner.eq_ignore_ascii_case(&listing.seller_address) {
                        return CheckOutcome::Unfunded(UnfundedReason::OwnershipLost);
                    }
                }
                Err(e) => {
                    logging::log_warning(&format!(
                        "Sampled ownership read failed for asset {}: {}",
                        asset.id, e
                    ));
                }
            }
        }

        CheckOutcome::Funded
    }

    /// Apply a transition decision; returns whether the check should retry
    async fn apply_decision(
        &self,
        listing: &listings::Model,
        decision: &TransitionDecision,
    ) -> Result<bool, ValidationError> {
        match decision {
            TransitionDecision::MarkUnfunded(reason) => {
                let moved = self
                    .repositories
                    .listing
                    .mark_unfunded(listing.id, *reason)
                    .await?;
                if moved {
                    self.activity
                        .record(
                            ActivityEvent::protocol(
                                listing.asset_id,
                                "listing_unfunded",
                                &listing.seller_address,
                                listing.id,
                            )
                            .with_metadata(json!({ "reason": reason.as_str() })),
                        )
                        .await;
                    self.notifier
                        .send(
                            NotificationType::ListingUnfunded,
                            &listing.seller_address,
                            listing.asset_id,
                            json!({ "listingId": listing.id, "reason": reason.as_str() }),
                        )
                        .await;
                }
                Ok(false)
            }
            TransitionDecision::MarkRefunded => {
                let moved = self.repositories.listing.mark_refunded(listing.id).await?;
                if moved {
                    self.activity
                        .record(ActivityEvent::protocol(
                            listing.asset_id,
                            "refunded",
                            &listing.seller_address,
                            listing.id,
                        ))
                        .await;
                    self.notifier
                        .send(
                            NotificationType::Refunded,
                            &listing.seller_address,
                            listing.asset_id,
                            json!({ "listingId": listing.id }),
                        )
                        .await;
                }
                Ok(false)
            }
            TransitionDecision::NoChange { retry } => Ok(*retry),
        }
    }

    async fn touch_state(&self, listing_id: i64, check_failed: bool) -> Result<(), ValidationError> {
        let next = (Utc::now()
            + chrono::Duration::milliseconds(self.config.interval_ms as i64))
        .fixed_offset();
        self.repositories
            .validation_state
            .touch(EntityKind::Listing, listing_id, check_failed, next)
            .await?;
        Ok(())
    }
}

fn listing_phase(listing: &listings::Model) -> EntityPhase {
    match ListingStatus::parse(&listing.status) {
        Some(ListingStatus::Active) => EntityPhase::Live,
        Some(ListingStatus::Unfunded) => EntityPhase::Unfunded,
        _ => EntityPhase::Terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::application::validation::test_support::{
        mock_repositories, test_config, ScriptedChain,
    };
    use crate::application::validation::FixedSampler;
    use crate::infrastructure::queue::JobQueue;

    const SELLER: &str = "0x1111111111111111111111111111111111111111";
    const STRANGER: &str = "0x2222222222222222222222222222222222222222";

    fn validator(chain: ScriptedChain, sampler: FixedSampler) -> ListingValidator {
        let repositories = mock_repositories();
        let activity = ActivityService::new(repositories.activity.clone());
        let queue = JobQueue::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));
        ListingValidator::new(
            repositories,
            Arc::new(chain),
            Arc::new(sampler),
            activity,
            Notifier::new(queue),
            test_config(),
        )
    }

    fn active_listing() -> listings::Model {
        let now = Utc::now().fixed_offset();
        listings::Model {
            id: 1,
            asset_id: 1,
            seller_address: SELLER.to_string(),
            price: Decimal::from(1_000),
            currency: "eth".to_string(),
            expires_at: now + chrono::Duration::days(30),
            status: "active".to_string(),
            unfunded_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn cached_asset(owner: &str) -> assets::Model {
        let now = Utc::now().fixed_offset();
        assets::Model {
            id: 1,
            name: "vault.eth".to_string(),
            token_id: "0xabc123".to_string(),
            owner_address: owner.to_string(),
            registered_at: now - chrono::Duration::days(400),
            expires_at: now + chrono::Duration::days(300),
            groups: serde_json::json!(["999club"]),
            highest_offer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_sampled_chain_read_catches_stale_cache() {
        // Cache still says the seller owns the name, but the sampled direct
        // read disagrees; the chain wins.
        let chain = ScriptedChain {
            owner: Ok(STRANGER.to_string()),
            ..Default::default()
        };
        let validator = validator(chain, FixedSampler(true));

        let outcome = validator
            .check_ownership(&active_listing(), &cached_asset(SELLER))
            .await;
        assert_eq!(outcome, CheckOutcome::Unfunded(UnfundedReason::OwnershipLost));
    }

    #[tokio::test]
    async fn test_unsampled_check_trusts_cache() {
        let chain = ScriptedChain {
            owner: Ok(STRANGER.to_string()),
            ..Default::default()
        };
        let validator = validator(chain, FixedSampler(false));

        let outcome = validator
            .check_ownership(&active_listing(), &cached_asset(SELLER))
            .await;
        assert_eq!(outcome, CheckOutcome::Funded);
    }

    #[tokio::test]
    async fn test_sampled_rpc_failure_does_not_fail_the_check() {
        let chain = ScriptedChain {
            owner: Err("connection refused".to_string()),
            ..Default::default()
        };
        let validator = validator(chain, FixedSampler(true));

        let outcome = validator
            .check_ownership(&active_listing(), &cached_asset(SELLER))
            .await;
        assert_eq!(outcome, CheckOutcome::Funded);
    }

    #[tokio::test]
    async fn test_cached_owner_mismatch_loses_ownership() {
        let validator = validator(ScriptedChain::default(), FixedSampler(false));

        let outcome = validator
            .check_ownership(&active_listing(), &cached_asset(STRANGER))
            .await;
        assert_eq!(outcome, CheckOutcome::Unfunded(UnfundedReason::OwnershipLost));
    }
}
