//! Offer balance validation
//!
//! Single-offer checks query one balance; batch validation groups offers by
//! currency and fetches all ERC-20 balances for a token in one multicall
//! round trip. Native balances have no batching primitive, so those fan out
//! as individual calls — kept in one place (`check_native_group`) so a
//! batched replacement can slot in later.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::activity::ActivityService;
use crate::application::notifications::{NotificationType, Notifier};
use crate::config::ValidationConfig;
use crate::domain::errors::ValidationError;
use crate::domain::models::{ActivityEvent, EntityKind, OfferStatus, UnfundedReason};
use crate::domain::services::currency::{Currency, CurrencyRegistry};
use crate::domain::services::transitions::{
    decide_transition, CheckOutcome, EntityPhase, TransitionDecision,
};
use crate::infrastructure::ethereum::{ChainReader, MulticallOutcome};
use crate::infrastructure::persistence::entities::offers;
use crate::infrastructure::persistence::repositories::Repositories;
use crate::utils::logging;

/// Validates offer buyers still hold their bid
pub struct OfferValidator {
    repositories: Arc<Repositories>,
    ethereum: Arc<dyn ChainReader>,
    registry: CurrencyRegistry,
    activity: ActivityService,
    notifier: Notifier,
    config: ValidationConfig,
}

impl OfferValidator {
    /// Create a new OfferValidator
    pub fn new(
        repositories: Arc<Repositories>,
        ethereum: Arc<dyn ChainReader>,
        registry: CurrencyRegistry,
        activity: ActivityService,
        notifier: Notifier,
        config: ValidationConfig,
    ) -> Self {
        Self {
            repositories,
            ethereum,
            registry,
            activity,
            notifier,
            config,
        }
    }

    /// Run one balance check against a single offer
    pub async fn check_offer(
        &self,
        offer_id: i64,
        refund_intent: bool,
    ) -> Result<(), ValidationError> {
        self.validate_batch(&[offer_id], refund_intent).await
    }

    /// Validate a set of offers, one balance round trip per ERC-20 currency
    pub async fn validate_batch(
        &self,
        offer_ids: &[i64],
        refund_intent: bool,
    ) -> Result<(), ValidationError> {
        let offers = self.repositories.offer.get_by_ids(offer_ids).await?;
        if offers.len() < offer_ids.len() {
            logging::log_warning(&format!(
                "{} of {} offers vanished before validation",
                offer_ids.len() - offers.len(),
                offer_ids.len()
            ));
        }
        if offers.is_empty() {
            return Ok(());
        }

        // Group by resolved currency
        let mut native_group: Vec<&offers::Model> = Vec::new();
        let mut token_groups: HashMap<String, Vec<&offers::Model>> = HashMap::new();
        let mut outcomes: Vec<(i64, CheckOutcome)> = Vec::new();

        for offer in &offers {
            match self.registry.resolve(&offer.currency) {
                Currency::Native => native_group.push(offer),
                Currency::Token(token) => {
                    token_groups.entry(token.address).or_default().push(offer)
                }
                Currency::Unknown(raw) => {
                    // Definitive invalid result, not a retryable error
                    logging::log_warning(&format!(
                        "Offer {} uses unsupported currency {}",
                        offer.id, raw
                    ));
                    outcomes.push((
                        offer.id,
                        CheckOutcome::Unfunded(UnfundedReason::UnsupportedCurrency),
                    ));
                }
            }
        }

        outcomes.extend(self.check_native_group(&native_group).await);
        for (token_address, group) in &token_groups {
            outcomes.extend(self.check_token_group(token_address, group).await?);
        }

        let offers_by_id: HashMap<i64, &offers::Model> =
            offers.iter().map(|o| (o.id, o)).collect();
        for (offer_id, outcome) in outcomes {
            if let Some(offer) = offers_by_id.get(&offer_id) {
                self.apply_outcome(offer, &outcome, refund_intent).await?;
            }
        }
        Ok(())
    }

    /// Native balances, one eth_getBalance per buyer
    ///
    /// No batching primitive exists for native balance; a failed call marks
    /// only its own offer as needing retry.
    async fn check_native_group(&self, group: &[&offers::Model]) -> Vec<(i64, CheckOutcome)> {
        let balances = join_all(
            group
                .iter()
                .map(|offer| self.ethereum.get_native_balance(&offer.buyer_address)),
        )
        .await;

        group
            .iter()
            .zip(balances)
            .map(|(offer, balance)| {
                let outcome = match balance {
                    Ok(balance) => classify_balance(offer.amount, balance, true),
                    Err(e) => CheckOutcome::Indeterminate(e.to_string()),
                };
                (offer.id, outcome)
            })
            .collect()
    }

    /// ERC-20 balances for one token, a single multicall round trip
    async fn check_token_group(
        &self,
        token_address: &str,
        group: &[&offers::Model],
    ) -> Result<Vec<(i64, CheckOutcome)>, ValidationError> {
        let holders: Vec<String> = group.iter().map(|o| o.buyer_address.clone()).collect();
        // A whole-batch failure (endpoint down) propagates as an error so
        // the queue retries the job; per-call failures come back inline.
        let results = self
            .ethereum
            .batch_token_balances(token_address, &holders)
            .await?;

        Ok(group
            .iter()
            .zip(results)
            .map(|(offer, result)| {
                let outcome = match result {
                    MulticallOutcome::Balance(balance) => {
                        classify_balance(offer.amount, balance, false)
                    }
                    MulticallOutcome::Failed(reason) => CheckOutcome::Indeterminate(reason),
                };
                (offer.id, outcome)
            })
            .collect())
    }

    async fn apply_outcome(
        &self,
        offer: &offers::Model,
        outcome: &CheckOutcome,
        refund_intent: bool,
    ) -> Result<(), ValidationError> {
        let phase = offer_phase(offer);
        let decision = decide_transition(phase, outcome, refund_intent);
        let retry = match &decision {
            TransitionDecision::MarkUnfunded(reason) => {
                let moved = self
                    .repositories
                    .offer
                    .mark_unfunded(offer.id, *reason)
                    .await?;
                if moved {
                    self.activity
                        .record(
                            ActivityEvent::protocol(
                                offer.asset_id,
                                "offer_unfunded",
                                &offer.buyer_address,
                                offer.id,
                            )
                            .with_metadata(json!({ "reason": reason.as_str() })),
                        )
                        .await;
                    self.notifier
                        .send(
                            NotificationType::OfferUnfunded,
                            &offer.buyer_address,
                            offer.asset_id,
                            json!({ "offerId": offer.id, "reason": reason.as_str() }),
                        )
                        .await;
                }
                false
            }
            TransitionDecision::MarkRefunded => {
                let moved = self.repositories.offer.mark_refunded(offer.id).await?;
                if moved {
                    self.activity
                        .record(ActivityEvent::protocol(
                            offer.asset_id,
                            "refunded",
                            &offer.buyer_address,
                            offer.id,
                        ))
                        .await;
                    self.notifier
                        .send(
                            NotificationType::Refunded,
                            &offer.buyer_address,
                            offer.asset_id,
                            json!({ "offerId": offer.id }),
                        )
                        .await;
                }
                false
            }
            TransitionDecision::NoChange { retry } => *retry,
        };

        let next = (Utc::now()
            + chrono::Duration::milliseconds(self.config.offer_interval_ms as i64))
        .fixed_offset();
        self.repositories
            .validation_state
            .touch(EntityKind::Offer, offer.id, retry, next)
            .await?;
        Ok(())
    }
}

fn offer_phase(offer: &offers::Model) -> EntityPhase {
    match OfferStatus::parse(&offer.status) {
        Some(OfferStatus::Pending) => EntityPhase::Live,
        Some(OfferStatus::Unfunded) => EntityPhase::Unfunded,
        _ => EntityPhase::Terminal,
    }
}

/// Convert an integral wei amount to u128, clamping on overflow
fn amount_to_wei(amount: Decimal) -> u128 {
    amount
        .trunc()
        .to_string()
        .parse::<u128>()
        .unwrap_or(u128::MAX)
}

/// Compare an offer amount against a fetched balance
pub(crate) fn classify_balance(amount: Decimal, balance: u128, native: bool) -> CheckOutcome {
    if balance >= amount_to_wei(amount) {
        CheckOutcome::Funded
    } else if native {
        CheckOutcome::Unfunded(UnfundedReason::InsufficientEth)
    } else {
        CheckOutcome::Unfunded(UnfundedReason::InsufficientToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::application::validation::test_support::{
        mock_repositories, test_config, ScriptedChain,
    };
    use crate::infrastructure::queue::JobQueue;

    const ONE_ETH: u128 = 1_000_000_000_000_000_000;
    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

    fn validator(chain: ScriptedChain) -> OfferValidator {
        let repositories = mock_repositories();
        let activity = ActivityService::new(repositories.activity.clone());
        let queue = JobQueue::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));
        OfferValidator::new(
            repositories,
            Arc::new(chain),
            CurrencyRegistry::mainnet(),
            activity,
            Notifier::new(queue),
            test_config(),
        )
    }

    fn pending_offer(id: i64, amount: u64, currency: &str) -> offers::Model {
        let now = Utc::now().fixed_offset();
        offers::Model {
            id,
            asset_id: 1,
            buyer_address: format!("0x{:040x}", id),
            amount: Decimal::from(amount),
            currency: currency.to_string(),
            expires_at: now + chrono::Duration::days(7),
            status: "pending".to_string(),
            unfunded_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_token_batch_partial_failure_yields_one_retry() {
        // Three offers in one multicall; the middle sub-call fails. The two
        // definitive results classify, the failed slot only requests retry.
        let offers = vec![
            pending_offer(1, 1_000, WETH),
            pending_offer(2, 1_000, WETH),
            pending_offer(3, 1_000, WETH),
        ];
        let chain = ScriptedChain {
            token_results: vec![
                MulticallOutcome::Balance(2_000),
                MulticallOutcome::Failed("sub-call reverted".to_string()),
                MulticallOutcome::Balance(500),
            ],
            ..Default::default()
        };
        let validator = validator(chain);

        let group: Vec<&offers::Model> = offers.iter().collect();
        let outcomes = validator.check_token_group(WETH, &group).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], (1, CheckOutcome::Funded));
        assert!(matches!(outcomes[1], (2, CheckOutcome::Indeterminate(_))));
        assert_eq!(
            outcomes[2],
            (3, CheckOutcome::Unfunded(UnfundedReason::InsufficientToken))
        );
    }

    #[tokio::test]
    async fn test_native_balance_error_requests_retry_only() {
        let offers = vec![pending_offer(1, 1_000, "eth")];
        let chain = ScriptedChain {
            native_balance: Err("connection refused".to_string()),
            ..Default::default()
        };
        let validator = validator(chain);

        let group: Vec<&offers::Model> = offers.iter().collect();
        let outcomes = validator.check_native_group(&group).await;
        assert!(matches!(outcomes[0], (1, CheckOutcome::Indeterminate(_))));
    }

    #[test]
    fn test_insufficient_native_balance() {
        // Offer of 1.5 ETH against an on-chain balance of 1.0 ETH
        let amount = Decimal::from(1_500_000_000_000_000_000_u64);
        let outcome = classify_balance(amount, ONE_ETH, true);
        assert_eq!(
            outcome,
            CheckOutcome::Unfunded(UnfundedReason::InsufficientEth)
        );
    }

    #[test]
    fn test_sufficient_balance_is_funded() {
        let amount = Decimal::from(1_000u64);
        assert_eq!(classify_balance(amount, 1_000, false), CheckOutcome::Funded);
        assert_eq!(classify_balance(amount, 2_000, false), CheckOutcome::Funded);
    }

    #[test]
    fn test_insufficient_token_balance() {
        let amount = Decimal::from(1_000u64);
        assert_eq!(
            classify_balance(amount, 999, false),
            CheckOutcome::Unfunded(UnfundedReason::InsufficientToken)
        );
    }

    #[test]
    fn test_amount_to_wei_bounds() {
        // Decimal's full integral range (2^96 - 1) fits in u128
        assert_eq!(
            amount_to_wei(Decimal::MAX),
            79_228_162_514_264_337_593_543_950_335
        );
        // A nonsense negative amount clamps to the unmeetable maximum, so
        // the offer can never classify as funded
        assert_eq!(amount_to_wei(Decimal::from(-1)), u128::MAX);
        assert_eq!(
            classify_balance(Decimal::from(-1), u128::MAX - 1, true),
            CheckOutcome::Unfunded(UnfundedReason::InsufficientEth)
        );
    }
}
