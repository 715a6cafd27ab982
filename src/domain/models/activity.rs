//! Activity ledger domain types

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;

/// Where an activity record originated, which decides its dedup key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivitySource {
    /// Derived from a confirmed on-chain event; deduplicated by
    /// (asset, event type, tx hash, block, actor)
    Blockchain,
    /// Derived from the order protocol (listing/offer lifecycle);
    /// deduplicated by order id within a time window
    Protocol,
}

/// A domain event destined for the activity ledger
#[derive(Clone, Debug)]
pub struct ActivityEvent {
    pub asset_id: i64,
    pub event_type: String,
    pub actor: String,
    pub counterparty: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub order_id: Option<i64>,
    pub metadata: Value,
    pub source: ActivitySource,
}

impl ActivityEvent {
    /// A protocol-sourced event tied to a listing or offer row
    pub fn protocol(asset_id: i64, event_type: &str, actor: &str, order_id: i64) -> Self {
        Self {
            asset_id,
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            counterparty: None,
            price: None,
            currency: None,
            tx_hash: None,
            block_number: None,
            order_id: Some(order_id),
            metadata: Value::Object(Default::default()),
            source: ActivitySource::Protocol,
        }
    }

    /// A blockchain-sourced event carrying its transaction context
    pub fn blockchain(
        asset_id: i64,
        event_type: &str,
        actor: &str,
        tx_hash: Option<String>,
        block_number: Option<i64>,
    ) -> Self {
        Self {
            asset_id,
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            counterparty: None,
            price: None,
            currency: None,
            tx_hash,
            block_number,
            order_id: None,
            metadata: Value::Object(Default::default()),
            source: ActivitySource::Blockchain,
        }
    }

    pub fn with_counterparty(mut self, counterparty: &str) -> Self {
        self.counterparty = Some(counterparty.to_string());
        self
    }

    pub fn with_price(mut self, price: Decimal, currency: &str) -> Self {
        self.price = Some(price);
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} asset={} actor={}",
            self.event_type, self.asset_id, self.actor
        )
    }
}

/// Window bound used by protocol-source deduplication
pub fn dedup_cutoff(
    now: DateTime<FixedOffset>,
    window_secs: i64,
) -> DateTime<FixedOffset> {
    now - chrono::Duration::seconds(window_secs)
}
