//! Denormalized search index document
//!
//! Entirely derived from the relational store; rebuildable at any time by a
//! full resync.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a name sits in its registration lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryState {
    /// Registration current
    Active,
    /// Past expiry, inside the grace window; owner can still renew
    Grace,
    /// Past grace, inside the premium-decay window; anyone can register at a premium
    PremiumDecay,
    /// Fully released; available at base price
    Released,
}

impl ExpiryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryState::Active => "active",
            ExpiryState::Grace => "grace",
            ExpiryState::PremiumDecay => "premium_decay",
            ExpiryState::Released => "released",
        }
    }
}

impl fmt::Display for ExpiryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One document per asset in the search index, keyed by asset id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: i64,
    pub name: String,
    pub owner_address: String,
    pub registered_at: String,
    pub expires_at: String,
    pub groups: Vec<String>,

    // Current active listing, if any
    pub listing_id: Option<i64>,
    pub listing_price: Option<Decimal>,
    pub listing_currency: Option<String>,
    pub listing_expires_at: Option<String>,

    // Pending offer aggregates
    pub offer_count: i64,
    pub max_offer_amount: Option<Decimal>,

    // Derived fields
    pub character_count: u32,
    pub is_numeric: bool,
    pub has_emoji: bool,
    pub expiry_state: ExpiryState,
    pub premium_price_usd: Option<f64>,
}
