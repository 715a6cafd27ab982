//! Search document enrichment
//!
//! Builds the denormalized document for one asset from current relational
//! state. Pure given its inputs, so re-running it for the same state is
//! idempotent and capture events can arrive in any order.

use chrono::{DateTime, FixedOffset};

use crate::domain::models::{ExpiryState, SearchDocument};
use crate::infrastructure::persistence::entities::{assets, listings};
use crate::infrastructure::persistence::repositories::offer_repository::OfferAggregates;

/// Days after expiry during which the owner can still renew
const GRACE_DAYS: i64 = 90;
/// Days of premium decay after the grace window
const PREMIUM_DAYS: i64 = 21;
/// Premium start price in USD; halves each day of the decay window
const PREMIUM_START_USD: f64 = 100_000_000.0;

/// Build the search document for one asset
pub fn build_document(
    asset: &assets::Model,
    active_listing: Option<&listings::Model>,
    offers: &OfferAggregates,
    now: DateTime<FixedOffset>,
) -> SearchDocument {
    let expiry_state = expiry_state(asset.expires_at, now);
    let premium_price_usd = premium_price(asset.expires_at, now);

    SearchDocument {
        id: asset.id,
        name: asset.name.clone(),
        owner_address: asset.owner_address.clone(),
        registered_at: asset.registered_at.to_rfc3339(),
        expires_at: asset.expires_at.to_rfc3339(),
        groups: decode_groups(&asset.groups),
        listing_id: active_listing.map(|l| l.id),
        listing_price: active_listing.map(|l| l.price),
        listing_currency: active_listing.map(|l| l.currency.clone()),
        listing_expires_at: active_listing.map(|l| l.expires_at.to_rfc3339()),
        offer_count: offers.count,
        max_offer_amount: offers.max_amount,
        character_count: asset.name.chars().count() as u32,
        is_numeric: is_numeric(&asset.name),
        has_emoji: has_emoji(&asset.name),
        expiry_state,
        premium_price_usd,
    }
}

fn decode_groups(groups: &serde_json::Value) -> Vec<String> {
    groups
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn is_numeric(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

fn has_emoji(name: &str) -> bool {
    name.chars().any(|c| {
        let cp = c as u32;
        (0x1F000..=0x1FAFF).contains(&cp)
            || (0x2600..=0x27BF).contains(&cp)
            || (0x2190..=0x21FF).contains(&cp)
            || cp == 0xFE0F
    })
}

/// Classify where a name sits relative to its expiry windows
pub fn expiry_state(
    expires_at: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> ExpiryState {
    if now < expires_at {
        return ExpiryState::Active;
    }
    let grace_end = expires_at + chrono::Duration::days(GRACE_DAYS);
    if now < grace_end {
        return ExpiryState::Grace;
    }
    let premium_end = grace_end + chrono::Duration::days(PREMIUM_DAYS);
    if now < premium_end {
        return ExpiryState::PremiumDecay;
    }
    ExpiryState::Released
}

/// Current temporary-premium price, present only inside the decay window
///
/// Starts at PREMIUM_START_USD when grace ends and halves each day until the
/// window closes.
pub fn premium_price(
    expires_at: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Option<f64> {
    if expiry_state(expires_at, now) != ExpiryState::PremiumDecay {
        return None;
    }
    let grace_end = expires_at + chrono::Duration::days(GRACE_DAYS);
    let elapsed_secs = (now - grace_end).num_seconds() as f64;
    let elapsed_days = elapsed_secs / 86_400.0;
    Some(PREMIUM_START_USD * 0.5_f64.powf(elapsed_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn asset(expires_in_days: i64) -> assets::Model {
        let now = Utc::now().fixed_offset();
        assets::Model {
            id: 1,
            name: "alice".to_string(),
            token_id: "0x2a".to_string(),
            owner_address: "0xabc".to_string(),
            registered_at: now - chrono::Duration::days(365),
            expires_at: now + chrono::Duration::days(expires_in_days),
            groups: json!(["5-letter"]),
            highest_offer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn listing(asset_id: i64) -> listings::Model {
        let now = Utc::now().fixed_offset();
        listings::Model {
            id: 10,
            asset_id,
            seller_address: "0xabc".to_string(),
            price: Decimal::new(1_500_000_000_000_000_000, 0),
            currency: "eth".to_string(),
            expires_at: now + chrono::Duration::days(7),
            status: "active".to_string(),
            unfunded_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_build_document_is_idempotent() {
        let asset = asset(30);
        let listing = listing(asset.id);
        let aggregates = OfferAggregates {
            count: 3,
            max_amount: Some(Decimal::new(2, 0)),
        };
        let now = Utc::now().fixed_offset();

        let first = build_document(&asset, Some(&listing), &aggregates, now);
        let second = build_document(&asset, Some(&listing), &aggregates, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_document_carries_listing_and_offers() {
        let asset = asset(30);
        let listing = listing(asset.id);
        let aggregates = OfferAggregates {
            count: 2,
            max_amount: Some(Decimal::new(7, 0)),
        };
        let doc = build_document(&asset, Some(&listing), &aggregates, Utc::now().fixed_offset());

        assert_eq!(doc.listing_id, Some(10));
        assert_eq!(doc.offer_count, 2);
        assert_eq!(doc.max_offer_amount, Some(Decimal::new(7, 0)));
        assert_eq!(doc.groups, vec!["5-letter".to_string()]);
        assert_eq!(doc.character_count, 5);
        assert!(!doc.is_numeric);
    }

    #[test]
    fn test_document_without_listing() {
        let asset = asset(30);
        let doc = build_document(
            &asset,
            None,
            &OfferAggregates::default(),
            Utc::now().fixed_offset(),
        );
        assert_eq!(doc.listing_id, None);
        assert_eq!(doc.listing_price, None);
        assert_eq!(doc.offer_count, 0);
    }

    #[test]
    fn test_numeric_and_emoji_flags() {
        assert!(is_numeric("999"));
        assert!(!is_numeric("99a"));
        assert!(!is_numeric(""));
        assert!(has_emoji("fire🔥"));
        assert!(!has_emoji("plain"));
    }

    #[test]
    fn test_expiry_state_windows() {
        let now = Utc::now().fixed_offset();
        assert_eq!(
            expiry_state(now + chrono::Duration::days(1), now),
            ExpiryState::Active
        );
        assert_eq!(
            expiry_state(now - chrono::Duration::days(10), now),
            ExpiryState::Grace
        );
        assert_eq!(
            expiry_state(now - chrono::Duration::days(95), now),
            ExpiryState::PremiumDecay
        );
        assert_eq!(
            expiry_state(now - chrono::Duration::days(200), now),
            ExpiryState::Released
        );
    }

    #[test]
    fn test_premium_price_halves_daily() {
        let now = Utc::now().fixed_offset();
        // One day into the premium window
        let expires_at = now - chrono::Duration::days(GRACE_DAYS + 1);
        let price = premium_price(expires_at, now).unwrap();
        assert!((price - PREMIUM_START_USD / 2.0).abs() < 1.0);

        // Outside the window there is no premium
        assert_eq!(premium_price(now + chrono::Duration::days(1), now), None);
        assert_eq!(
            premium_price(now - chrono::Duration::days(200), now),
            None
        );
    }
}
