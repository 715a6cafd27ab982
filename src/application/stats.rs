//! Aggregate group statistics
//!
//! Recomputes a group's floor price and lifetime sale totals from current
//! state, never incrementally, so a recompute always repairs any drift.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::domain::errors::ValidationError;
use crate::infrastructure::persistence::repositories::Repositories;
use crate::utils::logging;

/// Recomputes per-group aggregate stats
pub struct StatsEngine {
    repositories: Arc<Repositories>,
}

impl StatsEngine {
    /// Create a new StatsEngine
    pub fn new(repositories: Arc<Repositories>) -> Self {
        Self { repositories }
    }

    /// Recompute and store the stats row for one group
    pub async fn recalculate(&self, group_slug: &str) -> Result<(), ValidationError> {
        let asset_ids = self
            .repositories
            .group_stats
            .find_asset_ids_in_group(group_slug)
            .await?;

        if asset_ids.is_empty() {
            // An empty group still gets a zeroed row, so consumers see it
            // was computed rather than never visited
            self.repositories
                .group_stats
                .upsert(group_slug, None, Decimal::ZERO, 0)
                .await?;
            return Ok(());
        }

        let listings = self
            .repositories
            .listing
            .find_active_by_assets(&asset_ids)
            .await?;
        let floor = floor_price(listings.iter().map(|l| l.price));

        let sales = self
            .repositories
            .activity
            .find_sales_for_assets(&asset_ids)
            .await?;
        let (volume, count) = sale_totals(sales.iter().map(|s| s.price));

        self.repositories
            .group_stats
            .upsert(group_slug, floor, volume, count)
            .await?;

        logging::log_debug(&format!(
            "Recomputed stats for group {}: floor={:?} volume={} sales={}",
            group_slug, floor, volume, count
        ));
        Ok(())
    }
}

/// Lowest active listing price, if any listing exists
fn floor_price(prices: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    prices.min()
}

/// Total sale volume and count; records without a price still count
fn sale_totals(prices: impl Iterator<Item = Option<Decimal>>) -> (Decimal, i64) {
    let mut volume = Decimal::ZERO;
    let mut count = 0_i64;
    for price in prices {
        volume += price.unwrap_or(Decimal::ZERO);
        count += 1;
    }
    (volume, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_is_minimum_price() {
        let prices = vec![Decimal::from(3), Decimal::from(1), Decimal::from(2)];
        assert_eq!(floor_price(prices.into_iter()), Some(Decimal::from(1)));
    }

    #[test]
    fn test_floor_empty_is_none() {
        assert_eq!(floor_price(std::iter::empty()), None);
    }

    #[test]
    fn test_sale_totals_sum_and_count() {
        let prices = vec![
            Some(Decimal::from(10)),
            None,
            Some(Decimal::from(5)),
        ];
        let (volume, count) = sale_totals(prices.into_iter());
        assert_eq!(volume, Decimal::from(15));
        assert_eq!(count, 3);
    }
}
