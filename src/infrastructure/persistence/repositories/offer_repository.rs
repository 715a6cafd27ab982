//! Repository for offer operations
//!
//! Follows the same conditional-update discipline as the listing
//! repository: every status mutation carries the expected current status in
//! its filter and reports whether a row actually moved.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::domain::models::{OfferStatus, UnfundedReason};
use crate::infrastructure::persistence::entities::offers;
use crate::infrastructure::persistence::error::DbError;

/// Pending-offer aggregates for one asset
#[derive(Debug, Clone, Default)]
pub struct OfferAggregates {
    pub count: i64,
    pub max_amount: Option<Decimal>,
}

/// Repository for offer operations
#[derive(Clone, Debug)]
pub struct OfferRepository {
    conn: Arc<DatabaseConnection>,
}

impl OfferRepository {
    /// Create a new OfferRepository
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Get an offer by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<offers::Model>, DbError> {
        let result = offers::Entity::find_by_id(id).one(self.conn.as_ref()).await?;
        Ok(result)
    }

    /// Get several offers by id
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<offers::Model>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = offers::Entity::find()
            .filter(offers::Column::Id.is_in(ids.to_vec()))
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// All pending offer ids, for the periodic batch revalidation
    pub async fn find_all_pending_ids(&self) -> Result<Vec<i64>, DbError> {
        let results = offers::Entity::find()
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .order_by_asc(offers::Column::Id)
            .all(self.conn.as_ref())
            .await?;
        Ok(results.into_iter().map(|o| o.id).collect())
    }

    /// Pending offers for a page of assets
    pub async fn find_pending_by_assets(
        &self,
        asset_ids: &[i64],
    ) -> Result<Vec<offers::Model>, DbError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = offers::Entity::find()
            .filter(offers::Column::AssetId.is_in(asset_ids.to_vec()))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// Pending-offer aggregates for one asset
    pub async fn aggregates_for_asset(&self, asset_id: i64) -> Result<OfferAggregates, DbError> {
        let pending = self.find_pending_by_assets(&[asset_id]).await?;
        let mut aggregates = OfferAggregates {
            count: pending.len() as i64,
            max_amount: None,
        };
        for offer in &pending {
            if aggregates.max_amount.map_or(true, |max| offer.amount > max) {
                aggregates.max_amount = Some(offer.amount);
            }
        }
        Ok(aggregates)
    }

    /// Highest pending offer for an asset, if any
    pub async fn find_highest_pending(
        &self,
        asset_id: i64,
    ) -> Result<Option<offers::Model>, DbError> {
        let result = offers::Entity::find()
            .filter(offers::Column::AssetId.eq(asset_id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .order_by_desc(offers::Column::Amount)
            .one(self.conn.as_ref())
            .await?;
        Ok(result)
    }

    /// Move a pending offer to unfunded; returns false if it was no longer pending
    pub async fn mark_unfunded(&self, id: i64, reason: UnfundedReason) -> Result<bool, DbError> {
        let result = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Unfunded.as_str()),
            )
            .col_expr(offers::Column::UnfundedReason, Expr::value(reason.as_str()))
            .col_expr(
                offers::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(offers::Column::Id.eq(id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Refund transition: unfunded back to pending
    pub async fn mark_refunded(&self, id: i64) -> Result<bool, DbError> {
        let result = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Pending.as_str()),
            )
            .col_expr(offers::Column::UnfundedReason, Expr::value(Option::<String>::None))
            .col_expr(
                offers::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(offers::Column::Id.eq(id))
            .filter(offers::Column::Status.eq(OfferStatus::Unfunded.as_str()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Precise expiry: pending and past its deadline, or no-op
    pub async fn expire_if_due(&self, id: i64) -> Result<bool, DbError> {
        let result = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Expired.as_str()),
            )
            .col_expr(
                offers::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(offers::Column::Id.eq(id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .filter(offers::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// One batch of the safety-net sweep; returns the expired offers
    pub async fn expire_overdue_batch(
        &self,
        batch_size: u64,
    ) -> Result<Vec<offers::Model>, DbError> {
        let overdue = offers::Entity::find()
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .filter(offers::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .limit(batch_size)
            .all(self.conn.as_ref())
            .await?;

        let mut expired = Vec::with_capacity(overdue.len());
        for offer in overdue {
            if self.expire_if_due(offer.id).await? {
                expired.push(offer);
            }
        }
        Ok(expired)
    }

    /// Unfunded offer ids still inside the recheck window
    pub async fn find_unfunded_since(
        &self,
        cutoff: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<i64>, DbError> {
        let results = offers::Entity::find()
            .filter(offers::Column::Status.eq(OfferStatus::Unfunded.as_str()))
            .filter(offers::Column::UpdatedAt.gte(cutoff))
            .order_by_asc(offers::Column::UpdatedAt)
            .limit(limit)
            .all(self.conn.as_ref())
            .await?;
        Ok(results.into_iter().map(|o| o.id).collect())
    }

    /// Offers updated after a polling cursor, oldest first
    pub async fn find_updated_after(
        &self,
        cursor: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<offers::Model>, DbError> {
        let results = offers::Entity::find()
            .filter(offers::Column::UpdatedAt.gt(cursor))
            .order_by_asc(offers::Column::UpdatedAt)
            .limit(limit)
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }
}
