//! Repository for listing operations
//!
//! Status mutations are conditional updates: the filter carries the expected
//! current status, so a concurrent user action (cancel, purchase) can never
//! be overwritten by a stale check result. Callers inspect the affected row
//! count to learn whether the transition actually happened.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Statement,
};

use crate::domain::models::{ListingStatus, UnfundedReason};
use crate::infrastructure::persistence::entities::listings;
use crate::infrastructure::persistence::error::DbError;

/// Repository for listing operations
#[derive(Clone, Debug)]
pub struct ListingRepository {
    conn: Arc<DatabaseConnection>,
}

impl ListingRepository {
    /// Create a new ListingRepository
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Get a listing by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<listings::Model>, DbError> {
        let result = listings::Entity::find_by_id(id).one(self.conn.as_ref()).await?;
        Ok(result)
    }

    /// Current active listing for an asset, if any
    pub async fn find_active_by_asset(
        &self,
        asset_id: i64,
    ) -> Result<Option<listings::Model>, DbError> {
        let result = listings::Entity::find()
            .filter(listings::Column::AssetId.eq(asset_id))
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()))
            .order_by_desc(listings::Column::CreatedAt)
            .one(self.conn.as_ref())
            .await?;
        Ok(result)
    }

    /// Active listings for a page of assets
    pub async fn find_active_by_assets(
        &self,
        asset_ids: &[i64],
    ) -> Result<Vec<listings::Model>, DbError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = listings::Entity::find()
            .filter(listings::Column::AssetId.is_in(asset_ids.to_vec()))
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()))
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// Move an active listing to unfunded; returns false if it was no longer active
    pub async fn mark_unfunded(
        &self,
        id: i64,
        reason: UnfundedReason,
    ) -> Result<bool, DbError> {
        let result = listings::Entity::update_many()
            .col_expr(
                listings::Column::Status,
                Expr::value(ListingStatus::Unfunded.as_str()),
            )
            .col_expr(
                listings::Column::UnfundedReason,
                Expr::value(reason.as_str()),
            )
            .col_expr(
                listings::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(listings::Column::Id.eq(id))
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Refund transition: unfunded back to active; returns false when the
    /// listing left the unfunded state in the meantime
    pub async fn mark_refunded(&self, id: i64) -> Result<bool, DbError> {
        let result = listings::Entity::update_many()
            .col_expr(
                listings::Column::Status,
                Expr::value(ListingStatus::Active.as_str()),
            )
            .col_expr(listings::Column::UnfundedReason, Expr::value(Option::<String>::None))
            .col_expr(
                listings::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(listings::Column::Id.eq(id))
            .filter(listings::Column::Status.eq(ListingStatus::Unfunded.as_str()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Precise expiry: active and past its deadline, or no-op
    pub async fn expire_if_due(&self, id: i64) -> Result<bool, DbError> {
        let result = listings::Entity::update_many()
            .col_expr(
                listings::Column::Status,
                Expr::value(ListingStatus::Expired.as_str()),
            )
            .col_expr(
                listings::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(listings::Column::Id.eq(id))
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()))
            .filter(listings::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .exec(self.conn.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// One batch of the safety-net sweep; returns the expired listings
    pub async fn expire_overdue_batch(
        &self,
        batch_size: u64,
    ) -> Result<Vec<listings::Model>, DbError> {
        let overdue = listings::Entity::find()
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()))
            .filter(listings::Column::ExpiresAt.lte(Utc::now().fixed_offset()))
            .limit(batch_size)
            .all(self.conn.as_ref())
            .await?;

        let mut expired = Vec::with_capacity(overdue.len());
        for listing in overdue {
            if self.expire_if_due(listing.id).await? {
                expired.push(listing);
            }
        }
        Ok(expired)
    }

    /// Listings due for validation, oldest check first
    ///
    /// Never-checked listings sort by creation time, so new rows do not
    /// starve behind the recheck backlog.
    pub async fn find_due_for_validation(&self, limit: u64) -> Result<Vec<i64>, DbError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT l.id FROM listings l
            LEFT JOIN validation_states v
                ON v.entity_kind = 'listing' AND v.entity_id = l.id
            WHERE l.status = 'active'
            ORDER BY COALESCE(v.last_checked_at, l.created_at) ASC
            LIMIT $1
            "#,
            [(limit as i64).into()],
        );

        let rows = self.conn.query_all(stmt).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get::<i64>("", "id")?);
        }
        Ok(ids)
    }

    /// Unfunded listings still inside the recheck window
    pub async fn find_unfunded_since(
        &self,
        cutoff: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<listings::Model>, DbError> {
        let results = listings::Entity::find()
            .filter(listings::Column::Status.eq(ListingStatus::Unfunded.as_str()))
            .filter(listings::Column::UpdatedAt.gte(cutoff))
            .order_by_asc(listings::Column::UpdatedAt)
            .limit(limit)
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// Listings updated after a polling cursor, oldest first
    pub async fn find_updated_after(
        &self,
        cursor: DateTime<FixedOffset>,
        limit: u64,
    ) -> Result<Vec<listings::Model>, DbError> {
        let results = listings::Entity::find()
            .filter(listings::Column::UpdatedAt.gt(cursor))
            .order_by_asc(listings::Column::UpdatedAt)
            .limit(limit)
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }
}
