//! Repository for asset operations

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::infrastructure::persistence::entities::assets;
use crate::infrastructure::persistence::error::DbError;

/// Repository for asset operations
#[derive(Clone, Debug)]
pub struct AssetRepository {
    conn: Arc<DatabaseConnection>,
}

impl AssetRepository {
    /// Create a new AssetRepository
    pub fn new(conn: Arc<DatabaseConnection>) -> Self {
        Self { conn }
    }

    /// Get an asset by id
    pub async fn get_by_id(&self, id: i64) -> Result<Option<assets::Model>, DbError> {
        let result = assets::Entity::find_by_id(id).one(self.conn.as_ref()).await?;
        Ok(result)
    }

    /// Page through all assets in id order
    ///
    /// Used by the full resync; `after_id` is the last id of the previous
    /// page (0 for the first page).
    pub async fn page_after(
        &self,
        after_id: i64,
        page_size: u64,
    ) -> Result<Vec<assets::Model>, DbError> {
        let results = assets::Entity::find()
            .filter(assets::Column::Id.gt(after_id))
            .order_by_asc(assets::Column::Id)
            .limit(page_size)
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// Update the cached highest-offer pointer
    pub async fn set_highest_offer(
        &self,
        asset_id: i64,
        offer_id: Option<i64>,
    ) -> Result<(), DbError> {
        if let Some(asset) = assets::Entity::find_by_id(asset_id).one(self.conn.as_ref()).await? {
            let mut active: assets::ActiveModel = asset.into();
            active.highest_offer_id = Set(offer_id);
            active.updated_at = Set(chrono::Utc::now().fixed_offset());
            active.update(self.conn.as_ref()).await?;
        }
        Ok(())
    }

    /// Assets updated after a polling cursor, oldest first
    pub async fn find_updated_after(
        &self,
        cursor: chrono::DateTime<chrono::FixedOffset>,
        limit: u64,
    ) -> Result<Vec<assets::Model>, DbError> {
        let results = assets::Entity::find()
            .filter(assets::Column::UpdatedAt.gt(cursor))
            .order_by_asc(assets::Column::UpdatedAt)
            .limit(limit)
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }

    /// Assets whose highest-offer pointer references one of the given offers
    pub async fn find_by_highest_offer(
        &self,
        offer_ids: &[i64],
    ) -> Result<Vec<assets::Model>, DbError> {
        if offer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let results = assets::Entity::find()
            .filter(assets::Column::HighestOfferId.is_in(offer_ids.to_vec()))
            .all(self.conn.as_ref())
            .await?;
        Ok(results)
    }
}
