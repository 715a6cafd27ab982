use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::repositories::{
    ActivityRepository, AssetRepository, GroupStatsRepository, ListingRepository, OfferRepository,
    Repositories, ValidationStateRepository,
};

/// Factory for creating repositories
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create all repositories
    pub fn create_repositories(db_pool: &DbPool, config: &AppConfig) -> Repositories {
        let conn = db_pool.get_connection().clone();

        Repositories::new(
            Self::create_activity_repository(conn.clone(), config),
            Self::create_asset_repository(conn.clone()),
            Self::create_group_stats_repository(conn.clone()),
            Self::create_listing_repository(conn.clone()),
            Self::create_offer_repository(conn.clone()),
            Self::create_validation_state_repository(conn),
        )
    }

    /// Create an activity repository
    pub fn create_activity_repository(
        conn: Arc<DatabaseConnection>,
        config: &AppConfig,
    ) -> ActivityRepository {
        ActivityRepository::new(conn, config.activity.dedup_window_secs)
    }

    /// Create an asset repository
    pub fn create_asset_repository(conn: Arc<DatabaseConnection>) -> AssetRepository {
        AssetRepository::new(conn)
    }

    /// Create a group stats repository
    pub fn create_group_stats_repository(conn: Arc<DatabaseConnection>) -> GroupStatsRepository {
        GroupStatsRepository::new(conn)
    }

    /// Create a listing repository
    pub fn create_listing_repository(conn: Arc<DatabaseConnection>) -> ListingRepository {
        ListingRepository::new(conn)
    }

    /// Create an offer repository
    pub fn create_offer_repository(conn: Arc<DatabaseConnection>) -> OfferRepository {
        OfferRepository::new(conn)
    }

    /// Create a validation state repository
    pub fn create_validation_state_repository(
        conn: Arc<DatabaseConnection>,
    ) -> ValidationStateRepository {
        ValidationStateRepository::new(conn)
    }
}
