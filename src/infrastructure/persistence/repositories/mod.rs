pub mod activity_repository;
pub mod asset_repository;
pub mod group_stats_repository;
pub mod listing_repository;
pub mod offer_repository;
pub mod validation_state_repository;

pub use activity_repository::ActivityRepository;
pub use asset_repository::AssetRepository;
pub use group_stats_repository::GroupStatsRepository;
pub use listing_repository::ListingRepository;
pub use offer_repository::OfferRepository;
pub use validation_state_repository::ValidationStateRepository;

/// Collection of all repositories
pub struct Repositories {
    /// Repository for activity ledger operations
    pub activity: ActivityRepository,
    /// Repository for asset operations
    pub asset: AssetRepository,
    /// Repository for group statistics operations
    pub group_stats: GroupStatsRepository,
    /// Repository for listing operations
    pub listing: ListingRepository,
    /// Repository for offer operations
    pub offer: OfferRepository,
    /// Repository for validation state operations
    pub validation_state: ValidationStateRepository,
}

impl Repositories {
    /// Create a new Repositories instance
    pub fn new(
        activity: ActivityRepository,
        asset: AssetRepository,
        group_stats: GroupStatsRepository,
        listing: ListingRepository,
        offer: OfferRepository,
        validation_state: ValidationStateRepository,
    ) -> Self {
        Self {
            activity,
            asset,
            group_stats,
            listing,
            offer,
            validation_state,
        }
    }
}
