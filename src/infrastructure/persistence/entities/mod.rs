pub mod activity_records;
pub mod assets;
pub mod group_stats;
pub mod jobs;
pub mod listings;
pub mod offers;
pub mod validation_states;
