pub mod activity;
pub mod search_document;
pub mod status;

pub use activity::{ActivityEvent, ActivitySource};
pub use search_document::{ExpiryState, SearchDocument};
pub use status::{EntityKind, ListingStatus, OfferStatus, UnfundedReason};
