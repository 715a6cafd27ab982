//! Outbound notification events
//!
//! This worker only enqueues `send-notification` jobs; an external delivery
//! service drains the topic. Enqueue failures are logged and swallowed so a
//! broken notification path never blocks a state transition.

use serde_json::{json, Value};

use crate::infrastructure::queue::JobQueue;
use crate::utils::logging;

/// Queue topic drained by the delivery service
pub const NOTIFICATION_TOPIC: &str = "send-notification";

/// What happened, from the recipient's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    NewListing,
    PriceChange,
    Sale,
    NewOffer,
    ListingUnfunded,
    OfferUnfunded,
    Refunded,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewListing => "new_listing",
            NotificationType::PriceChange => "price_change",
            NotificationType::Sale => "sale",
            NotificationType::NewOffer => "new_offer",
            NotificationType::ListingUnfunded => "listing_unfunded",
            NotificationType::OfferUnfunded => "offer_unfunded",
            NotificationType::Refunded => "refunded",
        }
    }
}

/// Enqueues notification jobs for the delivery service
#[derive(Clone)]
pub struct Notifier {
    queue: JobQueue,
}

impl Notifier {
    /// Create a new Notifier
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Enqueue one notification; never fails the caller
    pub async fn send(
        &self,
        notification_type: NotificationType,
        recipient: &str,
        asset_id: i64,
        metadata: Value,
    ) {
        let payload = json!({
            "notification_type": notification_type.as_str(),
            "recipient": recipient,
            "asset_id": asset_id,
            "metadata": metadata,
        });

        if let Err(e) = self.queue.send(NOTIFICATION_TOPIC, payload).await {
            logging::log_error(&format!(
                "Failed to enqueue {} notification for asset {}: {}",
                notification_type.as_str(),
                asset_id,
                e
            ));
        }
    }
}
