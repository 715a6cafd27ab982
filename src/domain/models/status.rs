//! Status enums for listings and offers
//!
//! Statuses are stored as strings in the relational store; these enums are
//! the only place the string forms are defined.

use std::fmt;

/// Listing lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Unfunded,
    Sold,
    Cancelled,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Unfunded => "unfunded",
            ListingStatus::Sold => "sold",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "unfunded" => Some(ListingStatus::Unfunded),
            "sold" => Some(ListingStatus::Sold),
            "cancelled" => Some(ListingStatus::Cancelled),
            "expired" => Some(ListingStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Offer lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferStatus {
    Pending,
    Unfunded,
    Accepted,
    Rejected,
    Expired,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Unfunded => "unfunded",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OfferStatus::Pending),
            "unfunded" => Some(OfferStatus::Unfunded),
            "accepted" => Some(OfferStatus::Accepted),
            "rejected" => Some(OfferStatus::Rejected),
            "expired" => Some(OfferStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an entity was moved to unfunded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnfundedReason {
    OwnershipLost,
    InsufficientEth,
    InsufficientToken,
    UnsupportedCurrency,
}

impl UnfundedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnfundedReason::OwnershipLost => "ownership_lost",
            UnfundedReason::InsufficientEth => "insufficient_eth",
            UnfundedReason::InsufficientToken => "insufficient_token",
            UnfundedReason::UnsupportedCurrency => "unsupported_currency",
        }
    }
}

impl fmt::Display for UnfundedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which table a validation state row refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Listing,
    Offer,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Listing => "listing",
            EntityKind::Offer => "offer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(EntityKind::Listing),
            "offer" => Some(EntityKind::Offer),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
