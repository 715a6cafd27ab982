pub mod activity;
pub mod capture;
pub mod expiry;
pub mod jobs;
pub mod notifications;
pub mod stats;
pub mod validation;
