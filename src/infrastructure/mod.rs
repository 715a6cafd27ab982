pub mod ethereum;
pub mod persistence;
pub mod queue;
pub mod search;
