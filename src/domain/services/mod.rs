pub mod currency;
pub mod enrichment;
pub mod ownership;
pub mod transitions;

pub use currency::{Currency, CurrencyRegistry};
pub use enrichment::build_document;
pub use ownership::{classify_ownership_change, OwnershipChange};
pub use transitions::{decide_transition, CheckOutcome, EntityPhase, TransitionDecision};
