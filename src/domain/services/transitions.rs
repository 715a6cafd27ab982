//! Funding status state machine
//!
//! One pure decision function shared by listing and offer validation.
//! Invariants:
//!   - funded-state to unfunded only fires from the live phase, so a
//!     cancelled or sold entity is never flagged
//!   - unfunded back to live only fires with an explicit refund intent,
//!     never as a side effect of a routine check
//!   - an indeterminate check never transitions anything

use crate::domain::models::UnfundedReason;

/// Where the entity currently sits, collapsed across listing/offer statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPhase {
    /// active (listing) or pending (offer)
    Live,
    Unfunded,
    /// sold, cancelled, accepted, rejected or expired
    Terminal,
}

/// Result of a funding check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Ownership/balance holds
    Funded,
    /// Definitive invalid result
    Unfunded(UnfundedReason),
    /// Transient trouble (RPC failure, timeout); retry later
    Indeterminate(String),
}

/// What the caller should do with the entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    MarkUnfunded(UnfundedReason),
    MarkRefunded,
    /// No transition; the bool is true when the check should be retried
    NoChange { retry: bool },
}

/// Decide the transition for one check result
pub fn decide_transition(
    phase: EntityPhase,
    outcome: &CheckOutcome,
    refund_intent: bool,
) -> TransitionDecision {
    match (phase, outcome) {
        (EntityPhase::Live, CheckOutcome::Unfunded(reason)) => {
            TransitionDecision::MarkUnfunded(*reason)
        }
        (EntityPhase::Unfunded, CheckOutcome::Funded) if refund_intent => {
            TransitionDecision::MarkRefunded
        }
        (_, CheckOutcome::Indeterminate(_)) => TransitionDecision::NoChange { retry: true },
        _ => TransitionDecision::NoChange { retry: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_entity_goes_unfunded() {
        let decision = decide_transition(
            EntityPhase::Live,
            &CheckOutcome::Unfunded(UnfundedReason::OwnershipLost),
            false,
        );
        assert_eq!(
            decision,
            TransitionDecision::MarkUnfunded(UnfundedReason::OwnershipLost)
        );
    }

    #[test]
    fn test_routine_check_never_revives_unfunded() {
        // A funded result against an unfunded entity without refund intent
        // stays put; this is the state-machine safety property.
        let decision = decide_transition(EntityPhase::Unfunded, &CheckOutcome::Funded, false);
        assert_eq!(decision, TransitionDecision::NoChange { retry: false });
    }

    #[test]
    fn test_refund_requires_intent_and_unfunded_phase() {
        let decision = decide_transition(EntityPhase::Unfunded, &CheckOutcome::Funded, true);
        assert_eq!(decision, TransitionDecision::MarkRefunded);

        // Intent alone is not enough from other phases
        let decision = decide_transition(EntityPhase::Live, &CheckOutcome::Funded, true);
        assert_eq!(decision, TransitionDecision::NoChange { retry: false });
    }

    #[test]
    fn test_no_double_unfunded_transition() {
        let decision = decide_transition(
            EntityPhase::Unfunded,
            &CheckOutcome::Unfunded(UnfundedReason::InsufficientEth),
            false,
        );
        assert_eq!(decision, TransitionDecision::NoChange { retry: false });
    }

    #[test]
    fn test_terminal_entities_never_move() {
        let decision = decide_transition(
            EntityPhase::Terminal,
            &CheckOutcome::Unfunded(UnfundedReason::OwnershipLost),
            false,
        );
        assert_eq!(decision, TransitionDecision::NoChange { retry: false });
    }

    #[test]
    fn test_indeterminate_requests_retry() {
        let decision = decide_transition(
            EntityPhase::Live,
            &CheckOutcome::Indeterminate("rpc timeout".to_string()),
            false,
        );
        assert_eq!(decision, TransitionDecision::NoChange { retry: true });
    }
}
