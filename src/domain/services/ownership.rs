//! Ownership-change classification
//!
//! The capture engine sees owner transitions on asset rows and turns them
//! into mint/burn/transfer activity. This is the single place that
//! classification happens.

/// Classified owner transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipChange {
    /// From the zero/burn address to a holder
    Minted { to: String },
    /// From a holder to the zero/burn address
    Burned { from: String },
    /// Holder to holder
    Transferred { from: String, to: String },
}

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const DEAD_ADDRESS: &str = "0x000000000000000000000000000000000000dead";

fn is_burn_address(address: &str) -> bool {
    address.is_empty()
        || address.eq_ignore_ascii_case(ZERO_ADDRESS)
        || address.eq_ignore_ascii_case(DEAD_ADDRESS)
}

/// Classify an observed owner change, or None when nothing moved
pub fn classify_ownership_change(
    old_owner: Option<&str>,
    new_owner: &str,
) -> Option<OwnershipChange> {
    let old_owner = old_owner.unwrap_or("");

    if old_owner.eq_ignore_ascii_case(new_owner) {
        return None;
    }

    let old_is_burn = is_burn_address(old_owner);
    let new_is_burn = is_burn_address(new_owner);

    match (old_is_burn, new_is_burn) {
        (true, true) => None,
        (true, false) => Some(OwnershipChange::Minted {
            to: new_owner.to_string(),
        }),
        (false, true) => Some(OwnershipChange::Burned {
            from: old_owner.to_string(),
        }),
        (false, false) => Some(OwnershipChange::Transferred {
            from: old_owner.to_string(),
            to: new_owner.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_from_zero() {
        let change = classify_ownership_change(Some(ZERO_ADDRESS), "0xabc");
        assert_eq!(
            change,
            Some(OwnershipChange::Minted {
                to: "0xabc".to_string()
            })
        );
    }

    #[test]
    fn test_mint_from_missing_old_owner() {
        let change = classify_ownership_change(None, "0xabc");
        assert_eq!(
            change,
            Some(OwnershipChange::Minted {
                to: "0xabc".to_string()
            })
        );
    }

    #[test]
    fn test_burn_to_dead() {
        let change = classify_ownership_change(Some("0xabc"), DEAD_ADDRESS);
        assert_eq!(
            change,
            Some(OwnershipChange::Burned {
                from: "0xabc".to_string()
            })
        );
    }

    #[test]
    fn test_transfer() {
        let change = classify_ownership_change(Some("0xabc"), "0xdef");
        assert_eq!(
            change,
            Some(OwnershipChange::Transferred {
                from: "0xabc".to_string(),
                to: "0xdef".to_string()
            })
        );
    }

    #[test]
    fn test_no_change_is_none() {
        assert_eq!(classify_ownership_change(Some("0xABC"), "0xabc"), None);
    }
}
