//! Currency registry
//!
//! Listings and offers carry a currency string: "eth" for the native
//! currency or a token contract address. Resolution goes through an explicit
//! lookup table; anything not in the table is a typed Unknown, which the
//! validation engine treats as a definitive invalid result rather than
//! guessing.

use std::collections::HashMap;

/// A known fungible token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// A resolved currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Currency {
    /// Native ETH
    Native,
    /// A token from the registry
    Token(TokenInfo),
    /// Not in the registry; carries the raw currency string
    Unknown(String),
}

impl Currency {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Currency::Unknown(_))
    }
}

/// Lookup table from currency string to resolved currency
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    tokens: HashMap<String, TokenInfo>,
}

impl CurrencyRegistry {
    /// Registry with the tokens the marketplace accepts on mainnet
    pub fn mainnet() -> Self {
        let mut registry = Self {
            tokens: HashMap::new(),
        };
        registry.register("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "WETH", 18);
        registry.register("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6);
        registry.register("0x6B175474E89094C44Da98b954EedeAC495271d0F", "DAI", 18);
        registry
    }

    /// An empty registry, for tests
    pub fn empty() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Add a token to the table
    pub fn register(&mut self, address: &str, symbol: &'static str, decimals: u8) {
        self.tokens.insert(
            address.to_lowercase(),
            TokenInfo {
                address: address.to_string(),
                symbol,
                decimals,
            },
        );
    }

    /// Resolve a currency string
    pub fn resolve(&self, currency: &str) -> Currency {
        if currency.eq_ignore_ascii_case("eth") {
            return Currency::Native;
        }
        match self.tokens.get(&currency.to_lowercase()) {
            Some(token) => Currency::Token(token.clone()),
            None => Currency::Unknown(currency.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_native() {
        let registry = CurrencyRegistry::mainnet();
        assert_eq!(registry.resolve("eth"), Currency::Native);
        assert_eq!(registry.resolve("ETH"), Currency::Native);
    }

    #[test]
    fn test_resolve_known_token_case_insensitive() {
        let registry = CurrencyRegistry::mainnet();
        let resolved = registry.resolve("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        match resolved {
            Currency::Token(token) => assert_eq!(token.symbol, "WETH"),
            other => panic!("Expected WETH, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_registry_resolves_only_native() {
        let registry = CurrencyRegistry::empty();
        assert_eq!(registry.resolve("eth"), Currency::Native);
        assert!(registry
            .resolve("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
            .is_unknown());
    }

    #[test]
    fn test_resolve_unknown_is_typed() {
        let registry = CurrencyRegistry::mainnet();
        let resolved = registry.resolve("0x000000000000000000000000000000000000beef");
        assert!(resolved.is_unknown());
        match resolved {
            Currency::Unknown(raw) => {
                assert_eq!(raw, "0x000000000000000000000000000000000000beef")
            }
            _ => unreachable!(),
        }
    }
}
