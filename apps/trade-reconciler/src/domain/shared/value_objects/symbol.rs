//! Symbol value object for instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// A trading symbol.
///
/// Examples:
/// - Equity: "AAPL", "MSFT"
/// - Crypto pair: "BTC/USD", "ETH/USD"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol.
    ///
    /// The symbol is trimmed and normalized to uppercase.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol with the pair separator removed, as brokers report positions.
    ///
    /// `BTC/USD` becomes `BTCUSD`; equities are returned unchanged.
    #[must_use]
    pub fn compact(&self) -> String {
        self.0.replace('/', "")
    }

    /// Whether two symbols name the same instrument, ignoring the pair separator.
    #[must_use]
    pub fn same_instrument(&self, other: &Self) -> bool {
        self.compact() == other.compact()
    }

    /// Validate the symbol for order submission.
    ///
    /// # Errors
    ///
    /// Returns error if symbol is empty, too long, or contains invalid characters.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol cannot be empty".to_string(),
            });
        }

        if self.0.len() > 21 {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol exceeds maximum length".to_string(),
            });
        }

        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '.')
        {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol contains invalid characters".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_new_normalizes_case_and_whitespace() {
        let s = Symbol::new(" btc/usd ");
        assert_eq!(s.as_str(), "BTC/USD");
    }

    #[test]
    fn symbol_compact_strips_separator() {
        assert_eq!(Symbol::new("ETH/USD").compact(), "ETHUSD");
        assert_eq!(Symbol::new("AAPL").compact(), "AAPL");
    }

    #[test]
    fn symbol_same_instrument_ignores_separator() {
        assert!(Symbol::new("BTC/USD").same_instrument(&Symbol::new("BTCUSD")));
        assert!(!Symbol::new("BTC/USD").same_instrument(&Symbol::new("ETHUSD")));
    }

    #[test]
    fn symbol_validate_empty() {
        assert!(Symbol::new("").validate().is_err());
    }

    #[test]
    fn symbol_validate_too_long() {
        assert!(Symbol::new("A".repeat(25)).validate().is_err());
    }

    #[test]
    fn symbol_validate_invalid_chars() {
        assert!(Symbol::new("AAPL!").validate().is_err());
        assert!(Symbol::new("AA PL").validate().is_err());
    }

    #[test]
    fn symbol_validate_valid() {
        assert!(Symbol::new("AAPL").validate().is_ok());
        assert!(Symbol::new("BTC/USD").validate().is_ok());
        assert!(Symbol::new("BRK.B").validate().is_ok());
    }

    #[test]
    fn symbol_deserialize_normalizes() {
        let s: Symbol = serde_json::from_str("\"eth/usd\"").unwrap();
        assert_eq!(s.as_str(), "ETH/USD");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"ETH/USD\"");
    }

    #[test]
    fn symbol_hash_works() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Symbol::new("AAPL"));
        set.insert(Symbol::new("BTC/USD"));
        set.insert(Symbol::new("aapl"));

        assert_eq!(set.len(), 2);
    }
}
