//! Trading pair identity (BASE/QUOTE format)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading pair in BASE/QUOTE form, e.g. `BTC/USD`.
///
/// Base and quote are stored separately so book keys and display formatting
/// never re-parse the delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// Base currency code (e.g. "BTC")
    pub base: String,
    /// Quote currency code (e.g. "USD")
    pub quote: String,
}

impl Pair {
    /// Create a new pair from base and quote codes
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl FromStr for Pair {
    type Err = PairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '/');
        let base = parts.next().unwrap_or_default();
        let quote = parts.next().ok_or_else(|| PairParseError::MissingDelimiter(s.to_string()))?;

        if base.is_empty() || quote.is_empty() {
            return Err(PairParseError::EmptyPart(s.to_string()));
        }
        if quote.contains('/') {
            return Err(PairParseError::InvalidFormat(s.to_string()));
        }

        Ok(Self::new(base, quote))
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Error parsing a pair string
#[derive(Debug, Clone, thiserror::Error)]
pub enum PairParseError {
    #[error("pair must contain '/': {0}")]
    MissingDelimiter(String),

    #[error("invalid pair format: {0}")]
    InvalidFormat(String),

    #[error("pair has empty base or quote: {0}")]
    EmptyPart(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parse() {
        let pair: Pair = "BTC/USD".parse().unwrap();
        assert_eq!(pair.base, "BTC");
        assert_eq!(pair.quote, "USD");
        assert_eq!(pair.to_string(), "BTC/USD");
    }

    #[test]
    fn test_pair_parse_uppercases() {
        let pair: Pair = "eth/usdt".parse().unwrap();
        assert_eq!(pair.to_string(), "ETH/USDT");
    }

    #[test]
    fn test_pair_parse_errors() {
        assert!("BTCUSD".parse::<Pair>().is_err());
        assert!("/USD".parse::<Pair>().is_err());
        assert!("BTC/".parse::<Pair>().is_err());
        assert!("BTC/USD/T".parse::<Pair>().is_err());
    }

    #[test]
    fn test_pair_serde() {
        let pair = Pair::new("SOL", "USD");
        let json = serde_json::to_string(&pair).unwrap();
        let parsed: Pair = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pair);
    }
}
