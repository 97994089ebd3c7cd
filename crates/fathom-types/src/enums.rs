//! Small closed enumerations shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy interest (descending by price)
    Bid,
    /// Sell interest (ascending by price)
    Ask,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Asset class a book belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// Spot markets
    #[default]
    Spot,
    /// Margin trading
    Margin,
    /// Dated futures
    Futures,
    /// Perpetual swaps
    PerpetualSwap,
    /// Options
    Options,
}

impl Asset {
    /// Stable lowercase name, used in keys and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Margin => "margin",
            Self::Futures => "futures",
            Self::PerpetualSwap => "perpetual_swap",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an exchange feed keys its incremental updates.
///
/// Selected once per book at setup time; dispatches to one of two fixed
/// update strategies in the side stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStyle {
    /// Deltas address levels by price; amount 0 deletes
    #[default]
    ByPrice,
    /// Deltas address resting orders by exchange-assigned id
    ById,
}
