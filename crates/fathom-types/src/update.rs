//! Normalized diff update and book identity key

use crate::{Asset, Level, Pair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one book: exchange, pair, and asset class.
///
/// All engine state is scoped to this key; nothing is process-global.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookKey {
    /// Exchange name, lowercase (e.g. "kraken", "binance")
    pub exchange: String,
    /// Trading pair
    pub pair: Pair,
    /// Asset class
    pub asset: Asset,
}

impl BookKey {
    /// Create a new book key
    pub fn new(exchange: impl Into<String>, pair: Pair, asset: Asset) -> Self {
        Self {
            exchange: exchange.into().to_lowercase(),
            pair,
            asset,
        }
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.pair, self.asset)
    }
}

/// A normalized incremental book update, as handed over by an
/// exchange-specific websocket decoder.
///
/// `first_update_id..=final_update_id` is the inclusive range of
/// book-mutating events this single message represents. Deltas with
/// amount 0 delete the addressed level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Exchange this update came from
    pub exchange: String,
    /// Trading pair
    pub pair: Pair,
    /// Asset class
    pub asset: Asset,
    /// First event id covered by this message
    pub first_update_id: i64,
    /// Last event id covered by this message
    pub final_update_id: i64,
    /// Bid-side deltas, in arrival order
    pub bids: Vec<Level>,
    /// Ask-side deltas, in arrival order
    pub asks: Vec<Level>,
    /// Exchange event time
    pub timestamp: DateTime<Utc>,
    /// Book checksum attached by the feed, when the exchange provides one
    #[serde(default)]
    pub checksum: Option<u32>,
}

impl Update {
    /// Key of the book this update addresses
    pub fn key(&self) -> BookKey {
        BookKey::new(self.exchange.clone(), self.pair.clone(), self.asset)
    }

    /// True when this message carries no deltas at all
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
