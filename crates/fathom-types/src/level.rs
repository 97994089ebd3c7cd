//! Price level value type

use serde::{Deserialize, Serialize};

/// A single price point on one side of the book.
///
/// `id` is the exchange-assigned identifier of the resting order backing
/// this level. An id of `0` means the feed does not track identifiers and
/// price is the natural key. An amount of `0` is the delete sentinel used
/// in diff updates; it is never a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Level {
    /// Price of this level
    pub price: f64,
    /// Amount resting at this price, in base units
    pub amount: f64,
    /// Exchange-assigned identifier, 0 when the feed is price-keyed
    #[serde(default)]
    pub id: i64,
}

impl Level {
    /// Create a price-keyed level (no identifier)
    pub fn new(price: f64, amount: f64) -> Self {
        Self {
            price,
            amount,
            id: 0,
        }
    }

    /// Create an id-keyed level
    pub fn with_id(price: f64, amount: f64, id: i64) -> Self {
        Self { price, amount, id }
    }

    /// Notional value of this level (price × amount)
    pub fn value(&self) -> f64 {
        self.price * self.amount
    }

    /// True when this delta removes the level rather than setting it
    pub fn is_delete(&self) -> bool {
        self.amount == 0.0
    }
}
