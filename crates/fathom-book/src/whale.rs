//! Whale-bomb and market-order simulation
//!
//! Answers two questions over a snapshot: "how much does it take to move
//! the touch to price X" and "what exactly fills if I send a market order
//! of size Y". Both are pure reads; both report liquidity exhaustion as a
//! status on the result rather than an error, since an oversized request
//! against a real book is an answerable question, not a caller mistake.

use crate::depth::BookSnapshot;
use fathom_types::{DepthError, DepthResult, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome quality of a simulation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    /// The request was satisfied within available depth
    #[default]
    Complete,
    /// The entire side was consumed before the request was satisfied
    FullLiquidityConsumed,
}

impl SimulationStatus {
    /// True when the walk drained the whole side
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::FullLiquidityConsumed)
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::FullLiquidityConsumed => {
                write!(f, "full side liquidity consumed before request was satisfied")
            }
        }
    }
}

/// One per-level fill produced by a simulation walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Price of the consumed level
    pub price: f64,
    /// Base units taken from it
    pub amount: f64,
}

/// Liquidity required to move the touch to a target price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleBombResult {
    /// Quote to spend (buying) or base to sell (selling)
    pub amount: f64,
    /// Lowest price involved in the move
    pub minimum_price: f64,
    /// Highest price involved in the move
    pub maximum_price: f64,
    /// Touch movement in percent, signed: positive when buying pushes the
    /// price up, negative when selling pushes it down
    pub percentage_gain_or_loss: f64,
    /// Whether the walk stayed within available depth
    pub status: SimulationStatus,
}

/// Fill-by-fill breakdown of a simulated market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedOrder {
    /// Levels consumed, in walk order
    pub fills: Vec<Fill>,
    /// What the order gave up: quote when buying, base when selling
    pub sold: f64,
    /// What the order received: base when buying, quote when selling
    pub purchased: f64,
    /// Volume-weighted average fill price
    pub average_price: f64,
    /// Lowest fill price
    pub minimum_price: f64,
    /// Highest fill price
    pub maximum_price: f64,
    /// Whether the request fit within available depth
    pub status: SimulationStatus,
}

impl BookSnapshot {
    /// Liquidity required to move the touch to `target_price`.
    ///
    /// Buying walks the asks: every level resting strictly below the
    /// target is consumed and the touch lands on the first level at or
    /// past it, so a target inside a gap behaves as if it rested on the
    /// next real level. Selling mirrors this down the bids. A target
    /// beyond available depth returns a [`SimulationStatus`] warning
    /// rather than failing; a target already at the touch moves nothing.
    pub fn whale_bomb(&self, target_price: f64, buy: bool) -> DepthResult<WhaleBombResult> {
        if !(target_price > 0.0) {
            return Err(DepthError::PriceTargetInvalid(target_price));
        }

        let (levels, side) = if buy {
            (&self.asks, Side::Ask)
        } else {
            (&self.bids, Side::Bid)
        };
        let touch = levels
            .first()
            .ok_or(DepthError::NoLiquidity { side })?
            .price;

        let wrong_direction = if buy {
            target_price < touch
        } else {
            target_price > touch
        };
        if wrong_direction {
            return Err(DepthError::CannotShiftPrice {
                side,
                touch,
                target: target_price,
            });
        }

        let mut amount = 0.0;
        let mut new_touch = None;
        for level in levels {
            let past_target = if buy {
                level.price >= target_price
            } else {
                level.price <= target_price
            };
            if past_target {
                new_touch = Some(level.price);
                break;
            }
            // Buying spends quote; selling spends base
            amount += if buy { level.value() } else { level.amount };
        }

        let (end_price, status) = match new_touch {
            Some(price) => (price, SimulationStatus::Complete),
            None => (
                levels.last().map(|l| l.price).unwrap_or(touch),
                SimulationStatus::FullLiquidityConsumed,
            ),
        };

        let (minimum_price, maximum_price) = if buy {
            (touch, end_price)
        } else {
            (end_price, touch)
        };

        Ok(WhaleBombResult {
            amount,
            minimum_price,
            maximum_price,
            percentage_gain_or_loss: (end_price - touch) / touch * 100.0,
            status,
        })
    }

    /// Simulate a market order against the book.
    ///
    /// Buying spends `amount` of quote against the asks; selling sells
    /// `amount` of base into the bids. Returns the ordered per-level
    /// fills actually consumed, with the same exhaustion warning behavior
    /// as [`BookSnapshot::whale_bomb`].
    pub fn simulate_order(&self, amount: f64, buy: bool) -> DepthResult<SimulatedOrder> {
        if !(amount > 0.0) {
            return Err(DepthError::InvalidAmount(amount));
        }

        let (levels, side) = if buy {
            (&self.asks, Side::Ask)
        } else {
            (&self.bids, Side::Bid)
        };
        if levels.is_empty() {
            return Err(DepthError::NoLiquidity { side });
        }

        let mut fills = Vec::new();
        let mut base = 0.0;
        let mut quote = 0.0;
        let mut remaining = amount;

        for level in levels {
            if remaining <= 0.0 {
                break;
            }
            // How much base this level yields against what is left
            let take = if buy {
                (remaining / level.price).min(level.amount)
            } else {
                remaining.min(level.amount)
            };
            if take <= 0.0 {
                break;
            }
            fills.push(Fill {
                price: level.price,
                amount: take,
            });
            base += take;
            quote += take * level.price;
            remaining -= if buy { take * level.price } else { take };
        }

        let status = if remaining > 0.0 {
            SimulationStatus::FullLiquidityConsumed
        } else {
            SimulationStatus::Complete
        };

        let average_price = if base > 0.0 { quote / base } else { 0.0 };
        let minimum_price = fills.first().map(|f| f.price).unwrap_or(0.0);
        let maximum_price = fills.last().map(|f| f.price).unwrap_or(0.0);
        let (minimum_price, maximum_price) = if buy {
            (minimum_price, maximum_price)
        } else {
            (maximum_price, minimum_price)
        };

        let (sold, purchased) = if buy {
            (quote, base)
        } else {
            (base, quote)
        };

        Ok(SimulatedOrder {
            fills,
            sold,
            purchased,
            average_price,
            minimum_price,
            maximum_price,
            status,
        })
    }
}
