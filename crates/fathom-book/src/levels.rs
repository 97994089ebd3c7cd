//! Ordered per-side level storage
//!
//! Levels live in a contiguous `Vec` kept sorted best-price-first: asks
//! ascending, bids descending. Relocation is always an explicit
//! remove-then-insert at a computed index, so no entry is ever referenced
//! while it moves.
//!
//! Price-keyed feeds address levels by exact price and keep prices unique;
//! id-keyed feeds address resting orders by exchange id, and several orders
//! may share a price. Which uniqueness holds is decided by the update
//! method used, never validated twice at once.

use fathom_types::{DepthError, DepthResult, Level, Side};
use std::marker::PhantomData;

/// Price ordering for one side of the book.
///
/// `leads(a, b)` is true when a level priced `a` ranks strictly closer to
/// the touch than one priced `b`.
pub trait PriceRank {
    /// Which side this ordering belongs to
    const SIDE: Side;

    /// Strict "ranks before" comparison
    fn leads(a: f64, b: f64) -> bool;
}

/// Ascending order: lowest ask first
#[derive(Debug, Clone, Copy)]
pub struct AskRank;

impl PriceRank for AskRank {
    const SIDE: Side = Side::Ask;

    fn leads(a: f64, b: f64) -> bool {
        a < b
    }
}

/// Descending order: highest bid first
#[derive(Debug, Clone, Copy)]
pub struct BidRank;

impl PriceRank for BidRank {
    const SIDE: Side = Side::Bid;

    fn leads(a: f64, b: f64) -> bool {
        a > b
    }
}

/// One side of the book: a sorted sequence of levels, best first.
#[derive(Debug)]
pub struct SideLevels<R> {
    levels: Vec<Level>,
    _rank: PhantomData<R>,
}

/// Ask side, strictly ascending by price under price-keyed updates
pub type AskLevels = SideLevels<AskRank>;

/// Bid side, strictly descending by price under price-keyed updates
pub type BidLevels = SideLevels<BidRank>;

impl<R> Clone for SideLevels<R> {
    fn clone(&self) -> Self {
        Self {
            levels: self.levels.clone(),
            _rank: PhantomData,
        }
    }
}

impl<R> Default for SideLevels<R> {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            _rank: PhantomData,
        }
    }
}

impl<R: PriceRank> SideLevels<R> {
    /// Create an empty side
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of levels on this side
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when the side holds no liquidity
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Borrow the levels, best first
    pub fn as_slice(&self) -> &[Level] {
        &self.levels
    }

    /// Best level, if any
    pub fn head(&self) -> Option<&Level> {
        self.levels.first()
    }

    /// Replace the entire side with a new sequence.
    ///
    /// Input is sorted here, so callers may pass levels in any order; equal
    /// prices keep their input order. An empty input empties the side,
    /// which is how zero liquidity is signalled after invalidation.
    pub fn load(&mut self, mut levels: Vec<Level>) {
        levels.sort_by(|a, b| {
            if R::leads(a.price, b.price) {
                std::cmp::Ordering::Less
            } else if R::leads(b.price, a.price) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        self.levels = levels;
    }

    /// First index whose level does not rank strictly before `price`.
    ///
    /// For price-keyed data this is where a level with that exact price
    /// lives, if present.
    fn lower_bound(&self, price: f64) -> usize {
        self.levels.partition_point(|l| R::leads(l.price, price))
    }

    /// First index whose level ranks strictly after `price`; new id-keyed
    /// entries land here, behind anything already resting at that price.
    fn upper_bound(&self, price: f64) -> usize {
        self.levels.partition_point(|l| !R::leads(price, l.price))
    }

    /// Apply price-keyed deltas: replace the amount at an existing price,
    /// delete it when the delta amount is zero, insert new prices in
    /// sorted position. A zero-amount delta for an unknown price is a
    /// no-op. Afterwards the side is truncated to `max_depth` levels when
    /// `max_depth` is positive, dropping the levels furthest from the
    /// touch.
    pub fn update_insert_by_price(&mut self, deltas: &[Level], max_depth: usize) {
        for delta in deltas {
            let idx = self.lower_bound(delta.price);
            let exists = idx < self.levels.len() && self.levels[idx].price == delta.price;

            if exists {
                if delta.is_delete() {
                    self.levels.remove(idx);
                } else {
                    self.levels[idx].amount = delta.amount;
                }
            } else if !delta.is_delete() {
                self.levels.insert(idx, *delta);
            }
        }
        self.truncate(max_depth);
    }

    /// Overwrite amount and price of id-matched levels in place, never
    /// resorting. Models feeds where ordering is event-driven and a slot's
    /// position is fixed while its contents change.
    pub fn update_by_id(&mut self, deltas: &[Level], ignore_missing: bool) -> DepthResult<()> {
        for delta in deltas {
            match self.levels.iter_mut().find(|l| l.id == delta.id) {
                Some(level) => {
                    level.price = delta.price;
                    level.amount = delta.amount;
                }
                None if ignore_missing => {}
                None => {
                    return Err(DepthError::IdNotFound {
                        side: R::SIDE,
                        id: delta.id,
                    })
                }
            }
        }
        Ok(())
    }

    /// Remove id-matched levels.
    pub fn delete_by_id(&mut self, deltas: &[Level], ignore_missing: bool) -> DepthResult<()> {
        for delta in deltas {
            match self.levels.iter().position(|l| l.id == delta.id) {
                Some(idx) => {
                    self.levels.remove(idx);
                }
                None if ignore_missing => {}
                None => {
                    return Err(DepthError::IdNotFound {
                        side: R::SIDE,
                        id: delta.id,
                    })
                }
            }
        }
        Ok(())
    }

    /// Upsert id-keyed levels at the position implied by their new price.
    ///
    /// A known id is removed from its current slot and re-inserted where
    /// its new price ranks, covering all three relocations: staying put,
    /// moving toward the touch, and moving away from it. An unknown id is
    /// inserted as a new level. A new entry at an already-occupied price
    /// lands behind the levels resting there, so arrival order within a
    /// batch is significant and preserved.
    pub fn update_insert_by_id(&mut self, deltas: &[Level]) {
        for delta in deltas {
            if let Some(idx) = self.levels.iter().position(|l| l.id == delta.id) {
                self.levels.remove(idx);
            }
            let idx = self.upper_bound(delta.price);
            self.levels.insert(idx, *delta);
        }
    }

    /// Insert-only variant for feeds that guarantee every delta is a
    /// brand-new resting order. An id already on the book is a feed
    /// protocol violation.
    pub fn insert_updates(&mut self, deltas: &[Level]) -> DepthResult<()> {
        for delta in deltas {
            if self.levels.iter().any(|l| l.id == delta.id) {
                return Err(DepthError::CollisionDetected {
                    side: R::SIDE,
                    id: delta.id,
                    price: delta.price,
                });
            }
            let idx = self.upper_bound(delta.price);
            self.levels.insert(idx, *delta);
        }
        Ok(())
    }

    /// Aggregate liquidity: (sum of amounts, sum of price×amount).
    pub fn amount(&self) -> (f64, f64) {
        self.levels
            .iter()
            .fold((0.0, 0.0), |(liquidity, value), l| {
                (liquidity + l.amount, value + l.value())
            })
    }

    /// Best `count` levels, cloned in order; 0 returns the whole side.
    pub fn retrieve(&self, count: usize) -> Vec<Level> {
        if count == 0 || count >= self.levels.len() {
            self.levels.clone()
        } else {
            self.levels[..count].to_vec()
        }
    }

    /// Drop levels furthest from the touch beyond `max_depth`; 0 means
    /// unlimited.
    pub fn truncate(&mut self, max_depth: usize) {
        if max_depth > 0 && self.levels.len() > max_depth {
            self.levels.truncate(max_depth);
        }
    }
}
