//! Depth container and point-in-time snapshots
//!
//! [`Depth`] owns both side stores behind a single `parking_lot::RwLock`.
//! Exactly one producer path mutates it (the synchronizer applying diffs);
//! readers take the shared lock and copy out what they need, so nobody
//! ever holds a reference into the live book across a suspension point.

use crate::levels::{AskLevels, BidLevels};
use chrono::{DateTime, Utc};
use fathom_types::{Asset, BookKey, DepthError, DepthResult, FeedStyle, Level, Pair, Side, Update};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Per-book configuration, fixed at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepthOptions {
    /// Maximum levels kept per side; 0 keeps everything
    pub max_depth: usize,
    /// How the feed addresses incremental updates
    pub feed_style: FeedStyle,
    /// Levels per side fed into the checksum; 0 disables validation
    pub checksum_levels: usize,
}

impl DepthOptions {
    /// Options with everything at its default (unlimited depth, price-keyed
    /// feed, checksum disabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of levels kept per side
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Select the feed's update style
    pub fn with_feed_style(mut self, feed_style: FeedStyle) -> Self {
        self.feed_style = feed_style;
        self
    }

    /// Enable checksum validation over the top `levels` of each side
    pub fn with_checksum_levels(mut self, levels: usize) -> Self {
        self.checksum_levels = levels;
        self
    }
}

/// A point-in-time capture of one book.
///
/// The same shape serves both directions: decoders hand one in when a full
/// snapshot arrives, and queries hand one out. Once constructed it is never
/// mutated; all simulation entry points are pure reads over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Exchange this book belongs to
    pub exchange: String,
    /// Trading pair
    pub pair: Pair,
    /// Asset class
    pub asset: Asset,
    /// Bid levels, highest first
    pub bids: Vec<Level>,
    /// Ask levels, lowest first
    pub asks: Vec<Level>,
    /// Last event id folded into this state
    pub last_update_id: i64,
    /// Exchange event time of the newest applied event
    pub last_updated: DateTime<Utc>,
    /// Local wall-clock time this state was written
    pub last_pushed: DateTime<Utc>,
    /// True when this capture came from a full REST fetch rather than a
    /// websocket snapshot frame
    pub is_rest_snapshot: bool,
}

impl BookSnapshot {
    /// Create a snapshot for a book identity; sides start empty.
    pub fn new(key: &BookKey) -> Self {
        let now = Utc::now();
        Self {
            exchange: key.exchange.clone(),
            pair: key.pair.clone(),
            asset: key.asset,
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_id: 0,
            last_updated: now,
            last_pushed: now,
            is_rest_snapshot: false,
        }
    }

    /// Set both sides (sorted best-first by the caller or via `Depth::load_snapshot`)
    pub fn with_levels(mut self, bids: Vec<Level>, asks: Vec<Level>) -> Self {
        self.bids = bids;
        self.asks = asks;
        self
    }

    /// Set the synchronization cursor
    pub fn with_last_update_id(mut self, id: i64) -> Self {
        self.last_update_id = id;
        self
    }

    /// Mark this capture as a full REST fetch
    pub fn with_rest_snapshot(mut self, is_rest: bool) -> Self {
        self.is_rest_snapshot = is_rest;
        self
    }

    /// Key of the book this snapshot was taken from
    pub fn key(&self) -> BookKey {
        BookKey::new(self.exchange.clone(), self.pair.clone(), self.asset)
    }

    /// Levels of one side, best first
    pub fn side_levels(&self, side: Side) -> &[Level] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Best bid, if any
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    /// Best ask, if any
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    /// Ask minus bid at the touch
    pub fn spread(&self) -> Option<f64> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint of the touch
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some((ask.price + bid.price) / 2.0),
            _ => None,
        }
    }
}

/// Mutable book state guarded by the depth lock.
#[derive(Debug, Default)]
struct BookState {
    bids: BidLevels,
    asks: AskLevels,
    last_update_id: i64,
    last_updated: Option<DateTime<Utc>>,
    last_pushed: Option<DateTime<Utc>>,
    is_rest_snapshot: bool,
}

/// The owning container for one book.
///
/// Identity and options live outside the lock; everything the feed mutates
/// lives inside it. The lock is held only for the O(depth) duration of a
/// single load or diff application.
#[derive(Debug)]
pub struct Depth {
    key: BookKey,
    options: DepthOptions,
    state: RwLock<BookState>,
}

impl Depth {
    /// Create an empty book for a key
    pub fn new(key: BookKey, options: DepthOptions) -> Self {
        Self {
            key,
            options,
            state: RwLock::new(BookState::default()),
        }
    }

    /// Identity of this book
    pub fn key(&self) -> &BookKey {
        &self.key
    }

    /// Configuration fixed at setup time
    pub fn options(&self) -> DepthOptions {
        self.options
    }

    /// Atomically replace both sides and the synchronization cursor from a
    /// full snapshot. Used for the very first snapshot and for any forced
    /// resync.
    pub fn load_snapshot(&self, snap: &BookSnapshot) {
        let mut state = self.state.write();
        state.bids.load(snap.bids.clone());
        state.asks.load(snap.asks.clone());
        state.bids.truncate(self.options.max_depth);
        state.asks.truncate(self.options.max_depth);
        state.last_update_id = snap.last_update_id;
        state.last_updated = Some(snap.last_updated);
        state.last_pushed = Some(Utc::now());
        state.is_rest_snapshot = snap.is_rest_snapshot;
        tracing::debug!(
            key = %self.key,
            last_update_id = snap.last_update_id,
            bids = snap.bids.len(),
            asks = snap.asks.len(),
            rest = snap.is_rest_snapshot,
            "snapshot loaded"
        );
    }

    /// Apply one incremental diff via the update strategy this book was
    /// configured with, then advance the cursor to the diff's final id.
    ///
    /// Sequence continuity is the synchronizer's responsibility; this
    /// method assumes the diff has already been validated against the
    /// cursor and performs no gap detection of its own.
    pub fn consume_update(&self, update: &Update) -> DepthResult<()> {
        let mut state = self.state.write();
        match self.options.feed_style {
            FeedStyle::ByPrice => {
                state
                    .bids
                    .update_insert_by_price(&update.bids, self.options.max_depth);
                state
                    .asks
                    .update_insert_by_price(&update.asks, self.options.max_depth);
            }
            FeedStyle::ById => {
                state.bids.update_insert_by_id(&update.bids);
                state.asks.update_insert_by_id(&update.asks);
                state.bids.truncate(self.options.max_depth);
                state.asks.truncate(self.options.max_depth);
            }
        }
        Self::advance_cursor(&mut state, update);
        Ok(())
    }

    /// Amend id-keyed levels in place: price and amount change, the slot
    /// does not. For feeds whose ordering is event-driven rather than
    /// price-driven.
    ///
    /// On an unmatched id the book is left mid-application and the error
    /// returned; callers treat that as a desynchronization and resync.
    pub fn update_by_id(&self, update: &Update, ignore_missing: bool) -> DepthResult<()> {
        let mut state = self.state.write();
        state.bids.update_by_id(&update.bids, ignore_missing)?;
        state.asks.update_by_id(&update.asks, ignore_missing)?;
        Self::advance_cursor(&mut state, update);
        Ok(())
    }

    /// Remove id-keyed levels.
    pub fn delete_by_id(&self, update: &Update, ignore_missing: bool) -> DepthResult<()> {
        let mut state = self.state.write();
        state.bids.delete_by_id(&update.bids, ignore_missing)?;
        state.asks.delete_by_id(&update.asks, ignore_missing)?;
        Self::advance_cursor(&mut state, update);
        Ok(())
    }

    /// Insert brand-new resting orders, for feeds that guarantee they only
    /// ever add. An id collision is a feed protocol violation.
    pub fn insert_levels(&self, update: &Update) -> DepthResult<()> {
        let mut state = self.state.write();
        state.bids.insert_updates(&update.bids)?;
        state.asks.insert_updates(&update.asks)?;
        state.bids.truncate(self.options.max_depth);
        state.asks.truncate(self.options.max_depth);
        Self::advance_cursor(&mut state, update);
        Ok(())
    }

    fn advance_cursor(state: &mut BookState, update: &Update) {
        state.last_update_id = update.final_update_id;
        state.last_updated = Some(update.timestamp);
        state.last_pushed = Some(Utc::now());
        state.is_rest_snapshot = false;
    }

    /// Empty both sides and zero the cursor. Queries against an
    /// invalidated book see zero liquidity until the next snapshot lands.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.bids.load(Vec::new());
        state.asks.load(Vec::new());
        state.last_update_id = 0;
        state.last_pushed = Some(Utc::now());
        state.is_rest_snapshot = false;
        tracing::debug!(key = %self.key, "book invalidated");
    }

    /// Best price of one side.
    pub fn get_head_price(&self, side: Side) -> DepthResult<f64> {
        let state = self.state.read();
        let head = match side {
            Side::Bid => state.bids.head(),
            Side::Ask => state.asks.head(),
        };
        head.map(|l| l.price)
            .ok_or(DepthError::NoLiquidity { side })
    }

    /// Aggregate (liquidity, notional value) of one side.
    pub fn liquidity(&self, side: Side) -> (f64, f64) {
        let state = self.state.read();
        match side {
            Side::Bid => state.bids.amount(),
            Side::Ask => state.asks.amount(),
        }
    }

    /// Number of levels on one side.
    pub fn len(&self, side: Side) -> usize {
        let state = self.state.read();
        match side {
            Side::Bid => state.bids.len(),
            Side::Ask => state.asks.len(),
        }
    }

    /// True when both sides are empty.
    pub fn is_empty(&self) -> bool {
        let state = self.state.read();
        state.bids.is_empty() && state.asks.is_empty()
    }

    /// Last event id folded into the book.
    pub fn last_update_id(&self) -> i64 {
        self.state.read().last_update_id
    }

    /// Ask minus bid at the touch.
    pub fn spread(&self) -> Option<f64> {
        let state = self.state.read();
        match (state.asks.head(), state.bids.head()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint of the touch.
    pub fn mid_price(&self) -> Option<f64> {
        let state = self.state.read();
        match (state.asks.head(), state.bids.head()) {
            (Some(ask), Some(bid)) => Some((ask.price + bid.price) / 2.0),
            _ => None,
        }
    }

    /// Copy out the best `count` levels of each side (0 = everything) as a
    /// point-in-time snapshot. The clone happens entirely under the read
    /// lock, so the result can never show a torn intermediate state.
    pub fn retrieve(&self, count: usize) -> BookSnapshot {
        let state = self.state.read();
        let now = Utc::now();
        BookSnapshot {
            exchange: self.key.exchange.clone(),
            pair: self.key.pair.clone(),
            asset: self.key.asset,
            bids: state.bids.retrieve(count),
            asks: state.asks.retrieve(count),
            last_update_id: state.last_update_id,
            last_updated: state.last_updated.unwrap_or(now),
            last_pushed: state.last_pushed.unwrap_or(now),
            is_rest_snapshot: state.is_rest_snapshot,
        }
    }
}
