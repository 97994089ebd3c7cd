//! Diff-stream synchronization for the fathom depth engine
//!
//! Reconciles an asynchronous stream of partial diffs (which may arrive
//! out of order, overlap, or gap) against REST-fetched full snapshots,
//! per (exchange, pair, asset) key.
//!
//! [`Synchronizer`] is the per-key state machine: synchronous, no
//! suspension points, fully unit-testable. [`BookService`] wires one
//! synchronizer and one [`fathom_book::Depth`] per key, exposes the query
//! API, and pumps a bounded channel fed by the (out-of-scope) transport
//! decoders.

pub mod manager;
pub mod service;

// Re-export main types
pub use manager::{SnapshotOutcome, SyncAction, Synchronizer, MAX_BUFFERED_UPDATES};
pub use service::{BookService, FeedEvent, ProcessOutcome};
