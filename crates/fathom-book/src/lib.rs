//! Order-book depth engine core
//!
//! This crate owns the book itself: ordered per-side level stores, the
//! locked [`Depth`] container with copy-out snapshots, CRC32 checksum
//! validation, and pure market-impact simulation over snapshots.
//!
//! It deliberately contains no networking and no async code; feeding the
//! book from a live stream is `fathom-sync`'s job.
//!
//! # Example
//!
//! ```
//! use fathom_book::{BookSnapshot, Depth, DepthOptions};
//! use fathom_types::{Asset, BookKey, Level, Pair};
//!
//! let key = BookKey::new("kraken", Pair::new("BTC", "USD"), Asset::Spot);
//! let depth = Depth::new(key.clone(), DepthOptions::default());
//! let snap = BookSnapshot::new(&key)
//!     .with_levels(vec![Level::new(6999.0, 1.0)], vec![Level::new(7000.0, 1.0)])
//!     .with_last_update_id(1);
//! depth.load_snapshot(&snap);
//! assert_eq!(depth.spread(), Some(1.0));
//! ```

pub mod checksum;
pub mod depth;
pub mod impact;
pub mod levels;
pub mod whale;

// Re-export main types
pub use checksum::{compute_checksum, validate_checksum, CHECKSUM_PRECISION, DEFAULT_CHECKSUM_LEVELS};
pub use depth::{BookSnapshot, Depth, DepthOptions};
pub use impact::{Movement, FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE};
pub use levels::{AskLevels, AskRank, BidLevels, BidRank, PriceRank, SideLevels};
pub use whale::{Fill, SimulatedOrder, SimulationStatus, WhaleBombResult};
