//! Shared value types for the fathom depth engine
//!
//! Everything in this crate is a plain value: price levels, pair/asset
//! identity, normalized diff updates, and the error taxonomy. No locking
//! and no I/O; those live in `fathom-book` and `fathom-sync`.

pub mod enums;
pub mod error;
pub mod level;
pub mod pair;
pub mod update;

// Re-export main types
pub use enums::{Asset, FeedStyle, Side};
pub use error::{DepthError, DepthResult};
pub use level::Level;
pub use pair::{Pair, PairParseError};
pub use update::{BookKey, Update};
