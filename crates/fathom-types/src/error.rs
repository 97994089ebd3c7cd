//! Error taxonomy for the depth engine

use crate::{BookKey, Pair, Side};
use thiserror::Error;

/// Errors surfaced by the side stores, depth container, synchronizer, and
/// simulators.
///
/// Nothing here is fatal to the owning process: every error is scoped to a
/// single book and recovers either by the caller correcting its request or
/// by re-snapshotting the affected pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepthError {
    // === Liquidity ===
    /// The requested side holds no levels at all
    #[error("no liquidity on the {side} side")]
    NoLiquidity { side: Side },

    /// The side was exhausted before the requested amount was filled
    #[error("not enough liquidity on the {side} side: {missing} of {requested} unfilled")]
    NotEnoughLiquidity {
        side: Side,
        requested: f64,
        missing: f64,
    },

    // === Caller input ===
    /// Amount must be strictly positive
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    /// Reference price must be strictly positive
    #[error("invalid reference price: {0}")]
    InvalidReferencePrice(f64),

    /// Nominal slippage percentage must be non-negative
    #[error("invalid nominal slippage percentage: {0}")]
    InvalidNominalSlippage(f64),

    /// Impact slippage percentage must be non-negative
    #[error("invalid impact slippage percentage: {0}")]
    InvalidImpactSlippage(f64),

    /// Slippage percentage cannot exceed 100
    #[error("slippage percentage cannot exceed 100: {0}")]
    SlippageExceedsMaximum(f64),

    /// Whale-bomb price target must be strictly positive
    #[error("invalid price target: {0}")]
    PriceTargetInvalid(f64),

    /// The target price sits on the wrong side of the current touch
    #[error("cannot shift {side} touch from {touch} to {target}")]
    CannotShiftPrice {
        side: Side,
        touch: f64,
        target: f64,
    },

    // === Id-keyed store ===
    /// No level with the given id exists on that side
    #[error("id {id} not found on the {side} side")]
    IdNotFound { side: Side, id: i64 },

    /// Insert-only feed delivered an id that already rests on the book
    #[error("collision detected on the {side} side: id {id} already present at {price}")]
    CollisionDetected { side: Side, id: i64, price: f64 },

    // === Integrity ===
    /// Computed checksum disagrees with the exchange-supplied value
    #[error("checksum mismatch for {pair}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        pair: Pair,
        expected: u32,
        computed: u32,
    },

    /// Sequence continuity broke between applied state and an update
    #[error("sequence gap: expected id {expected}, update covers {first}..={last}")]
    SequenceGap { expected: i64, first: i64, last: i64 },

    // === Registry ===
    /// No book is registered under that key
    #[error("no book registered for {0}")]
    BookNotFound(BookKey),
}

impl DepthError {
    /// True when the error heals itself through a resync rather than
    /// requiring the caller to change its request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::SequenceGap { .. }
        )
    }

    /// True when the affected book must be re-snapshotted before its
    /// contents can be trusted again.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::SequenceGap { .. }
        )
    }
}

/// Result type alias for depth-engine operations
pub type DepthResult<T> = Result<T, DepthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_requires_resync() {
        let err = DepthError::ChecksumMismatch {
            pair: Pair::new("BTC", "USD"),
            expected: 123,
            computed: 456,
        };
        assert!(err.requires_resync());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_caller_errors_not_recoverable() {
        assert!(!DepthError::InvalidAmount(-1.0).is_recoverable());
        assert!(!DepthError::NoLiquidity { side: Side::Ask }.is_recoverable());
        assert!(!DepthError::IdNotFound {
            side: Side::Bid,
            id: 7
        }
        .requires_resync());
    }

    #[test]
    fn test_error_display() {
        let err = DepthError::SequenceGap {
            expected: 11,
            first: 20,
            last: 25,
        };
        assert_eq!(
            err.to_string(),
            "sequence gap: expected id 11, update covers 20..=25"
        );
    }
}
