//! CRC32 book-integrity checksum
//!
//! Detects silent desynchronization by hashing the top N levels of each
//! side and comparing against the exchange-supplied value.
//!
//! # Algorithm
//!
//! 1. Take the best `depth_n` asks (low→high), then the best `depth_n`
//!    bids (high→low)
//! 2. For each level: render price then amount with exactly
//!    [`CHECKSUM_PRECISION`] decimal places, remove the decimal point,
//!    strip leading zeros
//! 3. Concatenate everything and apply standard CRC32 (ISO 3309)

use crate::depth::BookSnapshot;
use crc32fast::Hasher;
use fathom_types::{DepthError, DepthResult};

/// Decimal places rendered into the checksum payload
pub const CHECKSUM_PRECISION: usize = 8;

/// Levels per side hashed when the caller does not configure a depth
pub const DEFAULT_CHECKSUM_LEVELS: usize = 10;

/// Compute the checksum over the top `depth_n` levels of each side.
///
/// `depth_n` of 0 falls back to [`DEFAULT_CHECKSUM_LEVELS`]; sides shorter
/// than `depth_n` contribute what they have.
pub fn compute_checksum(snap: &BookSnapshot, depth_n: usize) -> u32 {
    let depth_n = if depth_n == 0 {
        DEFAULT_CHECKSUM_LEVELS
    } else {
        depth_n
    };

    let mut hasher = Hasher::new();
    for level in snap.asks.iter().take(depth_n) {
        hasher.update(format_checksum_value(level.price).as_bytes());
        hasher.update(format_checksum_value(level.amount).as_bytes());
    }
    for level in snap.bids.iter().take(depth_n) {
        hasher.update(format_checksum_value(level.price).as_bytes());
        hasher.update(format_checksum_value(level.amount).as_bytes());
    }
    hasher.finalize()
}

/// Validate a snapshot against the exchange-supplied checksum.
///
/// A mismatch means the local book silently diverged from the exchange;
/// the caller must treat the book as desynchronized and request a resync.
pub fn validate_checksum(snap: &BookSnapshot, depth_n: usize, expected: u32) -> DepthResult<()> {
    let computed = compute_checksum(snap, depth_n);
    if computed != expected {
        return Err(DepthError::ChecksumMismatch {
            pair: snap.pair.clone(),
            expected,
            computed,
        });
    }
    Ok(())
}

/// Render one value for the checksum payload: fixed precision, decimal
/// point removed, leading zeros stripped ("0" when nothing remains).
fn format_checksum_value(value: f64) -> String {
    let formatted = format!("{:.prec$}", value, prec = CHECKSUM_PRECISION);
    let without_point = formatted.replace('.', "");
    let trimmed = without_point.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_types::{Asset, BookKey, Level, Pair};

    fn ten_level_snapshot() -> BookSnapshot {
        let key = BookKey::new("kraken", Pair::new("BTC", "USD"), Asset::Spot);
        BookSnapshot::new(&key).with_levels(
            (0..10)
                .map(|i| Level::new(6999.0 - i as f64, 2.0 + 0.5 * i as f64))
                .collect(),
            (0..10)
                .map(|i| Level::new(7000.0 + i as f64, 1.0 + 0.25 * i as f64))
                .collect(),
        )
    }

    #[test]
    fn test_format_checksum_value() {
        assert_eq!(format_checksum_value(7000.0), "700000000000");
        assert_eq!(format_checksum_value(1.25), "125000000");
        assert_eq!(format_checksum_value(0.00460208), "460208");
        assert_eq!(format_checksum_value(0.001), "100000");
        assert_eq!(format_checksum_value(0.0), "0");
    }

    #[test]
    fn test_known_checksum_constant() {
        let snap = ten_level_snapshot();
        assert_eq!(compute_checksum(&snap, 10), 3836270473);
        // depth 0 falls back to the default ten levels
        assert_eq!(compute_checksum(&snap, 0), 3836270473);
    }

    #[test]
    fn test_perturbation_changes_checksum() {
        let reference = compute_checksum(&ten_level_snapshot(), 10);

        for i in 0..10 {
            let mut snap = ten_level_snapshot();
            snap.asks[i].amount += 0.25;
            assert_ne!(compute_checksum(&snap, 10), reference, "ask level {i}");

            let mut snap = ten_level_snapshot();
            snap.bids[i].amount += 0.25;
            assert_ne!(compute_checksum(&snap, 10), reference, "bid level {i}");
        }
    }

    #[test]
    fn test_checksum_ignores_levels_beyond_depth() {
        let mut deep = ten_level_snapshot();
        deep.asks.push(Level::new(8000.0, 1.0));
        deep.bids.push(Level::new(6000.0, 1.0));
        assert_eq!(compute_checksum(&deep, 10), 3836270473);
    }

    #[test]
    fn test_validate_checksum() {
        let snap = ten_level_snapshot();
        assert!(validate_checksum(&snap, 10, 3836270473).is_ok());

        let err = validate_checksum(&snap, 10, 3836270473 + 1).unwrap_err();
        assert!(err.requires_resync());
        match err {
            DepthError::ChecksumMismatch {
                expected, computed, ..
            } => {
                assert_eq!(expected, 3836270474);
                assert_eq!(computed, 3836270473);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
