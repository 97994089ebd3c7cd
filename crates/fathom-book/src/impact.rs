//! Market-impact simulation
//!
//! Pure reads over a [`BookSnapshot`]: walking one side of the book to
//! answer "what happens if I hit it with this much". Nothing here ever
//! mutates book state.
//!
//! Terminology: *nominal* slippage compares the volume-weighted average
//! fill price against a reference; *impact* slippage compares the last
//! touched level's price (the worst marginal fill) against it. Buying
//! lifts the asks, selling hits the bids. Percentages are in percent
//! units and positive when the aggressor pays the adverse cost.

use crate::depth::BookSnapshot;
use fathom_types::{DepthError, DepthResult, Level, Side};
use serde::{Deserialize, Serialize};

/// Sentinel stored in `impact_percentage` when a walk consumed the entire
/// side without filling the request, where no meaningful marginal ratio
/// exists.
pub const FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE: f64 = -100.0;

/// Result of one simulation walk. Constructed fresh per call and finalized
/// exactly once at the end of the walk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    /// What the aggressor gave up: base units on a hit, quote on a lift
    pub sold: f64,
    /// What the aggressor received: quote on a hit, base on a lift
    pub purchased: f64,
    /// Volume-weighted average price actually achieved
    pub average_order_cost: f64,
    /// Touch price when the walk began
    pub start_price: f64,
    /// Price of the last level touched
    pub end_price: f64,
    /// Deviation of the average fill price from the reference, in percent
    pub nominal_percentage: f64,
    /// Deviation of the last touched price from the reference, in percent
    pub impact_percentage: f64,
    /// Quote paid beyond filling everything at the starting touch price
    pub slippage_cost: f64,
    /// True when the walk ran out of book before reaching its target
    pub full_side_consumed: bool,
}

/// Raw outcome of walking levels toward a base or quote target.
struct Walk {
    base: f64,
    quote: f64,
    end_price: f64,
    full_side: bool,
}

fn walk_by_base(levels: &[Level], target: f64) -> Walk {
    let mut base = 0.0;
    let mut quote = 0.0;
    let mut end_price = 0.0;
    for level in levels {
        end_price = level.price;
        let remaining = target - base;
        if level.amount >= remaining {
            return Walk {
                base: target,
                quote: quote + remaining * level.price,
                end_price,
                full_side: false,
            };
        }
        base += level.amount;
        quote += level.value();
    }
    Walk {
        base,
        quote,
        end_price,
        full_side: true,
    }
}

fn walk_by_quote(levels: &[Level], target: f64) -> Walk {
    let mut base = 0.0;
    let mut quote = 0.0;
    let mut end_price = 0.0;
    for level in levels {
        end_price = level.price;
        let remaining = target - quote;
        let level_value = level.value();
        if level_value >= remaining {
            return Walk {
                base: base + remaining / level.price,
                quote: target,
                end_price,
                full_side: false,
            };
        }
        base += level.amount;
        quote += level_value;
    }
    Walk {
        base,
        quote,
        end_price,
        full_side: true,
    }
}

/// Fold a finished walk into a [`Movement`].
fn finalize_movement(
    buy: bool,
    walk: Walk,
    start_price: f64,
    reference_price: f64,
) -> Movement {
    if walk.base <= 0.0 {
        // Nothing could move: bound breached before the first unit
        return Movement {
            start_price,
            end_price: start_price,
            full_side_consumed: walk.full_side,
            ..Movement::default()
        };
    }

    let average = walk.quote / walk.base;
    let (sold, purchased, nominal, impact, slippage_cost) = if buy {
        (
            walk.quote,
            walk.base,
            (average - reference_price) / reference_price * 100.0,
            (walk.end_price - reference_price) / reference_price * 100.0,
            walk.quote - start_price * walk.base,
        )
    } else {
        (
            walk.base,
            walk.quote,
            (reference_price - average) / reference_price * 100.0,
            (reference_price - walk.end_price) / reference_price * 100.0,
            start_price * walk.base - walk.quote,
        )
    };

    Movement {
        sold,
        purchased,
        average_order_cost: average,
        start_price,
        end_price: walk.end_price,
        nominal_percentage: nominal,
        impact_percentage: impact,
        slippage_cost,
        full_side_consumed: walk.full_side,
    }
}

fn check_amount(amount: f64) -> DepthResult<()> {
    if !(amount > 0.0) {
        return Err(DepthError::InvalidAmount(amount));
    }
    Ok(())
}

fn check_reference_price(price: f64) -> DepthResult<()> {
    if !(price > 0.0) {
        return Err(DepthError::InvalidReferencePrice(price));
    }
    Ok(())
}

fn check_nominal_slippage(pct: f64) -> DepthResult<()> {
    if !(pct >= 0.0) {
        return Err(DepthError::InvalidNominalSlippage(pct));
    }
    if pct > 100.0 {
        return Err(DepthError::SlippageExceedsMaximum(pct));
    }
    Ok(())
}

fn check_impact_slippage(pct: f64) -> DepthResult<()> {
    if !(pct >= 0.0) {
        return Err(DepthError::InvalidImpactSlippage(pct));
    }
    if pct > 100.0 {
        return Err(DepthError::SlippageExceedsMaximum(pct));
    }
    Ok(())
}

impl BookSnapshot {
    fn walk_side(&self, buy: bool) -> (&[Level], Side) {
        if buy {
            (&self.asks, Side::Ask)
        } else {
            (&self.bids, Side::Bid)
        }
    }

    /// Volume-weighted average price of filling `base_amount` from the
    /// best level outward.
    pub fn average_price(&self, buy: bool, base_amount: f64) -> DepthResult<f64> {
        check_amount(base_amount)?;
        let (levels, side) = self.walk_side(buy);
        let walk = walk_by_base(levels, base_amount);
        if walk.full_side {
            return Err(DepthError::NotEnoughLiquidity {
                side,
                requested: base_amount,
                missing: base_amount - walk.base,
            });
        }
        Ok(walk.quote / walk.base)
    }

    /// Movement caused by trading `base_amount` base units against the
    /// book, with percentages measured against `reference_price`.
    ///
    /// When the side is exhausted before the target, the result carries
    /// `full_side_consumed` and [`FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE`]
    /// instead of a marginal ratio.
    pub fn movement_by_base(
        &self,
        buy: bool,
        base_amount: f64,
        reference_price: f64,
    ) -> DepthResult<Movement> {
        check_amount(base_amount)?;
        check_reference_price(reference_price)?;
        let (levels, side) = self.walk_side(buy);
        let start = levels
            .first()
            .ok_or(DepthError::NoLiquidity { side })?
            .price;

        let walk = walk_by_base(levels, base_amount);
        let full = walk.full_side;
        let mut movement = finalize_movement(buy, walk, start, reference_price);
        if full {
            movement.impact_percentage = FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE;
        }
        Ok(movement)
    }

    /// Movement caused by trading `quote_amount` of quote value against
    /// the book; the walk target is cumulative price×amount rather than
    /// base units.
    pub fn movement_by_quote(
        &self,
        buy: bool,
        quote_amount: f64,
        reference_price: f64,
    ) -> DepthResult<Movement> {
        check_amount(quote_amount)?;
        check_reference_price(reference_price)?;
        let (levels, side) = self.walk_side(buy);
        let start = levels
            .first()
            .ok_or(DepthError::NoLiquidity { side })?
            .price;

        let walk = walk_by_quote(levels, quote_amount);
        let full = walk.full_side;
        let mut movement = finalize_movement(buy, walk, start, reference_price);
        if full {
            movement.impact_percentage = FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE;
        }
        Ok(movement)
    }

    /// Maximum base amount the bid side can absorb while the
    /// volume-weighted average stays within `pct` percent below
    /// `reference_price`. The partial fill on the marginal level is solved
    /// exactly.
    pub fn hit_by_nominal_slippage(&self, pct: f64, reference_price: f64) -> DepthResult<Movement> {
        check_nominal_slippage(pct)?;
        check_reference_price(reference_price)?;
        if self.bids.is_empty() {
            return Err(DepthError::NoLiquidity { side: Side::Bid });
        }

        let target_average = reference_price * (1.0 - pct / 100.0);
        let start = self.bids[0].price;
        let mut base = 0.0;
        let mut quote = 0.0;
        let mut end_price = start;
        let mut full_side = true;

        for level in &self.bids {
            let next_base = base + level.amount;
            let next_quote = quote + level.value();
            if next_quote / next_base >= target_average {
                base = next_base;
                quote = next_quote;
                end_price = level.price;
                continue;
            }
            // Marginal level: take exactly enough to land on the bound
            let take = (quote - target_average * base) / (target_average - level.price);
            if take > 0.0 {
                base += take;
                quote += take * level.price;
                end_price = level.price;
            }
            full_side = false;
            break;
        }

        let walk = Walk {
            base,
            quote,
            end_price,
            full_side,
        };
        Ok(finalize_movement(false, walk, start, reference_price))
    }

    /// Maximum quote amount the ask side can absorb while the
    /// volume-weighted average stays within `pct` percent above
    /// `reference_price`.
    pub fn lift_by_nominal_slippage(&self, pct: f64, reference_price: f64) -> DepthResult<Movement> {
        check_nominal_slippage(pct)?;
        check_reference_price(reference_price)?;
        if self.asks.is_empty() {
            return Err(DepthError::NoLiquidity { side: Side::Ask });
        }

        let target_average = reference_price * (1.0 + pct / 100.0);
        let start = self.asks[0].price;
        let mut base = 0.0;
        let mut quote = 0.0;
        let mut end_price = start;
        let mut full_side = true;

        for level in &self.asks {
            let next_base = base + level.amount;
            let next_quote = quote + level.value();
            if next_quote / next_base <= target_average {
                base = next_base;
                quote = next_quote;
                end_price = level.price;
                continue;
            }
            let take = (target_average * base - quote) / (level.price - target_average);
            if take > 0.0 {
                base += take;
                quote += take * level.price;
                end_price = level.price;
            }
            full_side = false;
            break;
        }

        let walk = Walk {
            base,
            quote,
            end_price,
            full_side,
        };
        Ok(finalize_movement(true, walk, start, reference_price))
    }

    /// Maximum base amount the bid side can absorb while the marginal
    /// price stays within `pct` percent below `reference_price`. Whole
    /// levels only: touching any part of a level makes it the last
    /// touched.
    pub fn hit_by_impact_slippage(&self, pct: f64, reference_price: f64) -> DepthResult<Movement> {
        check_impact_slippage(pct)?;
        check_reference_price(reference_price)?;
        if self.bids.is_empty() {
            return Err(DepthError::NoLiquidity { side: Side::Bid });
        }

        let floor = reference_price * (1.0 - pct / 100.0);
        let start = self.bids[0].price;
        let mut base = 0.0;
        let mut quote = 0.0;
        let mut end_price = start;
        let mut full_side = true;

        for level in &self.bids {
            if level.price < floor {
                full_side = false;
                break;
            }
            base += level.amount;
            quote += level.value();
            end_price = level.price;
        }

        let walk = Walk {
            base,
            quote,
            end_price,
            full_side,
        };
        Ok(finalize_movement(false, walk, start, reference_price))
    }

    /// Maximum quote amount the ask side can absorb while the marginal
    /// price stays within `pct` percent above `reference_price`.
    pub fn lift_by_impact_slippage(&self, pct: f64, reference_price: f64) -> DepthResult<Movement> {
        check_impact_slippage(pct)?;
        check_reference_price(reference_price)?;
        if self.asks.is_empty() {
            return Err(DepthError::NoLiquidity { side: Side::Ask });
        }

        let cap = reference_price * (1.0 + pct / 100.0);
        let start = self.asks[0].price;
        let mut base = 0.0;
        let mut quote = 0.0;
        let mut end_price = start;
        let mut full_side = true;

        for level in &self.asks {
            if level.price > cap {
                full_side = false;
                break;
            }
            base += level.amount;
            quote += level.value();
            end_price = level.price;
        }

        let walk = Walk {
            base,
            quote,
            end_price,
            full_side,
        };
        Ok(finalize_movement(true, walk, start, reference_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_types::{Asset, BookKey, Pair};

    const TOLERANCE: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        if b == 0.0 {
            a.abs() < TOLERANCE
        } else {
            ((a - b) / b).abs() < TOLERANCE
        }
    }

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookSnapshot {
        let key = BookKey::new("kraken", Pair::new("BTC", "USD"), Asset::Spot);
        BookSnapshot::new(&key).with_levels(
            bids.iter().map(|&(p, a)| Level::new(p, a)).collect(),
            asks.iter().map(|&(p, a)| Level::new(p, a)).collect(),
        )
    }

    fn reference_book() -> BookSnapshot {
        book(
            &[(10000.0, 2.0), (9900.0, 7.0), (9800.0, 3.0)],
            &[(10100.0, 2.0), (10200.0, 7.0), (10300.0, 3.0)],
        )
    }

    #[test]
    fn test_average_price() {
        let snap = book(&[], &[(100.0, 1.0), (102.0, 2.0)]);
        // 1 @ 100 plus 1 @ 102
        assert_eq!(snap.average_price(true, 2.0).unwrap(), 101.0);
        // best level only
        assert_eq!(snap.average_price(true, 0.5).unwrap(), 100.0);
    }

    #[test]
    fn test_average_price_errors() {
        let snap = book(&[], &[(100.0, 1.0)]);
        assert_eq!(
            snap.average_price(true, 0.0).unwrap_err(),
            DepthError::InvalidAmount(0.0)
        );
        assert_eq!(
            snap.average_price(true, -2.0).unwrap_err(),
            DepthError::InvalidAmount(-2.0)
        );

        let err = snap.average_price(true, 5.0).unwrap_err();
        assert_eq!(
            err,
            DepthError::NotEnoughLiquidity {
                side: Side::Ask,
                requested: 5.0,
                missing: 4.0
            }
        );

        // Empty bid side
        assert!(matches!(
            snap.average_price(false, 1.0).unwrap_err(),
            DepthError::NotEnoughLiquidity { .. }
        ));
    }

    #[test]
    fn test_movement_by_base_buy() {
        let snap = book(&[], &[(100.0, 1.0), (102.0, 2.0)]);
        let movement = snap.movement_by_base(true, 2.0, 100.0).unwrap();

        assert_eq!(movement.sold, 202.0);
        assert_eq!(movement.purchased, 2.0);
        assert_eq!(movement.average_order_cost, 101.0);
        assert_eq!(movement.start_price, 100.0);
        assert_eq!(movement.end_price, 102.0);
        assert_eq!(movement.nominal_percentage, 1.0);
        assert_eq!(movement.impact_percentage, 2.0);
        assert_eq!(movement.slippage_cost, 2.0);
        assert!(!movement.full_side_consumed);
    }

    #[test]
    fn test_movement_by_base_sell() {
        let snap = reference_book();
        let movement = snap.movement_by_base(false, 9.0, 10000.0).unwrap();

        assert_eq!(movement.sold, 9.0);
        assert_eq!(movement.purchased, 89300.0);
        assert_eq!(movement.end_price, 9900.0);
        assert!(close(movement.nominal_percentage, 7.0 / 9.0));
        assert!(close(movement.impact_percentage, 1.0));
        assert_eq!(movement.slippage_cost, 700.0);
    }

    #[test]
    fn test_movement_by_quote() {
        let snap = reference_book();
        // Selling for 20000 quote consumes exactly the 10000 bid level
        let movement = snap.movement_by_quote(false, 20000.0, 10000.0).unwrap();
        assert_eq!(movement.sold, 2.0);
        assert_eq!(movement.purchased, 20000.0);
        assert_eq!(movement.end_price, 10000.0);
        assert_eq!(movement.nominal_percentage, 0.0);

        // Partial fill into the second ask level
        let movement = snap.movement_by_quote(true, 30400.0, 10100.0).unwrap();
        assert_eq!(movement.sold, 30400.0);
        assert_eq!(movement.purchased, 3.0);
        assert_eq!(movement.end_price, 10200.0);
    }

    #[test]
    fn test_movement_full_side_sentinel() {
        let snap = book(&[(100.0, 1.0)], &[]);
        let movement = snap.movement_by_base(false, 5.0, 100.0).unwrap();
        assert!(movement.full_side_consumed);
        assert_eq!(
            movement.impact_percentage,
            FULL_LIQUIDITY_EXHAUSTED_PERCENTAGE
        );
        assert_eq!(movement.sold, 1.0);
    }

    #[test]
    fn test_movement_errors() {
        let snap = book(&[], &[]);
        assert_eq!(
            snap.movement_by_base(true, 1.0, 100.0).unwrap_err(),
            DepthError::NoLiquidity { side: Side::Ask }
        );
        let snap = book(&[], &[(100.0, 1.0)]);
        assert_eq!(
            snap.movement_by_base(true, 1.0, 0.0).unwrap_err(),
            DepthError::InvalidReferencePrice(0.0)
        );
        assert_eq!(
            snap.movement_by_quote(true, -1.0, 100.0).unwrap_err(),
            DepthError::InvalidAmount(-1.0)
        );
    }

    #[test]
    fn test_hit_by_nominal_slippage() {
        let snap = reference_book();
        let movement = snap.hit_by_nominal_slippage(1.0, 10000.0).unwrap();

        assert_eq!(movement.sold, 11.0);
        assert_eq!(movement.purchased, 108900.0);
        assert_eq!(movement.average_order_cost, 9900.0);
        assert_eq!(movement.end_price, 9800.0);
        assert!(close(movement.nominal_percentage, 1.0));
        assert!(!movement.full_side_consumed);
    }

    #[test]
    fn test_hit_by_nominal_slippage_zero_tolerance() {
        let snap = reference_book();
        // Zero slippage against the touch price absorbs only the touch level
        let movement = snap.hit_by_nominal_slippage(0.0, 10000.0).unwrap();
        assert_eq!(movement.sold, 2.0);
        assert_eq!(movement.average_order_cost, 10000.0);
        assert_eq!(movement.nominal_percentage, 0.0);
    }

    #[test]
    fn test_hit_by_nominal_slippage_full_side() {
        let snap = reference_book();
        // A generous bound absorbs the whole side
        let movement = snap.hit_by_nominal_slippage(50.0, 10000.0).unwrap();
        assert_eq!(movement.sold, 12.0);
        assert_eq!(movement.purchased, 118700.0);
        assert!(movement.full_side_consumed);
    }

    #[test]
    fn test_lift_by_nominal_slippage() {
        let snap = book(&[], &[(100.0, 1.0), (110.0, 2.0)]);
        let movement = snap.lift_by_nominal_slippage(5.0, 100.0).unwrap();

        // One unit at 100, one at 110 lands the average exactly on 105
        assert_eq!(movement.sold, 210.0);
        assert_eq!(movement.purchased, 2.0);
        assert_eq!(movement.average_order_cost, 105.0);
        assert_eq!(movement.end_price, 110.0);
        assert!(close(movement.nominal_percentage, 5.0));
        assert_eq!(movement.slippage_cost, 10.0);
    }

    #[test]
    fn test_hit_by_impact_slippage() {
        let snap = reference_book();
        let movement = snap.hit_by_impact_slippage(1.0, 10000.0).unwrap();

        // Whole levels at 10000 and 9900; 9800 breaches the floor
        assert_eq!(movement.sold, 9.0);
        assert_eq!(movement.purchased, 89300.0);
        assert_eq!(movement.end_price, 9900.0);
        assert!(close(movement.impact_percentage, 1.0));
        assert!(!movement.full_side_consumed);
    }

    #[test]
    fn test_lift_by_impact_slippage() {
        let snap = book(&[], &[(100.0, 1.0), (101.0, 1.0), (105.0, 1.0)]);
        let movement = snap.lift_by_impact_slippage(2.0, 100.0).unwrap();

        assert_eq!(movement.purchased, 2.0);
        assert_eq!(movement.sold, 201.0);
        assert_eq!(movement.end_price, 101.0);
        assert!(close(movement.impact_percentage, 1.0));
    }

    #[test]
    fn test_impact_slippage_nothing_movable() {
        // Floor above every bid: zero movement, not an error
        let snap = book(&[(90.0, 1.0)], &[]);
        let movement = snap.hit_by_impact_slippage(0.5, 100.0).unwrap();
        assert_eq!(movement.sold, 0.0);
        assert_eq!(movement.purchased, 0.0);
        assert_eq!(movement.start_price, 90.0);
        assert_eq!(movement.end_price, 90.0);
    }

    #[test]
    fn test_slippage_validation() {
        let snap = reference_book();
        assert_eq!(
            snap.hit_by_nominal_slippage(-1.0, 10000.0).unwrap_err(),
            DepthError::InvalidNominalSlippage(-1.0)
        );
        assert_eq!(
            snap.lift_by_nominal_slippage(101.0, 10000.0).unwrap_err(),
            DepthError::SlippageExceedsMaximum(101.0)
        );
        assert_eq!(
            snap.hit_by_impact_slippage(-0.5, 10000.0).unwrap_err(),
            DepthError::InvalidImpactSlippage(-0.5)
        );
        assert_eq!(
            snap.lift_by_impact_slippage(1.0, -10.0).unwrap_err(),
            DepthError::InvalidReferencePrice(-10.0)
        );

        let empty = book(&[], &[]);
        assert_eq!(
            empty.hit_by_nominal_slippage(1.0, 100.0).unwrap_err(),
            DepthError::NoLiquidity { side: Side::Bid }
        );
        assert_eq!(
            empty.lift_by_impact_slippage(1.0, 100.0).unwrap_err(),
            DepthError::NoLiquidity { side: Side::Ask }
        );
    }
}
