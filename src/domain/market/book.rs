//! Pure order-book math: level aggregation, mark price, expected fill price.
//!
//! Everything here is `Decimal` arithmetic over already-decoded levels — no
//! async, no network, no panics. Conditions a UI has to render ("no book",
//! "not enough depth") come back as values, not errors.

use crate::domain::market::PriceLevel;
use crate::shared::Side;
use crate::source::decode::RawOrder;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Merge raw orders sharing a price into aggregated levels, sorted by
/// matching priority (descending for bids, ascending for asks), truncated to
/// `depth` levels.
pub fn aggregate_levels(raw: &[RawOrder], depth: usize, side: Side) -> Vec<PriceLevel> {
    let mut merged: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for order in raw {
        *merged.entry(order.price).or_insert(Decimal::ZERO) += order.size;
    }

    let to_level = |(price, size): (Decimal, Decimal)| PriceLevel { price, size };
    match side {
        Side::Ask => merged.into_iter().take(depth).map(to_level).collect(),
        Side::Bid => merged.into_iter().rev().take(depth).map(to_level).collect(),
    }
}

// ─── Mark price ──────────────────────────────────────────────────────────────

/// How the mark price treats the trade tape when it diverges from the book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkPricePolicy {
    /// Median of best bid, best ask, and the most recent trade when one
    /// exists; book midpoint otherwise.
    #[default]
    MedianWithLastTrade,
    /// Book midpoint only; the tape is ignored (e.g. when trade data is
    /// known to lag).
    MidpointOnly,
}

/// Representative price derived from best bid, best ask, and the last trade.
///
/// `None` when either side of the book is empty.
pub fn mark_price(
    bids: &[PriceLevel],
    asks: &[PriceLevel],
    last_trade: Option<Decimal>,
    policy: MarkPricePolicy,
) -> Option<Decimal> {
    let best_bid = bids.first()?.price;
    let best_ask = asks.first()?.price;
    match (policy, last_trade) {
        (MarkPricePolicy::MedianWithLastTrade, Some(last)) => {
            Some(median3(best_bid, best_ask, last))
        }
        _ => Some((best_bid + best_ask) / Decimal::TWO),
    }
}

fn median3(a: Decimal, b: Decimal, c: Decimal) -> Decimal {
    let mut v = [a, b, c];
    v.sort_unstable();
    v[1]
}

// ─── Expected fill price ─────────────────────────────────────────────────────

/// Outcome of walking the book for a target notional.
///
/// When the book runs out before the target is covered, `filled` stops below
/// `requested` and `average_price` reflects only the liquidity that existed —
/// a best-effort partial average, not a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEstimate {
    /// Cost-weighted average price over the walked levels.
    pub average_price: Decimal,
    /// Notional actually covered by resting liquidity.
    pub filled: Decimal,
    /// Notional requested.
    pub requested: Decimal,
}

impl FillEstimate {
    /// Whether the book could satisfy the whole notional.
    pub fn is_complete(&self) -> bool {
        self.filled == self.requested
    }
}

/// Average price a taker order of `side` would pay to move `target_notional`
/// through the book.
///
/// Walks the opposing side best price first. The notional's unit follows the
/// side being taken: a bid buys from the asks and spends quote currency, so
/// each level costs `price * size`; an ask sells into the bids and is sized
/// in base currency, so each level costs `size`. The crossing level
/// contributes only the fraction needed to reach the target.
///
/// `tick_decimals` floors the result to the venue's price granularity — an
/// estimate must never look better than what the book fills at tick size.
///
/// `None` when the target is non-positive or the opposing side is empty.
pub fn expected_fill_price(
    bids: &[PriceLevel],
    asks: &[PriceLevel],
    side: Side,
    target_notional: Decimal,
    tick_decimals: Option<u32>,
) -> Option<FillEstimate> {
    if target_notional <= Decimal::ZERO {
        return None;
    }
    let levels = match side {
        Side::Bid => asks,
        Side::Ask => bids,
    };
    if levels.is_empty() {
        return None;
    }

    let mut spent = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    for level in levels {
        let cost_at_level = match side {
            Side::Bid => level.price * level.size,
            Side::Ask => level.size,
        };
        if spent + cost_at_level >= target_notional {
            weighted += (target_notional - spent) * level.price;
            spent = target_notional;
            break;
        }
        weighted += cost_at_level * level.price;
        spent += cost_at_level;
    }

    let filled = spent;
    if filled.is_zero() {
        return None;
    }
    let mut average_price = weighted / filled;
    if let Some(dp) = tick_decimals {
        average_price = average_price.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
    }
    Some(FillEstimate {
        average_price,
        filled,
        requested: target_notional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn level(price: &str, size: &str) -> PriceLevel {
        PriceLevel {
            price: Decimal::from_str(price).unwrap(),
            size: Decimal::from_str(size).unwrap(),
        }
    }

    fn raw(price: &str, size: &str) -> RawOrder {
        RawOrder {
            price: Decimal::from_str(price).unwrap(),
            size: Decimal::from_str(size).unwrap(),
        }
    }

    #[test]
    fn test_aggregate_merges_and_sorts() {
        let orders = [raw("10", "1"), raw("11", "2"), raw("10", "3"), raw("9", "1")];

        let asks = aggregate_levels(&orders, 10, Side::Ask);
        assert_eq!(
            asks,
            vec![level("9", "1"), level("10", "4"), level("11", "2")]
        );

        let bids = aggregate_levels(&orders, 10, Side::Bid);
        assert_eq!(
            bids,
            vec![level("11", "2"), level("10", "4"), level("9", "1")]
        );
    }

    #[test]
    fn test_aggregate_truncates_best_levels() {
        let orders = [raw("10", "1"), raw("11", "1"), raw("12", "1")];
        assert_eq!(
            aggregate_levels(&orders, 2, Side::Ask),
            vec![level("10", "1"), level("11", "1")]
        );
        assert_eq!(
            aggregate_levels(&orders, 2, Side::Bid),
            vec![level("12", "1"), level("11", "1")]
        );
    }

    #[test]
    fn test_mark_price_midpoint_without_trades() {
        let bids = [level("10", "1"), level("9", "2")];
        let asks = [level("11", "1"), level("12", "3")];
        assert_eq!(
            mark_price(&bids, &asks, None, MarkPricePolicy::default()),
            Some(Decimal::from_str("10.5").unwrap())
        );
    }

    #[test]
    fn test_mark_price_median_with_last_trade() {
        let bids = [level("10", "1"), level("9", "2")];
        let asks = [level("11", "1"), level("12", "3")];
        let last = Decimal::from_str("10.8").unwrap();
        assert_eq!(
            mark_price(&bids, &asks, Some(last), MarkPricePolicy::MedianWithLastTrade),
            Some(last)
        );
    }

    #[test]
    fn test_mark_price_median_clamps_outlier_trade() {
        let bids = [level("10", "1")];
        let asks = [level("11", "1")];
        // A stale print far above the book lands on the best ask.
        let last = Decimal::from(40);
        assert_eq!(
            mark_price(&bids, &asks, Some(last), MarkPricePolicy::MedianWithLastTrade),
            Some(Decimal::from(11))
        );
    }

    #[test]
    fn test_mark_price_midpoint_only_ignores_tape() {
        let bids = [level("10", "1")];
        let asks = [level("11", "1")];
        assert_eq!(
            mark_price(&bids, &asks, Some(Decimal::from(40)), MarkPricePolicy::MidpointOnly),
            Some(Decimal::from_str("10.5").unwrap())
        );
    }

    #[test]
    fn test_mark_price_absent_on_one_sided_book() {
        let bids = [level("10", "1")];
        assert_eq!(mark_price(&bids, &[], None, MarkPricePolicy::default()), None);
        assert_eq!(mark_price(&[], &bids, None, MarkPricePolicy::default()), None);
    }

    #[test]
    fn test_fill_price_partial_level() {
        // Buying 15 quote units against asks (10,1),(11,1): the first level
        // costs 10, the crossing level contributes the remaining 5 at 11.
        let asks = [level("10", "1"), level("11", "1")];
        let est = expected_fill_price(&[], &asks, Side::Bid, Decimal::from(15), None).unwrap();
        assert_eq!(
            est.average_price,
            Decimal::from(155) / Decimal::from(15)
        );
        assert_eq!(est.filled, Decimal::from(15));
        assert!(est.is_complete());
    }

    #[test]
    fn test_fill_price_sell_counts_base_units() {
        // Selling 3 base units into bids (10,2),(9,2): 2 at 10, 1 at 9.
        let bids = [level("10", "2"), level("9", "2")];
        let est = expected_fill_price(&bids, &[], Side::Ask, Decimal::from(3), None).unwrap();
        assert_eq!(
            est.average_price,
            Decimal::from(29) / Decimal::from(3)
        );
        assert!(est.is_complete());
    }

    #[test]
    fn test_fill_price_insufficient_depth_reports_partial() {
        // The whole book is worth 21 quote units; asking for 30 fills 21.
        let asks = [level("10", "1"), level("11", "1")];
        let est = expected_fill_price(&[], &asks, Side::Bid, Decimal::from(30), None).unwrap();
        assert_eq!(est.filled, Decimal::from(21));
        assert_eq!(est.requested, Decimal::from(30));
        assert!(!est.is_complete());
        assert_eq!(
            est.average_price,
            Decimal::from(221) / Decimal::from(21)
        );
    }

    #[test]
    fn test_fill_price_floors_to_tick() {
        let asks = [level("10", "1"), level("11", "1")];
        let est = expected_fill_price(&[], &asks, Side::Bid, Decimal::from(15), Some(2)).unwrap();
        // 155/15 = 10.333…, floored at two decimals.
        assert_eq!(est.average_price, Decimal::from_str("10.33").unwrap());
    }

    #[test]
    fn test_fill_price_exact_level_boundary() {
        // Target exactly consumes the first level.
        let asks = [level("10", "1"), level("11", "1")];
        let est = expected_fill_price(&[], &asks, Side::Bid, Decimal::from(10), None).unwrap();
        assert_eq!(est.average_price, Decimal::from(10));
        assert!(est.is_complete());
    }

    #[test]
    fn test_fill_price_rejects_empty_inputs() {
        let asks = [level("10", "1")];
        assert!(expected_fill_price(&[], &asks, Side::Bid, Decimal::ZERO, None).is_none());
        assert!(expected_fill_price(&[], &asks, Side::Ask, Decimal::from(5), None).is_none());
    }
}
