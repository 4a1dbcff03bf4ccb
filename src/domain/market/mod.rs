//! Market domain — depth snapshots, open orders, trades.

pub mod book;
pub mod resolver;

use crate::shared::{PubkeyStr, Side};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ─── Depth ───────────────────────────────────────────────────────────────────

/// One aggregated (price, size) pair at one matching-priority position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Aggregated depth for both sides of a market.
///
/// Bids are sorted descending by price, asks ascending — index 0 is always
/// the best level. Replaced wholesale on each refresh; consumers treat the
/// shared value as immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDepth {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl BookDepth {
    /// Highest bid price.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Lowest ask price.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Average of best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Spread between best ask and best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

// ─── Open orders ─────────────────────────────────────────────────────────────

/// A trader's locked/free balances on one market, in raw fixed-point units.
///
/// `free` is settled and withdrawable; `total - free` is locked behind
/// resting orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrdersView {
    pub base_free: u64,
    pub base_total: u64,
    pub quote_free: u64,
    pub quote_total: u64,
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Everything needed to answer market queries, fetched as one unit.
///
/// `open_orders` is `None` both when the wallet is disconnected and when the
/// trader has no open-orders account on this market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market: PubkeyStr,
    pub base_mint: PubkeyStr,
    pub quote_mint: PubkeyStr,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub book: BookDepth,
    pub open_orders: Option<OpenOrdersView>,
}

// ─── Trades ──────────────────────────────────────────────────────────────────

/// One venue fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

/// Rolling tape of recent fills, most recent first.
///
/// The app owns instances of this type and feeds it from the cached trade
/// slot; the engine provides the update methods.
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<Trade>,
    max_size: usize,
}

impl TradeTape {
    pub fn new(max_size: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a new fill, evicting the oldest if at capacity.
    pub fn push(&mut self, trade: Trade) {
        if self.trades.len() >= self.max_size {
            self.trades.pop_back();
        }
        self.trades.push_front(trade);
    }

    /// Replace the whole tape (e.g. from a refreshed fetch, most recent
    /// first).
    pub fn replace(&mut self, trades: Vec<Trade>) {
        self.trades.clear();
        for trade in trades.into_iter().take(self.max_size) {
            self.trades.push_back(trade);
        }
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    /// Price of the most recent fill.
    pub fn last_price(&self) -> Option<Decimal> {
        self.latest().map(|t| t.price)
    }

    pub fn trades(&self) -> &VecDeque<Trade> {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }
}
