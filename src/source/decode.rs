//! Account-layout decoding boundary.
//!
//! Decoders turn opaque account bytes into the small structs the engine
//! computes over. A decode failure fails the single fetch attempt that hit
//! it — the previously cached value stays available.

use crate::domain::market::{OpenOrdersView, Trade};
use crate::error::DecodeError;
use crate::shared::PubkeyStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decoded market header: side/log addresses, mints, decimal counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMeta {
    pub market: PubkeyStr,
    pub bids: PubkeyStr,
    pub asks: PubkeyStr,
    pub event_log: PubkeyStr,
    pub base_mint: PubkeyStr,
    pub quote_mint: PubkeyStr,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    /// Price granularity of the venue, in fractional digits.
    pub tick_decimals: u32,
}

/// One raw resting order before aggregation. Multiple orders may share a
/// price; aggregation merges them into levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrder {
    pub price: Decimal,
    pub size: Decimal,
}

/// Decoded SPL-style token account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccountInfo {
    pub mint: PubkeyStr,
    pub owner: PubkeyStr,
    /// Raw fixed-point amount; scale with the mint's decimal count.
    pub amount: u64,
}

/// Venue account decoders.
pub trait AccountDecoder: Send + Sync {
    fn decode_market(&self, data: &[u8]) -> Result<MarketMeta, DecodeError>;

    /// Decode one side's resting orders, best price first.
    fn decode_orderbook_side(&self, data: &[u8]) -> Result<Vec<RawOrder>, DecodeError>;

    fn decode_open_orders(&self, data: &[u8]) -> Result<OpenOrdersView, DecodeError>;

    fn decode_token_account(&self, data: &[u8]) -> Result<TokenAccountInfo, DecodeError>;

    /// Decode recent fills, most recent first.
    fn decode_trades(&self, data: &[u8]) -> Result<Vec<Trade>, DecodeError>;
}
