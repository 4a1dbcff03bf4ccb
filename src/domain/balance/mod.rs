//! Balance domain — per-currency reconciliation of wallet holdings and
//! resting-order balances.

pub mod resolver;

use crate::domain::market::OpenOrdersView;
use crate::shared::scaling::{scale_amount, scale_delta, ScalingError};
use crate::shared::PubkeyStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The chain's native asset always carries 9 fractional digits.
pub const NATIVE_DECIMALS: u8 = 9;

/// Canonical mint address of the wrapped native asset.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Canonical token program owning SPL-style token accounts.
pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Unified per-currency balance view.
///
/// `locked_in_orders` and `unsettled` are `None` when the trader has no
/// open-orders account on the market — "never traded here" is not the same
/// as "traded and now flat".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub mint: PubkeyStr,
    /// Spendable wallet balance.
    pub wallet: Decimal,
    /// Funds locked behind resting orders.
    pub locked_in_orders: Option<Decimal>,
    /// Settled on the venue but not yet withdrawn to the wallet.
    pub unsettled: Option<Decimal>,
}

/// Base and quote balance views for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketBalances {
    pub base: BalanceView,
    pub quote: BalanceView,
}

/// Raw free/total fields for one currency of an open-orders account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOrdersFunds {
    pub free: u64,
    pub total: u64,
}

impl OpenOrdersView {
    /// The base-currency funds of this account.
    pub fn base_funds(&self) -> OpenOrdersFunds {
        OpenOrdersFunds {
            free: self.base_free,
            total: self.base_total,
        }
    }

    /// The quote-currency funds of this account.
    pub fn quote_funds(&self) -> OpenOrdersFunds {
        OpenOrdersFunds {
            free: self.quote_free,
            total: self.quote_total,
        }
    }
}

/// Combine a wallet balance and optional open-orders funds into one view.
///
/// All inputs are raw fixed-point integers; the scaling division happens
/// exactly once per output field.
pub fn reconcile(
    mint: PubkeyStr,
    wallet_raw: u64,
    funds: Option<OpenOrdersFunds>,
    decimals: u8,
) -> Result<BalanceView, ScalingError> {
    let wallet = scale_amount(wallet_raw, decimals)?;
    let (locked_in_orders, unsettled) = match funds {
        Some(f) => (
            Some(scale_delta(f.total, f.free, decimals)?),
            Some(scale_amount(f.free, decimals)?),
        ),
        None => (None, None),
    };
    Ok(BalanceView {
        mint,
        wallet,
        locked_in_orders,
        unsettled,
    })
}

/// Whether `mint` is the wrapped native asset, whose wallet balance is the
/// account's raw ledger balance rather than token-account data.
pub fn is_native_mint(mint: &PubkeyStr) -> bool {
    mint.as_str() == NATIVE_MINT
}
