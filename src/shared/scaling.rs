//! Fixed-point to decimal conversion.
//!
//! On-chain amounts are `u64` integers carrying an implicit scale: a raw
//! amount `a` with `d` decimals represents the real value `a / 10^d`. The
//! conversion goes straight from the integer into a [`Decimal`] with the
//! right scale — no intermediate float, so repeated additions of scaled
//! amounts never accumulate round-off.

use rust_decimal::Decimal;
use thiserror::Error;

/// `Decimal` supports scales up to 28 fractional digits.
const MAX_SCALE: u8 = 28;

/// Errors from fixed-point scaling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalingError {
    #[error("decimal count {0} exceeds the supported maximum of 28")]
    ScaleOutOfRange(u8),

    #[error("free amount {free} exceeds total {total}")]
    FreeExceedsTotal { free: u64, total: u64 },
}

/// Convert a raw fixed-point amount into its real value.
///
/// Exact for any `u64` amount and `decimals <= 28`.
pub fn scale_amount(raw: u64, decimals: u8) -> Result<Decimal, ScalingError> {
    if decimals > MAX_SCALE {
        return Err(ScalingError::ScaleOutOfRange(decimals));
    }
    Ok(Decimal::from_i128_with_scale(raw as i128, decimals as u32))
}

/// Convert the difference `total - free` into its real value.
///
/// Used for locked-in-orders balances, where both fields come from the same
/// account and `free <= total` is a venue invariant; a violation is reported
/// rather than wrapped.
pub fn scale_delta(total: u64, free: u64, decimals: u8) -> Result<Decimal, ScalingError> {
    let raw = total
        .checked_sub(free)
        .ok_or(ScalingError::FreeExceedsTotal { free, total })?;
    scale_amount(raw, decimals)
}
