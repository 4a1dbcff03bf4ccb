//! Unified engine error types.
//!
//! Two conditions deliberately have no variant here: a disconnected wallet
//! resolves to "no data" (`None`), and a book too shallow for a requested
//! notional resolves to a partial [`crate::domain::market::book::FillEstimate`].
//! Both are ordinary values a UI renders, not failures.

use thiserror::Error;

use crate::shared::scaling::ScalingError;

/// Top-level engine error.
///
/// Fetch-level errors terminate at the cache boundary: consumers read them
/// from the cache slot alongside the last good value, they are never thrown
/// past `subscribe`/`refresh`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("scaling error: {0}")]
    Scaling(#[from] ScalingError),

    #[error("{0}")]
    Other(String),
}

/// I/O failures reaching the data source.
///
/// Always recovered by scheduled revalidation — the cache's refresh interval
/// owns the retry cadence, nothing in the engine retries in a loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out reaching the data source")]
    Timeout,

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Malformed or unexpected account layout.
///
/// Fatal to the single fetch attempt that hit it; the previously cached value
/// stays available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unexpected account layout: {0}")]
    UnexpectedLayout(String),
}
