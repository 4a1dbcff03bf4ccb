//! # Meridian View
//!
//! Client-side derived-state engine for the Meridian venue UI: an async
//! result cache keyed by composite fingerprints, with order-book math and
//! balance reconciliation layered on top.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Shared** — newtypes and exact fixed-point scaling
//! 2. **Cache** — fingerprint-keyed async result cache with
//!    stale-while-revalidate semantics and a single scheduler tick
//! 3. **Source** — collaborator boundaries: transport, account decoding,
//!    wallet identity, preference persistence
//! 4. **Domain** — market snapshots + pure book math, balance reconciliation
//! 5. **Engine** — `VenueEngine` with nested sub-accessors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use meridian_view::prelude::*;
//!
//! let engine = VenueEngine::builder()
//!     .source(rpc_source)
//!     .decoder(venue_decoder)
//!     .program(venue_program)
//!     .build()?;
//! tokio::spawn({ let engine = engine.clone(); async move { engine.run().await } });
//!
//! let (book, _sub) = engine.markets().subscribe_orderbook(&market, on_change);
//! ```

// ── Layer 1: Shared ──────────────────────────────────────────────────────────

/// Shared newtypes and fixed-point scaling.
pub mod shared;

/// Unified engine error types.
pub mod error;

// ── Layer 2: Cache ───────────────────────────────────────────────────────────

/// Fingerprint-keyed async result cache.
pub mod cache;

// ── Layer 3: Collaborators ───────────────────────────────────────────────────

/// Collaborator boundaries: transport, decoding, identity, preferences.
pub mod source;

// ── Layer 4: Domain ──────────────────────────────────────────────────────────

/// Domain modules (vertical slices): market state + math, balances.
pub mod domain;

// ── Layer 5: Engine ──────────────────────────────────────────────────────────

/// `VenueEngine` — the primary entry point.
pub mod engine;

#[cfg(test)]
mod testutil;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{scale_amount, scale_delta, PubkeyStr, Side};

    // Cache
    pub use crate::cache::{AsyncCache, CacheKey, CacheOptions, KeyArg, SlotView, Subscription};

    // Collaborator boundaries
    pub use crate::source::decode::{AccountDecoder, MarketMeta, RawOrder, TokenAccountInfo};
    pub use crate::source::prefs::{InMemoryPrefs, PreferenceStore, Preferences};
    pub use crate::source::wallet::{Disconnected, StaticWallet, WalletSession};
    pub use crate::source::{AccountFilter, DataSource, RawAccount};

    // Domain types — market
    pub use crate::domain::market::book::{
        aggregate_levels, expected_fill_price, mark_price, FillEstimate, MarkPricePolicy,
    };
    pub use crate::domain::market::{
        BookDepth, MarketSnapshot, OpenOrdersView, PriceLevel, Trade, TradeTape,
    };

    // Domain types — balance
    pub use crate::domain::balance::{
        is_native_mint, reconcile, BalanceView, MarketBalances, OpenOrdersFunds,
        NATIVE_DECIMALS, NATIVE_MINT,
    };

    // Errors
    pub use crate::error::{DecodeError, EngineError, TransportError};

    // Engine
    pub use crate::engine::{VenueEngine, VenueEngineBuilder};
}
