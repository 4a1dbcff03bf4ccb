//! Engine entry point — shared cache + collaborator wiring.
//!
//! Each domain has its own sub-accessor in `domain/<name>/resolver.rs`.
//! This module keeps the builder, the injectable cache instance, and the
//! accessor methods.

use crate::cache::AsyncCache;
use crate::domain::balance::resolver::Balances;
use crate::domain::balance::{NATIVE_MINT, TOKEN_PROGRAM};
use crate::domain::market::book::MarkPricePolicy;
use crate::domain::market::resolver::Markets;
use crate::error::EngineError;
use crate::shared::PubkeyStr;
use crate::source::decode::AccountDecoder;
use crate::source::prefs::{InMemoryPrefs, PreferenceStore, Preferences};
use crate::source::wallet::{Disconnected, WalletSession};
use crate::source::DataSource;

use std::sync::Arc;

/// Default number of aggregated levels kept per book side.
pub const DEFAULT_BOOK_DEPTH: usize = 20;

/// The primary entry point for the derived-state engine.
///
/// Holds one [`AsyncCache`] plus the collaborator handles, and hands out
/// domain sub-accessors: `engine.markets()`, `engine.balances()`. Constructed
/// once at startup and cloned cheaply — clones share the same cache and
/// collaborators.
#[derive(Clone)]
pub struct VenueEngine {
    pub(crate) cache: AsyncCache,
    pub(crate) source: Arc<dyn DataSource>,
    pub(crate) decoder: Arc<dyn AccountDecoder>,
    pub(crate) wallet: Arc<dyn WalletSession>,
    pub(crate) prefs: Preferences,
    /// The venue program owning markets and open-orders accounts.
    pub(crate) program: PubkeyStr,
    pub(crate) token_program: PubkeyStr,
    pub(crate) native_mint: PubkeyStr,
    pub(crate) mark_policy: MarkPricePolicy,
    pub(crate) book_depth: usize,
}

impl VenueEngine {
    pub fn builder() -> VenueEngineBuilder {
        VenueEngineBuilder::default()
    }

    // ── Sub-accessors ────────────────────────────────────────────────────

    pub fn markets(&self) -> Markets<'_> {
        Markets { engine: self }
    }

    pub fn balances(&self) -> Balances<'_> {
        Balances { engine: self }
    }

    pub fn cache(&self) -> &AsyncCache {
        &self.cache
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn wallet(&self) -> &Arc<dyn WalletSession> {
        &self.wallet
    }

    /// Drive the cache's refresh scheduler. Spawn this once; everything else
    /// is non-blocking.
    pub async fn run(&self) {
        self.cache.run().await
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct VenueEngineBuilder {
    cache: Option<AsyncCache>,
    source: Option<Arc<dyn DataSource>>,
    decoder: Option<Arc<dyn AccountDecoder>>,
    wallet: Arc<dyn WalletSession>,
    prefs: Arc<dyn PreferenceStore>,
    program: Option<PubkeyStr>,
    token_program: PubkeyStr,
    native_mint: PubkeyStr,
    mark_policy: MarkPricePolicy,
    book_depth: usize,
}

impl Default for VenueEngineBuilder {
    fn default() -> Self {
        Self {
            cache: None,
            source: None,
            decoder: None,
            wallet: Arc::new(Disconnected),
            prefs: Arc::new(InMemoryPrefs::new()),
            program: None,
            token_program: PubkeyStr::new(TOKEN_PROGRAM),
            native_mint: PubkeyStr::new(NATIVE_MINT),
            mark_policy: MarkPricePolicy::default(),
            book_depth: DEFAULT_BOOK_DEPTH,
        }
    }
}

impl VenueEngineBuilder {
    /// Use an existing cache instance (e.g. one shared with other engines, or
    /// one a test constructed with a short idle TTL).
    pub fn cache(mut self, cache: AsyncCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn AccountDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn wallet(mut self, wallet: Arc<dyn WalletSession>) -> Self {
        self.wallet = wallet;
        self
    }

    pub fn prefs(mut self, prefs: Arc<dyn PreferenceStore>) -> Self {
        self.prefs = prefs;
        self
    }

    /// The venue program address. Required.
    pub fn program(mut self, program: PubkeyStr) -> Self {
        self.program = Some(program);
        self
    }

    pub fn token_program(mut self, token_program: PubkeyStr) -> Self {
        self.token_program = token_program;
        self
    }

    pub fn native_mint(mut self, native_mint: PubkeyStr) -> Self {
        self.native_mint = native_mint;
        self
    }

    pub fn mark_policy(mut self, policy: MarkPricePolicy) -> Self {
        self.mark_policy = policy;
        self
    }

    pub fn book_depth(mut self, depth: usize) -> Self {
        self.book_depth = depth;
        self
    }

    pub fn build(self) -> Result<VenueEngine, EngineError> {
        let source = self
            .source
            .ok_or_else(|| EngineError::Other("engine requires a data source".to_string()))?;
        let decoder = self
            .decoder
            .ok_or_else(|| EngineError::Other("engine requires an account decoder".to_string()))?;
        let program = self
            .program
            .ok_or_else(|| EngineError::Other("engine requires a venue program".to_string()))?;

        let cache = self.cache.unwrap_or_default();
        let wallet = self.wallet;
        {
            let wallet = wallet.clone();
            cache.set_connection_gate(move || wallet.is_connected());
        }

        Ok(VenueEngine {
            cache,
            source,
            decoder,
            wallet,
            prefs: Preferences::new(self.prefs),
            program,
            token_program: self.token_program,
            native_mint: self.native_mint,
            mark_policy: self.mark_policy,
            book_depth: self.book_depth,
        })
    }
}
