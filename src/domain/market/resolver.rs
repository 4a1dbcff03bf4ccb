//! Markets sub-accessor — cached snapshot loading and derived prices.
//!
//! Every load is wrapped by the engine's cache under a fingerprint of the
//! operation name and its arguments; the cache owns dedup and retry cadence.
//! Nothing here retries: a failed fetch surfaces its error on the slot and
//! the next scheduled revalidation tries again.

use crate::cache::{AsyncCache, CacheKey, CacheOptions, SlotView, Subscription};
use crate::domain::market::book::{self, FillEstimate, MarkPricePolicy};
use crate::domain::market::{BookDepth, MarketSnapshot, OpenOrdersView, Trade};
use crate::engine::VenueEngine;
use crate::error::EngineError;
use crate::shared::{PubkeyStr, Side};
use crate::source::decode::{AccountDecoder, MarketMeta};
use crate::source::{AccountFilter, DataSource};

use futures_util::future::try_join;
use rust_decimal::Decimal;
use std::time::Duration;

// ─── Fingerprints ────────────────────────────────────────────────────────────

pub fn meta_key(market: &PubkeyStr) -> CacheKey {
    CacheKey::new("market_meta").with(market)
}

pub fn orderbook_key(market: &PubkeyStr) -> CacheKey {
    CacheKey::new("orderbook").with(market)
}

pub fn open_orders_key(market: &PubkeyStr, owner: Option<&PubkeyStr>) -> CacheKey {
    CacheKey::new("open_orders").with(market).with(owner.cloned())
}

pub fn trades_key(market: &PubkeyStr) -> CacheKey {
    CacheKey::new("trades").with(market)
}

pub fn snapshot_key(market: &PubkeyStr, owner: Option<&PubkeyStr>) -> CacheKey {
    CacheKey::new("market_snapshot")
        .with(market)
        .with(owner.cloned())
}

pub fn mark_price_key(market: &PubkeyStr) -> CacheKey {
    CacheKey::new("mark_price").with(market)
}

pub fn fill_estimate_key(market: &PubkeyStr, side: Side, target_notional: Decimal) -> CacheKey {
    CacheKey::new("fill_estimate")
        .with(market)
        .with(side.as_str())
        .with(target_notional)
}

// ─── Shared fetch plumbing ───────────────────────────────────────────────────

async fn fetch_meta(
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    market: &PubkeyStr,
) -> Result<MarketMeta, EngineError> {
    let raw = source.fetch_account(market).await?;
    Ok(decoder.decode_market(&raw.data)?)
}

/// Market metadata changes rarely; prefer the cached copy and only hit the
/// source when nothing is cached yet.
pub(crate) async fn cached_meta(
    cache: &AsyncCache,
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    market: &PubkeyStr,
) -> Result<MarketMeta, EngineError> {
    if let Some(meta) = cache.load::<MarketMeta>(&meta_key(market)).value {
        return Ok((*meta).clone());
    }
    fetch_meta(source, decoder, market).await
}

async fn fetch_book(
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    meta: &MarketMeta,
    depth: usize,
) -> Result<BookDepth, EngineError> {
    let (bids_raw, asks_raw) = try_join(
        source.fetch_account(&meta.bids),
        source.fetch_account(&meta.asks),
    )
    .await?;
    Ok(BookDepth {
        bids: book::aggregate_levels(&decoder.decode_orderbook_side(&bids_raw.data)?, depth, Side::Bid),
        asks: book::aggregate_levels(&decoder.decode_orderbook_side(&asks_raw.data)?, depth, Side::Ask),
    })
}

/// Derived computations prefer the book another subscriber already keeps
/// fresh, and fetch their own copy only when no one does.
async fn cached_book(
    cache: &AsyncCache,
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    market: &PubkeyStr,
    depth: usize,
) -> Result<BookDepth, EngineError> {
    if let Some(depth_view) = cache.load::<BookDepth>(&orderbook_key(market)).value {
        return Ok((*depth_view).clone());
    }
    let meta = cached_meta(cache, source, decoder, market).await?;
    fetch_book(source, decoder, &meta, depth).await
}

pub(crate) async fn fetch_open_orders(
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    program: &PubkeyStr,
    market: &PubkeyStr,
    owner: &PubkeyStr,
) -> Result<Option<OpenOrdersView>, EngineError> {
    let filter = AccountFilter::program(program.clone())
        .market(market.clone())
        .owner(owner.clone());
    let accounts = source.fetch_program_accounts(&filter).await?;
    match accounts.first() {
        Some((_, raw)) => Ok(Some(decoder.decode_open_orders(&raw.data)?)),
        None => Ok(None),
    }
}

// ─── Sub-accessor ────────────────────────────────────────────────────────────

/// Sub-accessor for market state.
pub struct Markets<'a> {
    pub(crate) engine: &'a VenueEngine,
}

impl<'a> Markets<'a> {
    /// Market metadata: side addresses, mints, decimal counts.
    pub fn subscribe_meta<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<MarketMeta>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let address = market.clone();
        self.engine.cache.subscribe(
            meta_key(market),
            CacheOptions::slow(),
            listener,
            move || {
                let source = source.clone();
                let decoder = decoder.clone();
                let address = address.clone();
                async move { fetch_meta(&*source, &*decoder, &address).await }
            },
        )
    }

    /// Aggregated depth for both sides.
    pub fn subscribe_orderbook<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<BookDepth>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let depth = self.engine.book_depth;
        let address = market.clone();
        self.engine.cache.subscribe(
            orderbook_key(market),
            CacheOptions::default(),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let address = address.clone();
                async move {
                    let meta = cached_meta(&cache, &*source, &*decoder, &address).await?;
                    fetch_book(&*source, &*decoder, &meta, depth).await
                }
            },
        )
    }

    /// The connected trader's open-orders account on this market.
    ///
    /// Resolves to `None` without a network call while the wallet is
    /// disconnected, and to `None` when the trader has no account there yet.
    pub fn subscribe_open_orders<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<Option<OpenOrdersView>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let wallet = self.engine.wallet.clone();
        let program = self.engine.program.clone();
        let address = market.clone();
        self.engine.cache.subscribe(
            open_orders_key(market, self.engine.wallet.owner().as_ref()),
            CacheOptions::default().gated(),
            listener,
            move || {
                let source = source.clone();
                let decoder = decoder.clone();
                let wallet = wallet.clone();
                let program = program.clone();
                let address = address.clone();
                async move {
                    let Some(owner) = wallet.owner() else {
                        return Ok(None);
                    };
                    fetch_open_orders(&*source, &*decoder, &program, &address, &owner).await
                }
            },
        )
    }

    /// Recent fills, most recent first.
    pub fn subscribe_trades<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<Vec<Trade>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let address = market.clone();
        self.engine.cache.subscribe(
            trades_key(market),
            CacheOptions::every(Duration::from_secs(2)),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let address = address.clone();
                async move {
                    let meta = cached_meta(&cache, &*source, &*decoder, &address).await?;
                    let raw = source.fetch_account(&meta.event_log).await?;
                    Ok(decoder.decode_trades(&raw.data)?)
                }
            },
        )
    }

    /// Composite snapshot: metadata + depth + the trader's open orders.
    pub fn subscribe_snapshot<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<MarketSnapshot>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let wallet = self.engine.wallet.clone();
        let program = self.engine.program.clone();
        let depth = self.engine.book_depth;
        let address = market.clone();
        self.engine.cache.subscribe(
            snapshot_key(market, self.engine.wallet.owner().as_ref()),
            CacheOptions::default(),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let wallet = wallet.clone();
                let program = program.clone();
                let address = address.clone();
                async move {
                    let meta = cached_meta(&cache, &*source, &*decoder, &address).await?;
                    let book = fetch_book(&*source, &*decoder, &meta, depth).await?;
                    let open_orders = match wallet.owner() {
                        Some(owner) => {
                            fetch_open_orders(&*source, &*decoder, &program, &address, &owner)
                                .await?
                        }
                        None => None,
                    };
                    Ok(MarketSnapshot {
                        market: meta.market.clone(),
                        base_mint: meta.base_mint.clone(),
                        quote_mint: meta.quote_mint.clone(),
                        base_decimals: meta.base_decimals,
                        quote_decimals: meta.quote_decimals,
                        book,
                        open_orders,
                    })
                }
            },
        )
    }

    /// Derived mark price, cached under its own fingerprint.
    ///
    /// The median leg uses the trade tape only when some subscriber keeps the
    /// market's trades slot warm; otherwise it falls back to the midpoint.
    pub fn subscribe_mark_price<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<Option<Decimal>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let policy = self.engine.mark_policy;
        let depth = self.engine.book_depth;
        let address = market.clone();
        self.engine.cache.subscribe(
            mark_price_key(market),
            CacheOptions::default(),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let address = address.clone();
                async move {
                    let book = cached_book(&cache, &*source, &*decoder, &address, depth).await?;
                    let last_trade = cache
                        .load::<Vec<Trade>>(&trades_key(&address))
                        .value
                        .and_then(|trades| trades.first().map(|t| t.price));
                    Ok(book::mark_price(&book.bids, &book.asks, last_trade, policy))
                }
            },
        )
    }

    /// Derived fill estimate for a taker order of `side` moving
    /// `target_notional`, cached under its own fingerprint.
    pub fn subscribe_fill_estimate<L>(
        &self,
        market: &PubkeyStr,
        side: Side,
        target_notional: Decimal,
        listener: L,
    ) -> (SlotView<Option<FillEstimate>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let depth = self.engine.book_depth;
        let address = market.clone();
        self.engine.cache.subscribe(
            fill_estimate_key(market, side, target_notional),
            CacheOptions::default(),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let address = address.clone();
                async move {
                    let book = cached_book(&cache, &*source, &*decoder, &address, depth).await?;
                    let tick_decimals = cache
                        .load::<MarketMeta>(&meta_key(&address))
                        .value
                        .map(|meta| meta.tick_decimals);
                    Ok(book::expected_fill_price(
                        &book.bids,
                        &book.asks,
                        side,
                        target_notional,
                        tick_decimals,
                    ))
                }
            },
        )
    }

    /// Force an immediate refetch of this market's depth.
    pub fn refresh_orderbook(&self, market: &PubkeyStr) {
        self.engine.cache.refresh(&orderbook_key(market));
    }

    /// Convenience: the engine's configured mark-price policy.
    pub fn mark_policy(&self) -> MarkPricePolicy {
        self.engine.mark_policy
    }
}
