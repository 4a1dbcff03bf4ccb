//! Balances sub-accessor — wallet holdings and per-market reconciliation.
//!
//! Everything here is gated on the wallet: while disconnected, every slot
//! resolves to `None` and no network call is made.

use crate::cache::{CacheKey, CacheOptions, SlotView, Subscription};
use crate::domain::balance::{self, MarketBalances, NATIVE_DECIMALS};
use crate::domain::market::resolver::{cached_meta, fetch_open_orders};
use crate::engine::VenueEngine;
use crate::error::EngineError;
use crate::shared::scaling::scale_amount;
use crate::shared::PubkeyStr;
use crate::source::decode::{AccountDecoder, TokenAccountInfo};
use crate::source::{AccountFilter, DataSource};

use rust_decimal::Decimal;
use std::time::Duration;

// ─── Fingerprints ────────────────────────────────────────────────────────────

pub fn wallet_holdings_key(owner: Option<&PubkeyStr>) -> CacheKey {
    CacheKey::new("wallet_token_accounts").with(owner.cloned())
}

pub fn native_balance_key(owner: Option<&PubkeyStr>) -> CacheKey {
    CacheKey::new("native_balance").with(owner.cloned())
}

pub fn market_balances_key(market: &PubkeyStr, owner: Option<&PubkeyStr>) -> CacheKey {
    CacheKey::new("market_balances")
        .with(market)
        .with(owner.cloned())
}

// ─── Fetch plumbing ──────────────────────────────────────────────────────────

/// Raw wallet amount for one mint. The native asset reads the owner
/// account's ledger balance; everything else sums the owner's token accounts
/// for that mint.
async fn wallet_amount(
    source: &dyn DataSource,
    decoder: &dyn AccountDecoder,
    owner: &PubkeyStr,
    mint: &PubkeyStr,
    token_program: &PubkeyStr,
    native_mint: &PubkeyStr,
) -> Result<u64, EngineError> {
    if mint == native_mint {
        return Ok(source.fetch_account(owner).await?.lamports);
    }
    let filter = AccountFilter::program(token_program.clone())
        .owner(owner.clone())
        .mint(mint.clone());
    let accounts = source.fetch_program_accounts(&filter).await?;
    let mut total: u64 = 0;
    for (_, raw) in &accounts {
        total = total.saturating_add(decoder.decode_token_account(&raw.data)?.amount);
    }
    Ok(total)
}

// ─── Sub-accessor ────────────────────────────────────────────────────────────

/// Sub-accessor for balances.
pub struct Balances<'a> {
    pub(crate) engine: &'a VenueEngine,
}

impl<'a> Balances<'a> {
    /// All of the connected wallet's token accounts.
    pub fn subscribe_wallet_holdings<L>(
        &self,
        listener: L,
    ) -> (SlotView<Option<Vec<TokenAccountInfo>>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let wallet = self.engine.wallet.clone();
        let token_program = self.engine.token_program.clone();
        self.engine.cache.subscribe(
            wallet_holdings_key(self.engine.wallet.owner().as_ref()),
            CacheOptions::every(Duration::from_secs(5)).gated(),
            listener,
            move || {
                let source = source.clone();
                let decoder = decoder.clone();
                let wallet = wallet.clone();
                let token_program = token_program.clone();
                async move {
                    let Some(owner) = wallet.owner() else {
                        return Ok(None);
                    };
                    let filter =
                        AccountFilter::program(token_program.clone()).owner(owner.clone());
                    let accounts = source.fetch_program_accounts(&filter).await?;
                    let mut holdings = Vec::with_capacity(accounts.len());
                    for (_, raw) in &accounts {
                        holdings.push(decoder.decode_token_account(&raw.data)?);
                    }
                    Ok(Some(holdings))
                }
            },
        )
    }

    /// The connected wallet's native ledger balance, scaled.
    pub fn subscribe_native_balance<L>(
        &self,
        listener: L,
    ) -> (SlotView<Option<Decimal>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let source = self.engine.source.clone();
        let wallet = self.engine.wallet.clone();
        self.engine.cache.subscribe(
            native_balance_key(self.engine.wallet.owner().as_ref()),
            CacheOptions::every(Duration::from_secs(5)).gated(),
            listener,
            move || {
                let source = source.clone();
                let wallet = wallet.clone();
                async move {
                    let Some(owner) = wallet.owner() else {
                        return Ok(None);
                    };
                    let account = source.fetch_account(&owner).await?;
                    Ok(Some(scale_amount(account.lamports, NATIVE_DECIMALS)?))
                }
            },
        )
    }

    /// Base and quote balance views for one market: wallet holdings plus the
    /// open-orders account's locked/free funds, each scaled by the right
    /// decimal count.
    pub fn subscribe_market_balances<L>(
        &self,
        market: &PubkeyStr,
        listener: L,
    ) -> (SlotView<Option<MarketBalances>>, Subscription)
    where
        L: Fn() + Send + Sync + 'static,
    {
        let cache = self.engine.cache.clone();
        let source = self.engine.source.clone();
        let decoder = self.engine.decoder.clone();
        let wallet = self.engine.wallet.clone();
        let program = self.engine.program.clone();
        let token_program = self.engine.token_program.clone();
        let native_mint = self.engine.native_mint.clone();
        let address = market.clone();
        self.engine.cache.subscribe(
            market_balances_key(market, self.engine.wallet.owner().as_ref()),
            CacheOptions::default().gated(),
            listener,
            move || {
                let cache = cache.clone();
                let source = source.clone();
                let decoder = decoder.clone();
                let wallet = wallet.clone();
                let program = program.clone();
                let token_program = token_program.clone();
                let native_mint = native_mint.clone();
                let address = address.clone();
                async move {
                    let Some(owner) = wallet.owner() else {
                        return Ok(None);
                    };
                    let meta = cached_meta(&cache, &*source, &*decoder, &address).await?;
                    let open_orders =
                        fetch_open_orders(&*source, &*decoder, &program, &address, &owner).await?;

                    let base_raw = wallet_amount(
                        &*source,
                        &*decoder,
                        &owner,
                        &meta.base_mint,
                        &token_program,
                        &native_mint,
                    )
                    .await?;
                    let quote_raw = wallet_amount(
                        &*source,
                        &*decoder,
                        &owner,
                        &meta.quote_mint,
                        &token_program,
                        &native_mint,
                    )
                    .await?;

                    let base_decimals = if meta.base_mint == native_mint {
                        NATIVE_DECIMALS
                    } else {
                        meta.base_decimals
                    };
                    let quote_decimals = if meta.quote_mint == native_mint {
                        NATIVE_DECIMALS
                    } else {
                        meta.quote_decimals
                    };

                    let base = balance::reconcile(
                        meta.base_mint.clone(),
                        base_raw,
                        open_orders.map(|oo| oo.base_funds()),
                        base_decimals,
                    )?;
                    let quote = balance::reconcile(
                        meta.quote_mint.clone(),
                        quote_raw,
                        open_orders.map(|oo| oo.quote_funds()),
                        quote_decimals,
                    )?;
                    Ok(Some(MarketBalances { base, quote }))
                }
            },
        )
    }

    /// Current wallet view of one reconciled currency, if already cached.
    pub fn load_market_balances(
        &self,
        market: &PubkeyStr,
    ) -> SlotView<Option<MarketBalances>> {
        self.engine.cache.load(&market_balances_key(
            market,
            self.engine.wallet.owner().as_ref(),
        ))
    }
}
