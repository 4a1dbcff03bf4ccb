//! In-memory fixtures backing the unit tests: a seedable data source and a
//! JSON-based account decoder.

use crate::domain::market::{OpenOrdersView, Trade};
use crate::engine::VenueEngine;
use crate::error::{DecodeError, TransportError};
use crate::shared::PubkeyStr;
use crate::source::decode::{AccountDecoder, MarketMeta, RawOrder, TokenAccountInfo};
use crate::source::wallet::WalletSession;
use crate::source::{AccountFilter, DataSource, RawAccount};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn venue_program() -> PubkeyStr {
    PubkeyStr::new("MRDNVenue1111111111111111111111111111111111")
}

/// Seedable in-memory data source. Accounts hold JSON-encoded fixtures that
/// [`JsonDecoder`] understands.
#[derive(Default)]
pub struct FixtureSource {
    accounts: Mutex<HashMap<PubkeyStr, RawAccount>>,
    /// (market, owner) → open-orders account.
    open_orders: Mutex<HashMap<(PubkeyStr, PubkeyStr), (PubkeyStr, RawAccount)>>,
    /// (owner, mint) → token account.
    token_accounts: Mutex<HashMap<(PubkeyStr, PubkeyStr), (PubkeyStr, RawAccount)>>,
    fail: AtomicBool,
    program_scans: AtomicUsize,
}

impl FixtureSource {
    pub fn base_mint() -> PubkeyStr {
        PubkeyStr::new("BaseMint111111111111111111111111111111111111")
    }

    pub fn quote_mint() -> PubkeyStr {
        PubkeyStr::new("QuoteMint11111111111111111111111111111111111")
    }

    /// A market with bids `[(10,1),(9,2)]`, asks `[(11,1),(12,3)]`, 6/6
    /// decimals, 2 tick decimals, and an empty trade log.
    pub fn default_market(market: &PubkeyStr) -> Self {
        let source = Self::default();
        let bids_addr = PubkeyStr::new(&format!("{}-bids", market));
        let asks_addr = PubkeyStr::new(&format!("{}-asks", market));
        let events_addr = PubkeyStr::new(&format!("{}-events", market));

        let meta = MarketMeta {
            market: market.clone(),
            bids: bids_addr.clone(),
            asks: asks_addr.clone(),
            event_log: events_addr.clone(),
            base_mint: Self::base_mint(),
            quote_mint: Self::quote_mint(),
            base_decimals: 6,
            quote_decimals: 6,
            tick_decimals: 2,
        };
        source.seed_json(market.clone(), &meta);
        source.seed_json(
            bids_addr,
            &vec![order("10", "1"), order("9", "2")],
        );
        source.seed_json(
            asks_addr,
            &vec![order("11", "1"), order("12", "3")],
        );
        source.seed_json(events_addr, &Vec::<Trade>::new());
        source
    }

    pub fn seed_json<T: serde::Serialize>(&self, address: PubkeyStr, value: &T) {
        self.accounts.lock().insert(
            address,
            RawAccount {
                lamports: 0,
                data: serde_json::to_vec(value).unwrap(),
            },
        );
    }

    pub fn seed_lamports(&self, address: &PubkeyStr, lamports: u64) {
        self.accounts
            .lock()
            .entry(address.clone())
            .and_modify(|a| a.lamports = lamports)
            .or_insert(RawAccount {
                lamports,
                data: Vec::new(),
            });
    }

    pub fn seed_open_orders(
        &self,
        market: &PubkeyStr,
        owner: &PubkeyStr,
        base_free: u64,
        base_total: u64,
        quote_free: u64,
        quote_total: u64,
    ) {
        let view = OpenOrdersView {
            base_free,
            base_total,
            quote_free,
            quote_total,
        };
        let address = PubkeyStr::new(&format!("{}-oo-{}", market, owner));
        self.open_orders.lock().insert(
            (market.clone(), owner.clone()),
            (
                address,
                RawAccount {
                    lamports: 0,
                    data: serde_json::to_vec(&view).unwrap(),
                },
            ),
        );
    }

    pub fn seed_token_balance(&self, owner: &PubkeyStr, mint: &PubkeyStr, amount: u64) {
        let info = TokenAccountInfo {
            mint: mint.clone(),
            owner: owner.clone(),
            amount,
        };
        let address = PubkeyStr::new(&format!("{}-token-{}", owner, mint));
        self.token_accounts.lock().insert(
            (owner.clone(), mint.clone()),
            (
                address,
                RawAccount {
                    lamports: 0,
                    data: serde_json::to_vec(&info).unwrap(),
                },
            ),
        );
    }

    /// Make every subsequent fetch fail at the transport layer.
    pub fn fail_transport(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of program-account scans issued so far.
    pub fn program_scans(&self) -> usize {
        self.program_scans.load(Ordering::SeqCst)
    }
}

fn order(price: &str, size: &str) -> RawOrder {
    RawOrder {
        price: price.parse::<Decimal>().unwrap(),
        size: size.parse::<Decimal>().unwrap(),
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    async fn fetch_account(&self, address: &PubkeyStr) -> Result<RawAccount, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("fixture outage".to_string()));
        }
        self.accounts
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::AccountNotFound(address.to_string()))
    }

    async fn fetch_program_accounts(
        &self,
        filter: &AccountFilter,
    ) -> Result<Vec<(PubkeyStr, RawAccount)>, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("fixture outage".to_string()));
        }
        self.program_scans.fetch_add(1, Ordering::SeqCst);

        if filter.program == venue_program() {
            let (Some(market), Some(owner)) = (&filter.market, &filter.owner) else {
                return Ok(Vec::new());
            };
            return Ok(self
                .open_orders
                .lock()
                .get(&(market.clone(), owner.clone()))
                .cloned()
                .into_iter()
                .collect());
        }

        // Token program scan: all of the owner's token accounts, optionally
        // narrowed to one mint.
        let Some(owner) = &filter.owner else {
            return Ok(Vec::new());
        };
        let accounts = self.token_accounts.lock();
        Ok(accounts
            .iter()
            .filter(|((acc_owner, mint), _)| {
                acc_owner == owner && filter.mint.as_ref().is_none_or(|m| m == mint)
            })
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

/// Decoder over the JSON fixtures [`FixtureSource`] seeds.
pub struct JsonDecoder;

fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError::UnexpectedLayout(e.to_string()))
}

impl AccountDecoder for JsonDecoder {
    fn decode_market(&self, data: &[u8]) -> Result<MarketMeta, DecodeError> {
        decode(data)
    }

    fn decode_orderbook_side(&self, data: &[u8]) -> Result<Vec<RawOrder>, DecodeError> {
        decode(data)
    }

    fn decode_open_orders(&self, data: &[u8]) -> Result<OpenOrdersView, DecodeError> {
        decode(data)
    }

    fn decode_token_account(&self, data: &[u8]) -> Result<TokenAccountInfo, DecodeError> {
        decode(data)
    }

    fn decode_trades(&self, data: &[u8]) -> Result<Vec<Trade>, DecodeError> {
        decode(data)
    }
}

/// Engine wired to a [`FixtureSource`] and [`JsonDecoder`], optionally with a
/// wallet session.
pub fn fixture_engine(
    source: Arc<FixtureSource>,
    wallet: Option<Arc<dyn WalletSession>>,
) -> VenueEngine {
    let mut builder = VenueEngine::builder()
        .source(source)
        .decoder(Arc::new(JsonDecoder))
        .program(venue_program());
    if let Some(wallet) = wallet {
        builder = builder.wallet(wallet);
    }
    builder.build().unwrap()
}
