//! End-to-end engine test: scheduler-driven refresh over an in-memory data
//! source, including upstream mutation and outage.

use meridian_view::prelude::*;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemorySource {
    accounts: Mutex<HashMap<PubkeyStr, RawAccount>>,
    down: AtomicBool,
}

impl MemorySource {
    fn seed<T: serde::Serialize>(&self, address: &PubkeyStr, value: &T) {
        self.accounts.lock().insert(
            address.clone(),
            RawAccount {
                lamports: 0,
                data: serde_json::to_vec(value).unwrap(),
            },
        );
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch_account(&self, address: &PubkeyStr) -> Result<RawAccount, TransportError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        self.accounts
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::AccountNotFound(address.to_string()))
    }

    async fn fetch_program_accounts(
        &self,
        _filter: &AccountFilter,
    ) -> Result<Vec<(PubkeyStr, RawAccount)>, TransportError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(Vec::new())
    }
}

struct JsonDecoder;

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

fn market() -> PubkeyStr {
    PubkeyStr::new("9wFFyRfZBsuAha4YcuxcXLKwMxJR43S7fPfQLusDBzvT")
}

fn raw(price: &str, size: &str) -> RawOrder {
    RawOrder {
        price: Decimal::from_str(price).unwrap(),
        size: Decimal::from_str(size).unwrap(),
    }
}

fn seed_market(source: &MemorySource) -> (PubkeyStr, PubkeyStr) {
    let bids_addr = PubkeyStr::new("MktBids1111111111111111111111111111111111111");
    let asks_addr = PubkeyStr::new("MktAsks1111111111111111111111111111111111111");
    let events_addr = PubkeyStr::new("MktEvents111111111111111111111111111111111111");

    source.seed(
        &market(),
        &MarketMeta {
            market: market(),
            bids: bids_addr.clone(),
            asks: asks_addr.clone(),
            event_log: events_addr.clone(),
            base_mint: PubkeyStr::new("BaseMint111111111111111111111111111111111111"),
            quote_mint: PubkeyStr::new("QuoteMint11111111111111111111111111111111111"),
            base_decimals: 6,
            quote_decimals: 6,
            tick_decimals: 2,
        },
    );
    source.seed(&bids_addr, &vec![raw("10", "1"), raw("9", "2")]);
    source.seed(&asks_addr, &vec![raw("11", "1"), raw("12", "3")]);
    source.seed(&events_addr, &Vec::<Trade>::new());
    (bids_addr, asks_addr)
}

fn build_engine(source: Arc<MemorySource>) -> VenueEngine {
    VenueEngine::builder()
        .source(source)
        .decoder(Arc::new(JsonDecoder))
        .program(PubkeyStr::new("MRDNVenue1111111111111111111111111111111111"))
        .build()
        .unwrap()
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a cache notification")
        .expect("listener channel closed");
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn orderbook_refreshes_and_survives_outage() {
    let source = Arc::new(MemorySource::default());
    let (bids_addr, _) = seed_market(&source);
    let engine = build_engine(source.clone());

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (view, _sub) = engine.markets().subscribe_orderbook(&market(), move || {
        let _ = tx.send(());
    });
    assert!(view.value.is_none());

    // First completion arrives without any manual driving.
    recv(&mut rx).await;
    // Re-read through the cache with a freshly-built fingerprint — the
    // lookup is value-based, not identity-based.
    let key = meridian_view::domain::market::resolver::orderbook_key(&market());
    let book = engine.cache().load::<BookDepth>(&key).value.unwrap();
    assert_eq!(book.best_bid(), Some(Decimal::from(10)));
    assert_eq!(book.mid_price(), Some(Decimal::from_str("10.5").unwrap()));

    // Upstream moves; the periodic revalidation picks it up.
    source.seed(&bids_addr, &vec![raw("10.4", "2")]);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        recv(&mut rx).await;
        let book = engine.cache().load::<BookDepth>(&key).value.unwrap();
        if book.best_bid() == Some(Decimal::from_str("10.4").unwrap()) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "refresh never observed the new book"
        );
    }

    // Outage: the slot keeps the stale book and surfaces the error.
    source.down.store(true, Ordering::SeqCst);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        recv(&mut rx).await;
        let slot = engine.cache().load::<BookDepth>(&key);
        if let Some(err) = slot.error {
            assert!(matches!(
                *err,
                EngineError::Transport(TransportError::Timeout)
            ));
            assert!(slot.value.is_some(), "stale value must be retained");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "outage never surfaced on the slot"
        );
    }

    runner.abort();
}

#[tokio::test]
async fn disconnected_wallet_yields_absent_balances() {
    let source = Arc::new(MemorySource::default());
    seed_market(&source);
    let engine = build_engine(source);

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let (tx, _rx) = mpsc::unbounded_channel::<()>();
    let (view, _sub) = engine
        .balances()
        .subscribe_market_balances(&market(), move || {
            let _ = tx.send(());
        });

    // No wallet session: the slot stays empty and is never even scheduled.
    assert!(view.value.is_none());
    tokio::time::sleep(Duration::from_millis(400)).await;
    let slot = engine.balances().load_market_balances(&market());
    assert!(slot.value.is_none());
    assert!(slot.error.is_none());
    assert!(!slot.is_fetching);

    runner.abort();
}

#[tokio::test]
async fn two_consumers_share_one_entry() {
    let source = Arc::new(MemorySource::default());
    seed_market(&source);
    let engine = build_engine(source);

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let (_, _sub_a) = engine.markets().subscribe_orderbook(&market(), move || {
        let _ = tx_a.send(());
    });
    let (_, _sub_b) = engine.markets().subscribe_orderbook(&market(), move || {
        let _ = tx_b.send(());
    });

    // Both listeners observe the same completion of the same entry.
    recv(&mut rx_a).await;
    recv(&mut rx_b).await;

    let key = meridian_view::domain::market::resolver::orderbook_key(&market());
    let a = engine.cache().load::<BookDepth>(&key).value.unwrap();
    let b = engine.cache().load::<BookDepth>(&key).value.unwrap();
    assert!(Arc::ptr_eq(&a, &b), "consumers must share the cached value");

    runner.abort();
}
