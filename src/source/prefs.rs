//! Preference persistence collaborator.
//!
//! Hosts usually back this with browser local storage or a config file. The
//! engine must work with no store at all, so every typed read declares its
//! default.

use crate::shared::PubkeyStr;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known preference keys.
pub mod keys {
    pub const SELECTED_MARKET: &str = "selected_market";
    pub const TRADE_TAPE_LEN: &str = "trade_tape_len";
    pub const FEE_DISCOUNT_TOKEN: &str = "fee_discount_token";
}

/// Key-value persistence for user preferences.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);
}

/// In-memory store — the engine default, also handy in tests.
#[derive(Debug, Default)]
pub struct InMemoryPrefs {
    map: Mutex<HashMap<String, String>>,
}

impl InMemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map.lock().insert(key.to_string(), value.to_string());
    }
}

/// Typed view over a [`PreferenceStore`] with defaults applied.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Market the user last selected. No default — a fresh profile has none.
    pub fn selected_market(&self) -> Option<PubkeyStr> {
        self.store.get(keys::SELECTED_MARKET).map(PubkeyStr::from)
    }

    pub fn set_selected_market(&self, market: &PubkeyStr) {
        self.store.set(keys::SELECTED_MARKET, market.as_str());
    }

    /// How many recent fills to keep on the tape. Default 64.
    pub fn trade_tape_len(&self) -> usize {
        self.store
            .get(keys::TRADE_TAPE_LEN)
            .and_then(|v| v.parse().ok())
            .unwrap_or(64)
    }

    pub fn set_trade_tape_len(&self, len: usize) {
        self.store.set(keys::TRADE_TAPE_LEN, &len.to_string());
    }

    /// Token account used for fee discounts, if the user picked one.
    pub fn fee_discount_token(&self) -> Option<PubkeyStr> {
        self.store.get(keys::FEE_DISCOUNT_TOKEN).map(PubkeyStr::from)
    }

    pub fn set_fee_discount_token(&self, token: &PubkeyStr) {
        self.store.set(keys::FEE_DISCOUNT_TOKEN, token.as_str());
    }
}
