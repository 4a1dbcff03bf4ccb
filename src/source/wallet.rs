//! Identity collaborator.
//!
//! A disconnected wallet is "no data", never an error: queries gated on an
//! owner resolve to `None` without touching the network.

use crate::shared::PubkeyStr;

/// The host's wallet session.
pub trait WalletSession: Send + Sync {
    fn is_connected(&self) -> bool;

    fn owner(&self) -> Option<PubkeyStr>;
}

/// A session that is never connected — the engine default until the host
/// wires in a real wallet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl WalletSession for Disconnected {
    fn is_connected(&self) -> bool {
        false
    }

    fn owner(&self) -> Option<PubkeyStr> {
        None
    }
}

/// A fixed, always-connected session. Useful for tests and headless tools.
#[derive(Debug, Clone)]
pub struct StaticWallet {
    owner: PubkeyStr,
}

impl StaticWallet {
    pub fn new(owner: PubkeyStr) -> Self {
        Self { owner }
    }
}

impl WalletSession for StaticWallet {
    fn is_connected(&self) -> bool {
        true
    }

    fn owner(&self) -> Option<PubkeyStr> {
        Some(self.owner.clone())
    }
}
