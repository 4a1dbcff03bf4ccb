//! Collaborator boundaries: transport, account decoding, identity,
//! preference persistence.
//!
//! The engine core never talks to the network or interprets raw account
//! bytes itself — it goes through these traits, so hosts wire in an RPC
//! transport and venue-specific decoders, and tests wire in fixtures.

pub mod decode;
pub mod prefs;
pub mod wallet;

use crate::error::TransportError;
use crate::shared::PubkeyStr;

use async_trait::async_trait;

/// A raw on-chain account as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    /// Native ledger balance, in the chain's smallest unit. This is where
    /// the native asset's wallet balance comes from — it is not token data.
    pub lamports: u64,
    /// Opaque account data; interpreting it is [`decode::AccountDecoder`]'s
    /// job.
    pub data: Vec<u8>,
}

/// Filter for program-account scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AccountFilter {
    pub program: PubkeyStr,
    pub market: Option<PubkeyStr>,
    pub owner: Option<PubkeyStr>,
    pub mint: Option<PubkeyStr>,
}

impl AccountFilter {
    pub fn program(program: PubkeyStr) -> Self {
        Self {
            program,
            ..Self::default()
        }
    }

    pub fn market(mut self, market: PubkeyStr) -> Self {
        self.market = Some(market);
        self
    }

    pub fn owner(mut self, owner: PubkeyStr) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn mint(mut self, mint: PubkeyStr) -> Self {
        self.mint = Some(mint);
        self
    }
}

/// Read-only transport to the chain.
///
/// Every failure is retryable by schedule: the cache's refresh interval owns
/// the cadence, and nothing above this boundary retries in a loop. A call
/// that never resolves stalls only its own cache key.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_account(&self, address: &PubkeyStr) -> Result<RawAccount, TransportError>;

    async fn fetch_program_accounts(
        &self,
        filter: &AccountFilter,
    ) -> Result<Vec<(PubkeyStr, RawAccount)>, TransportError>;
}
