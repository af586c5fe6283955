//! Collaborator boundaries.
//!
//! The wallet runtime (key derivation, chain sync, balance tracking, proving
//! and submission) and the chain indexer live outside this crate. Sponsor and
//! prover identities are both plain [`WalletRuntime`] values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use sponsor_common::{
    BalancedTransaction, CoinInfo, CoinPublicKey, ContractAddress, IdentityKeys,
    ProvenTransaction, SponsorError, TxId, UnprovenTransaction,
};

/// Chain sync position of a wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Highest block the wallet has applied.
    pub applied: u64,
    /// Chain tip the wallet knows about.
    pub target: u64,
}

impl SyncProgress {
    pub fn synced_at(height: u64) -> Self {
        Self {
            applied: height,
            target: height,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.applied >= self.target
    }
}

/// Observable state of a wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// `None` until key material has been derived.
    pub keys: Option<IdentityKeys>,
    pub balance: u128,
    pub sync: SyncProgress,
}

/// The transaction-provider contract every identity satisfies.
#[async_trait]
pub trait WalletRuntime: Send + Sync {
    /// Human-readable name used in logs.
    fn label(&self) -> &str;

    /// Subscribe to the wallet's state.
    fn state(&self) -> watch::Receiver<WalletSnapshot>;

    /// Current state without waiting.
    fn current_state(&self) -> WalletSnapshot {
        self.state().borrow().clone()
    }

    /// Cover fees and `new_coins` for an unbalanced transaction.
    async fn balance_transaction(
        &self,
        tx: UnprovenTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, SponsorError>;

    /// Produce the proof authorizing `tx` on behalf of this identity.
    async fn prove_transaction(
        &self,
        tx: BalancedTransaction,
    ) -> Result<ProvenTransaction, SponsorError>;

    /// Send a proven transaction to the chain.
    async fn submit_transaction(&self, tx: ProvenTransaction) -> Result<TxId, SponsorError>;
}

/// Read access to deployed counter contracts.
#[async_trait]
pub trait LedgerIndexer: Send + Sync {
    /// Count stored for `key`, `None` if the key has never incremented.
    async fn counter_of(
        &self,
        contract: &ContractAddress,
        key: &CoinPublicKey,
    ) -> Result<Option<u64>, SponsorError>;

    /// Total successful increments on `contract`.
    async fn contract_round(&self, contract: &ContractAddress) -> Result<u64, SponsorError>;
}
