//! Wallet-provider facade.
//!
//! Presents one identity to the transaction pipeline while routing each
//! operation to the right underlying wallet:
//!
//! | operation          | routed to                                  |
//! |--------------------|--------------------------------------------|
//! | identity queries   | override prover if active, else sponsor    |
//! | balance            | sponsor, always                            |
//! | prove              | override prover if active, else sponsor    |
//! | submit             | sponsor, always                            |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use sponsor_common::{
    BalancedTransaction, CoinInfo, CoinPublicKey, EncryptionPublicKey, IdentityKeys,
    ProvenTransaction, SponsorError, TxId, UnprovenTransaction,
};

use crate::overrides::{OverrideStore, ProverOverride};
use crate::runtime::WalletRuntime;
use crate::sync::{self, SyncPolicy};

pub struct WalletProvider {
    sponsor: Arc<dyn WalletRuntime>,
    sponsor_keys: IdentityKeys,
}

impl WalletProvider {
    /// Wrap the sponsor wallet once it has published its keys.
    pub async fn connect(
        sponsor: Arc<dyn WalletRuntime>,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self, SponsorError> {
        let sponsor_keys = sync::wait_for_keys(sponsor.as_ref(), policy, cancel).await?;
        debug!(sponsor = sponsor.label(), coin_public_key = %sponsor_keys.coin_public_key, "sponsor wallet connected");
        Ok(Self {
            sponsor,
            sponsor_keys,
        })
    }

    pub fn sponsor(&self) -> &Arc<dyn WalletRuntime> {
        &self.sponsor
    }

    pub fn sponsor_keys(&self) -> IdentityKeys {
        self.sponsor_keys
    }

    /// Keys the pipeline acts as under `selection`.
    pub fn keys_for(&self, selection: &ProverOverride) -> IdentityKeys {
        selection.keys().unwrap_or(self.sponsor_keys)
    }

    pub fn coin_public_key(&self, overrides: &OverrideStore) -> CoinPublicKey {
        self.keys_for(&overrides.current()).coin_public_key
    }

    pub fn encryption_public_key(&self, overrides: &OverrideStore) -> EncryptionPublicKey {
        self.keys_for(&overrides.current()).encryption_public_key
    }

    /// Attach the sponsor's fee coverage. The override is never consulted.
    pub async fn balance(
        &self,
        tx: UnprovenTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, SponsorError> {
        debug!(sponsor = self.sponsor.label(), "balancing transaction");
        self.sponsor.balance_transaction(tx, new_coins).await
    }

    /// Prove with the identity chosen by `selection`.
    pub async fn prove(
        &self,
        tx: BalancedTransaction,
        selection: &ProverOverride,
    ) -> Result<ProvenTransaction, SponsorError> {
        let wallet = match selection {
            ProverOverride::Override(active) => active.wallet(),
            ProverOverride::NoOverride => &self.sponsor,
        };
        debug!(prover = wallet.label(), "proving transaction");
        wallet.prove_transaction(tx).await
    }

    /// Submit through the sponsor. The override is never consulted.
    pub async fn submit(&self, tx: ProvenTransaction) -> Result<TxId, SponsorError> {
        debug!(sponsor = self.sponsor.label(), "submitting transaction");
        self.sponsor.submit_transaction(tx).await
    }
}
