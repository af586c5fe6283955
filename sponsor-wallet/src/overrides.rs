//! Identity override store.
//!
//! Holds at most one prover identity that replaces the sponsor's keys for
//! identity queries and proving. Balancing and submission never consult it.
//!
//! The selection is published as a single `Arc` swap, so a reader sees either
//! the previous selection or the new one, never a mix of keys and prover.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;
use tracing::info;

use sponsor_common::{IdentityKeys, SponsorError};

use crate::runtime::WalletRuntime;
use crate::sync::{self, SyncPolicy};

/// Identity that proves transactions while an override is active.
#[derive(Clone)]
pub struct ActiveProver {
    keys: IdentityKeys,
    wallet: Arc<dyn WalletRuntime>,
}

impl ActiveProver {
    pub fn keys(&self) -> IdentityKeys {
        self.keys
    }

    pub fn wallet(&self) -> &Arc<dyn WalletRuntime> {
        &self.wallet
    }
}

impl fmt::Debug for ActiveProver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveProver")
            .field("label", &self.wallet.label())
            .field("keys", &self.keys)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub enum ProverOverride {
    #[default]
    NoOverride,
    Override(ActiveProver),
}

impl ProverOverride {
    pub fn is_active(&self) -> bool {
        matches!(self, ProverOverride::Override(_))
    }

    pub fn prover(&self) -> Option<&ActiveProver> {
        match self {
            ProverOverride::NoOverride => None,
            ProverOverride::Override(active) => Some(active),
        }
    }

    pub fn keys(&self) -> Option<IdentityKeys> {
        self.prover().map(ActiveProver::keys)
    }
}

pub struct OverrideStore {
    current: RwLock<Arc<ProverOverride>>,
    policy: SyncPolicy,
}

impl Default for OverrideStore {
    fn default() -> Self {
        Self::new(SyncPolicy::default())
    }
}

impl OverrideStore {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(ProverOverride::NoOverride)),
            policy,
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Snapshot of the current selection.
    pub fn current(&self) -> Arc<ProverOverride> {
        Arc::clone(&self.read())
    }

    /// Install `wallet` as the prover identity.
    ///
    /// Waits (bounded by the store's policy) until the wallet has published
    /// key material. On failure the previous selection is left untouched.
    /// Activating the identity that is already active is a no-op.
    pub async fn activate(
        &self,
        wallet: Arc<dyn WalletRuntime>,
        cancel: &CancellationToken,
    ) -> Result<IdentityKeys, SponsorError> {
        let keys = sync::wait_for_keys(wallet.as_ref(), self.policy, cancel).await?;

        let mut slot = self.write();
        if slot.keys() == Some(keys) {
            return Ok(keys);
        }
        *slot = Arc::new(ProverOverride::Override(ActiveProver {
            keys,
            wallet: Arc::clone(&wallet),
        }));
        drop(slot);

        info!(prover = wallet.label(), coin_public_key = %keys.coin_public_key, "prover override activated");
        Ok(keys)
    }

    /// Clear the override. Returns the selection that was replaced.
    pub fn deactivate(&self) -> Arc<ProverOverride> {
        let previous = std::mem::replace(
            &mut *self.write(),
            Arc::new(ProverOverride::NoOverride),
        );
        if let Some(active) = previous.prover() {
            info!(prover = active.wallet.label(), "prover override cleared");
        }
        previous
    }

    // A poisoned lock still holds a whole Arc.
    fn read(&self) -> RwLockReadGuard<'_, Arc<ProverOverride>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<ProverOverride>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWallet;
    use proptest::prelude::*;
    use std::time::Duration;

    fn arc(wallet: &MockWallet) -> Arc<dyn WalletRuntime> {
        Arc::new(wallet.clone())
    }

    #[tokio::test]
    async fn activate_then_deactivate() {
        let store = OverrideStore::default();
        let prover = MockWallet::ready("b", 0xb, 0);
        let cancel = CancellationToken::new();

        assert!(!store.current().is_active());
        let keys = store.activate(arc(&prover), &cancel).await.unwrap();
        assert_eq!(keys, prover.keys());
        assert_eq!(store.current().keys(), Some(prover.keys()));

        let previous = store.deactivate();
        assert!(previous.is_active());
        assert!(!store.current().is_active());
        // Deactivating twice is harmless.
        assert!(!store.deactivate().is_active());
    }

    #[tokio::test]
    async fn activating_same_identity_twice_is_idempotent() {
        let store = OverrideStore::default();
        let prover = MockWallet::ready("b", 0xb, 0);
        let cancel = CancellationToken::new();

        store.activate(arc(&prover), &cancel).await.unwrap();
        let first = store.current();
        store.activate(arc(&prover), &cancel).await.unwrap();
        assert!(Arc::ptr_eq(&first, &store.current()));
    }

    #[tokio::test]
    async fn activating_new_identity_replaces_previous() {
        let store = OverrideStore::default();
        let b = MockWallet::ready("b", 0xb, 0);
        let c = MockWallet::ready("c", 0xc, 0);
        let cancel = CancellationToken::new();

        store.activate(arc(&b), &cancel).await.unwrap();
        store.activate(arc(&c), &cancel).await.unwrap();
        assert_eq!(store.current().keys(), Some(c.keys()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_activation_keeps_previous_selection() {
        let store = OverrideStore::new(SyncPolicy::with_timeout(Duration::from_secs(2)));
        let b = MockWallet::ready("b", 0xb, 0);
        let unsynced = MockWallet::without_keys("late", 0xd);
        let cancel = CancellationToken::new();

        store.activate(arc(&b), &cancel).await.unwrap();
        let err = store.activate(arc(&unsynced), &cancel).await.unwrap_err();
        assert!(matches!(err, SponsorError::SyncTimeout(_)));
        assert_eq!(store.current().keys(), Some(b.keys()));
    }

    #[tokio::test]
    async fn cancelled_activation_leaves_store_empty() {
        let store = OverrideStore::default();
        let unsynced = MockWallet::without_keys("late", 0xd);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store.activate(arc(&unsynced), &cancel).await.unwrap_err();
        assert_eq!(err, SponsorError::Cancelled);
        assert!(!store.current().is_active());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // Readers racing writers only ever see a selection whose keys belong
        // to one of the known identities, and whose prover wallet agrees.
        #[test]
        fn concurrent_readers_never_see_partial_override(ops in prop::collection::vec(0u8..3, 1..40)) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_time()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let store = Arc::new(OverrideStore::default());
                let wallets = [MockWallet::ready("b", 0xb, 0), MockWallet::ready("c", 0xc, 0)];
                let known = [wallets[0].keys(), wallets[1].keys()];
                let stop = CancellationToken::new();

                let reader = {
                    let store = Arc::clone(&store);
                    let stop = stop.clone();
                    tokio::spawn(async move {
                        while !stop.is_cancelled() {
                            if let Some(active) = store.current().prover() {
                                assert!(known.contains(&active.keys()));
                                let published = active.wallet().current_state().keys;
                                assert_eq!(published, Some(active.keys()));
                            }
                            tokio::task::yield_now().await;
                        }
                    })
                };

                let cancel = CancellationToken::new();
                for op in ops {
                    match op {
                        0 => { store.deactivate(); }
                        n => { store.activate(arc(&wallets[n as usize - 1]), &cancel).await.unwrap(); }
                    }
                    tokio::task::yield_now().await;
                }
                stop.cancel();
                reader.await.unwrap();
            });
        }
    }
}
