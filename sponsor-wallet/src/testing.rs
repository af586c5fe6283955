//! In-memory wallet used by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use tokio::sync::{watch, Notify, Semaphore};

use sponsor_common::{
    BalancedTransaction, CoinInfo, CoinPublicKey, ContractAddress, EncryptionPublicKey,
    FeePayment, IdentityKeys, Proof, ProvenTransaction, SponsorError, TxId, UnprovenTransaction,
};

use crate::runtime::{LedgerIndexer, SyncProgress, WalletRuntime, WalletSnapshot};

pub const TEST_FEE: u128 = 7;

#[derive(Clone)]
pub struct MockWallet {
    inner: Arc<Inner>,
}

struct Inner {
    label: String,
    signing_key: SigningKey,
    state: watch::Sender<WalletSnapshot>,
    submitted: Mutex<Vec<ProvenTransaction>>,
    fail_balance: Mutex<Option<SponsorError>>,
    forge_prover: Mutex<Option<CoinPublicKey>>,
    prove_gate: Mutex<Option<Arc<Semaphore>>>,
    proving: Notify,
}

impl MockWallet {
    pub fn ready(label: &str, seed: u8, balance: u128) -> Self {
        let wallet = Self::without_keys(label, seed);
        wallet.publish_keys();
        wallet.inner.state.send_modify(|s| s.balance = balance);
        wallet
    }

    pub fn without_keys(label: &str, seed: u8) -> Self {
        let (state, _) = watch::channel(WalletSnapshot {
            keys: None,
            balance: 0,
            sync: SyncProgress::synced_at(1),
        });
        Self {
            inner: Arc::new(Inner {
                label: label.to_string(),
                signing_key: SigningKey::from_bytes(&[seed; 32]),
                state,
                submitted: Mutex::new(Vec::new()),
                fail_balance: Mutex::new(None),
                forge_prover: Mutex::new(None),
                prove_gate: Mutex::new(None),
                proving: Notify::new(),
            }),
        }
    }

    pub fn keys(&self) -> IdentityKeys {
        let coin = CoinPublicKey(self.inner.signing_key.verifying_key().to_bytes());
        let mut enc = coin.0;
        enc.reverse();
        IdentityKeys::new(coin, EncryptionPublicKey(enc))
    }

    pub fn publish_keys(&self) {
        let keys = self.keys();
        self.inner.state.send_modify(|s| s.keys = Some(keys));
    }

    pub fn set_sync(&self, sync: SyncProgress) {
        self.inner.state.send_modify(|s| s.sync = sync);
    }

    pub fn fail_next_balance(&self, err: SponsorError) {
        *self.inner.fail_balance.lock().unwrap() = Some(err);
    }

    /// Make proofs claim a different prover key.
    pub fn forge_prover(&self, key: CoinPublicKey) {
        *self.inner.forge_prover.lock().unwrap() = Some(key);
    }

    /// Park every proof until a permit is added to the returned semaphore.
    pub fn hold_proving(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.prove_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a proof has started.
    pub async fn proving_started(&self) {
        self.inner.proving.notified().await;
    }

    pub fn submitted(&self) -> Vec<ProvenTransaction> {
        self.inner.submitted.lock().unwrap().clone()
    }

    pub fn balance(&self) -> u128 {
        self.inner.state.borrow().balance
    }
}

#[async_trait]
impl WalletRuntime for MockWallet {
    fn label(&self) -> &str {
        &self.inner.label
    }

    fn state(&self) -> watch::Receiver<WalletSnapshot> {
        self.inner.state.subscribe()
    }

    async fn balance_transaction(
        &self,
        tx: UnprovenTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, SponsorError> {
        if let Some(err) = self.inner.fail_balance.lock().unwrap().take() {
            return Err(err);
        }
        Ok(BalancedTransaction {
            transaction: tx,
            fee: FeePayment {
                payer: self.keys().coin_public_key,
                amount: TEST_FEE,
            },
            new_coins,
        })
    }

    async fn prove_transaction(
        &self,
        tx: BalancedTransaction,
    ) -> Result<ProvenTransaction, SponsorError> {
        self.inner.proving.notify_one();
        let gate = self.inner.prove_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| SponsorError::ProofFailed("prove gate closed".into()))?;
        }

        let signature = self.inner.signing_key.sign(&tx.digest());
        let prover = self
            .inner
            .forge_prover
            .lock()
            .unwrap()
            .unwrap_or(self.keys().coin_public_key);
        Ok(ProvenTransaction {
            transaction: tx,
            proof: Proof {
                prover,
                signature: hex::encode(signature.to_bytes()),
            },
        })
    }

    async fn submit_transaction(&self, tx: ProvenTransaction) -> Result<TxId, SponsorError> {
        tx.verify()?;
        let id = tx.id();
        let fee = tx.transaction.required_funds();
        self.inner
            .state
            .send_modify(|s| s.balance = s.balance.saturating_sub(fee));
        self.inner.submitted.lock().unwrap().push(tx);
        Ok(id)
    }
}

/// Indexer over a fixed set of counters.
pub struct FixedIndexer {
    counts: HashMap<CoinPublicKey, u64>,
}

impl FixedIndexer {
    pub fn with_counts(counts: &[(CoinPublicKey, u64)]) -> Self {
        Self {
            counts: counts.iter().copied().collect(),
        }
    }
}

#[async_trait]
impl LedgerIndexer for FixedIndexer {
    async fn counter_of(
        &self,
        _contract: &ContractAddress,
        key: &CoinPublicKey,
    ) -> Result<Option<u64>, SponsorError> {
        Ok(self.counts.get(key).copied())
    }

    async fn contract_round(&self, _contract: &ContractAddress) -> Result<u64, SponsorError> {
        Ok(self.counts.values().sum())
    }
}
