//! Wallet runtime backed by [`LocalChain`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use tokio::sync::watch;
use tracing::debug;

use sponsor_common::{
    BalancedTransaction, CoinInfo, CoinPublicKey, EncryptionPublicKey, FeePayment, IdentityKeys,
    Proof, ProvenTransaction, SponsorError, TxId, UnprovenTransaction,
};
use sponsor_wallet::{SyncProgress, WalletRuntime, WalletSnapshot};

use crate::chain::LocalChain;

const ENCRYPTION_KEY_CONTEXT: &str = "sponsor-devnet 2024 encryption public key";

/// Derive both public keys from a 32-byte wallet seed.
pub fn derive_keys(seed: &[u8; 32]) -> IdentityKeys {
    let signing_key = SigningKey::from_bytes(seed);
    IdentityKeys::new(
        CoinPublicKey(signing_key.verifying_key().to_bytes()),
        EncryptionPublicKey(blake3::derive_key(ENCRYPTION_KEY_CONTEXT, seed)),
    )
}

pub struct LocalWallet {
    label: String,
    signing_key: SigningKey,
    keys: IdentityKeys,
    chain: Arc<LocalChain>,
    fee: u128,
    state: watch::Sender<WalletSnapshot>,
    keys_published: AtomicBool,
    sync_held: AtomicBool,
}

impl LocalWallet {
    /// A wallet whose keys are available and which tracks the chain tip.
    pub fn new(label: impl Into<String>, seed: [u8; 32], chain: Arc<LocalChain>, fee: u128) -> Self {
        let wallet = Self::pending(label, seed, chain, fee);
        wallet.publish_keys();
        wallet
    }

    /// A wallet that has not finished deriving its keys yet.
    pub fn pending(label: impl Into<String>, seed: [u8; 32], chain: Arc<LocalChain>, fee: u128) -> Self {
        let (state, _) = watch::channel(WalletSnapshot::default());
        let wallet = Self {
            label: label.into(),
            signing_key: SigningKey::from_bytes(&seed),
            keys: derive_keys(&seed),
            chain,
            fee,
            state,
            keys_published: AtomicBool::new(false),
            sync_held: AtomicBool::new(false),
        };
        wallet.refresh();
        wallet
    }

    pub fn keys(&self) -> IdentityKeys {
        self.keys
    }

    pub fn coin_public_key(&self) -> CoinPublicKey {
        self.keys.coin_public_key
    }

    pub fn chain(&self) -> &Arc<LocalChain> {
        &self.chain
    }

    pub fn publish_keys(&self) {
        self.keys_published.store(true, Ordering::SeqCst);
        self.refresh();
    }

    /// Stop applying new blocks; the wallet reports itself behind the tip.
    pub fn hold_sync(&self) {
        self.sync_held.store(true, Ordering::SeqCst);
    }

    pub fn release_sync(&self) {
        self.sync_held.store(false, Ordering::SeqCst);
        self.refresh();
    }

    /// Pull balance and tip from the chain and publish the new snapshot.
    pub fn refresh(&self) {
        let tip = self.chain.height();
        let held = self.sync_held.load(Ordering::SeqCst);
        let keys = self
            .keys_published
            .load(Ordering::SeqCst)
            .then_some(self.keys);
        let balance = self.chain.balance_of(&self.keys.coin_public_key);

        self.state.send_if_modified(|snapshot| {
            let applied = if held { snapshot.sync.applied } else { tip };
            let next = WalletSnapshot {
                keys,
                balance: if held { snapshot.balance } else { balance },
                sync: SyncProgress {
                    applied,
                    target: tip,
                },
            };
            if *snapshot == next {
                return false;
            }
            *snapshot = next;
            true
        });
    }

    fn require_keys(&self) -> Result<(), SponsorError> {
        if self.keys_published.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SponsorError::IdentityUnavailable(format!(
                "{}: keys not derived yet",
                self.label
            )))
        }
    }
}

#[async_trait]
impl WalletRuntime for LocalWallet {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> watch::Receiver<WalletSnapshot> {
        self.refresh();
        self.state.subscribe()
    }

    async fn balance_transaction(
        &self,
        tx: UnprovenTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, SponsorError> {
        self.require_keys()?;
        self.refresh();
        let snapshot = self.state.borrow().clone();
        if !snapshot.sync.is_synced() {
            return Err(SponsorError::IdentityUnavailable(format!(
                "{}: wallet syncing ({}/{})",
                self.label, snapshot.sync.applied, snapshot.sync.target
            )));
        }

        let balanced = BalancedTransaction {
            transaction: tx,
            fee: FeePayment {
                payer: self.keys.coin_public_key,
                amount: self.fee,
            },
            new_coins,
        };
        let required = balanced.required_funds();
        if snapshot.balance < required {
            return Err(SponsorError::InsufficientFunds {
                required,
                available: snapshot.balance,
            });
        }

        debug!(wallet = %self.label, fee = self.fee, required, "transaction balanced");
        Ok(balanced)
    }

    async fn prove_transaction(
        &self,
        tx: BalancedTransaction,
    ) -> Result<ProvenTransaction, SponsorError> {
        self.require_keys()?;
        if tx.transaction.caller != self.keys.coin_public_key {
            return Err(SponsorError::ProofFailed(format!(
                "{} cannot prove a call owned by {}",
                self.label, tx.transaction.caller
            )));
        }

        let signature = self.signing_key.sign(&tx.digest());
        debug!(wallet = %self.label, "transaction proven");
        Ok(ProvenTransaction {
            transaction: tx,
            proof: Proof {
                prover: self.keys.coin_public_key,
                signature: hex::encode(signature.to_bytes()),
            },
        })
    }

    async fn submit_transaction(&self, tx: ProvenTransaction) -> Result<TxId, SponsorError> {
        self.require_keys()?;
        if tx.transaction.fee.payer != self.keys.coin_public_key {
            return Err(SponsorError::SubmissionRejected(format!(
                "{} does not pay for this transaction",
                self.label
            )));
        }

        let result = self.chain.apply(&tx);
        self.refresh();
        result
    }
}
