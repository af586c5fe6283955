//! Sponsored transaction pipeline: Built → Balanced → Proven → Submitted.
//!
//! The prover selection is snapshotted when the pipeline begins and used for
//! the proving stage regardless of later changes to the store. Any failure
//! aborts the run and reports the stage that failed; nothing is submitted
//! after a failure.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use sponsor_common::{
    CoinInfo, CoinPublicKey, ContractAddress, IdentityKeys, PipelineError, PipelineStage,
    SponsorError, TxId, UnprovenTransaction,
};

use crate::overrides::{OverrideStore, ProverOverride};
use crate::provider::WalletProvider;

/// Outcome of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReceipt {
    pub tx_id: TxId,
    /// Identity whose ledger state was changed.
    pub prover: CoinPublicKey,
    /// Identity that paid the fee.
    pub payer: CoinPublicKey,
    pub fee: u128,
    pub stage: PipelineStage,
}

pub struct TransactionPipeline<'a> {
    provider: &'a WalletProvider,
    selection: Arc<ProverOverride>,
    stage: PipelineStage,
}

impl<'a> TransactionPipeline<'a> {
    /// Start a run using the store's current selection.
    pub fn begin(provider: &'a WalletProvider, overrides: &OverrideStore) -> Self {
        Self::with_selection(provider, overrides.current())
    }

    pub fn with_selection(provider: &'a WalletProvider, selection: Arc<ProverOverride>) -> Self {
        Self {
            provider,
            selection,
            stage: PipelineStage::Built,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Keys that will prove this run.
    pub fn prover_keys(&self) -> IdentityKeys {
        self.provider.keys_for(&self.selection)
    }

    /// Build an increment call owned by the run's prover.
    pub fn build_increment(&self, contract: ContractAddress, ttl: Duration) -> UnprovenTransaction {
        UnprovenTransaction::increment(contract, self.prover_keys().coin_public_key, ttl)
    }

    pub async fn run(
        mut self,
        tx: UnprovenTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<PipelineReceipt, PipelineError> {
        let expected_prover = self.prover_keys().coin_public_key;
        debug!(stage = %self.stage, contract = %tx.contract, caller = %tx.caller, "transaction built");

        let balanced = self
            .provider
            .balance(tx, new_coins)
            .await
            .map_err(PipelineError::at(PipelineStage::Balanced))?;
        self.advance(PipelineStage::Balanced);

        let payer = balanced.fee.payer;
        let fee = balanced.fee.amount;

        let proven = self
            .provider
            .prove(balanced, &self.selection)
            .await
            .map_err(PipelineError::at(PipelineStage::Proven))?;

        if proven.proof.prover != expected_prover {
            error!(
                expected = %expected_prover,
                actual = %proven.proof.prover,
                "proof produced by unexpected identity"
            );
            return Err(PipelineError::new(
                PipelineStage::Proven,
                SponsorError::OverrideStateCorrupt(format!(
                    "expected prover {expected_prover}, proof names {}",
                    proven.proof.prover
                )),
            ));
        }
        self.advance(PipelineStage::Proven);

        let tx_id = self
            .provider
            .submit(proven)
            .await
            .map_err(PipelineError::at(PipelineStage::Submitted))?;
        self.advance(PipelineStage::Submitted);

        info!(%tx_id, prover = %expected_prover, %payer, fee, "sponsored transaction submitted");
        Ok(PipelineReceipt {
            tx_id,
            prover: expected_prover,
            payer,
            fee,
            stage: self.stage,
        })
    }

    fn advance(&mut self, stage: PipelineStage) {
        self.stage = stage;
        debug!(stage = %stage, "pipeline advanced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncPolicy;
    use crate::testing::{MockWallet, TEST_FEE};
    use tokio_util::sync::CancellationToken;

    const TTL: Duration = Duration::from_secs(30);

    async fn provider_for(sponsor: &MockWallet) -> WalletProvider {
        WalletProvider::connect(
            Arc::new(sponsor.clone()),
            SyncPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn sponsor_only_run_reaches_submitted() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 100);
        let provider = provider_for(&sponsor).await;
        let store = OverrideStore::default();

        let pipeline = TransactionPipeline::begin(&provider, &store);
        let tx = pipeline.build_increment(ContractAddress([9; 32]), TTL);
        let receipt = pipeline.run(tx, Vec::new()).await.unwrap();

        assert_eq!(receipt.stage, PipelineStage::Submitted);
        assert_eq!(receipt.prover, sponsor.keys().coin_public_key);
        assert_eq!(receipt.payer, sponsor.keys().coin_public_key);
        assert_eq!(receipt.fee, TEST_FEE);
    }

    #[tokio::test]
    async fn overridden_run_is_proven_by_prover_and_paid_by_sponsor() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 100);
        let prover = MockWallet::ready("b", 0xb, 0);
        let provider = provider_for(&sponsor).await;
        let store = OverrideStore::default();
        store
            .activate(Arc::new(prover.clone()), &CancellationToken::new())
            .await
            .unwrap();

        let pipeline = TransactionPipeline::begin(&provider, &store);
        let tx = pipeline.build_increment(ContractAddress([9; 32]), TTL);
        assert_eq!(tx.caller, prover.keys().coin_public_key);
        let receipt = pipeline.run(tx, Vec::new()).await.unwrap();

        assert_eq!(receipt.prover, prover.keys().coin_public_key);
        assert_eq!(receipt.payer, sponsor.keys().coin_public_key);
        assert_eq!(sponsor.submitted().len(), 1);
    }

    #[tokio::test]
    async fn balance_failure_aborts_before_submission() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 100);
        sponsor.fail_next_balance(SponsorError::InsufficientFunds {
            required: 7,
            available: 0,
        });
        let provider = provider_for(&sponsor).await;
        let store = OverrideStore::default();

        let pipeline = TransactionPipeline::begin(&provider, &store);
        let tx = pipeline.build_increment(ContractAddress([9; 32]), TTL);
        let err = pipeline.run(tx, Vec::new()).await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Balanced);
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert!(sponsor.submitted().is_empty());
        assert_eq!(sponsor.balance(), 100);
    }

    #[tokio::test]
    async fn mismatched_prover_key_is_corruption() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 100);
        let prover = MockWallet::ready("b", 0xb, 0);
        prover.forge_prover(CoinPublicKey([0xee; 32]));
        let provider = provider_for(&sponsor).await;
        let store = OverrideStore::default();
        store
            .activate(Arc::new(prover.clone()), &CancellationToken::new())
            .await
            .unwrap();

        let pipeline = TransactionPipeline::begin(&provider, &store);
        let tx = pipeline.build_increment(ContractAddress([9; 32]), TTL);
        let err = pipeline.run(tx, Vec::new()).await.unwrap_err();

        assert_eq!(err.stage, PipelineStage::Proven);
        assert!(matches!(err.source, SponsorError::OverrideStateCorrupt(_)));
        assert!(sponsor.submitted().is_empty());
    }

    #[tokio::test]
    async fn selection_is_fixed_when_run_begins() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 100);
        let prover = MockWallet::ready("b", 0xb, 0);
        let provider = provider_for(&sponsor).await;
        let store = OverrideStore::default();
        store
            .activate(Arc::new(prover.clone()), &CancellationToken::new())
            .await
            .unwrap();

        let pipeline = TransactionPipeline::begin(&provider, &store);
        store.deactivate();
        let tx = pipeline.build_increment(ContractAddress([9; 32]), TTL);
        let receipt = pipeline.run(tx, Vec::new()).await.unwrap();
        assert_eq!(receipt.prover, prover.keys().coin_public_key);
    }
}
