//! Serialized sponsored-increment requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use sponsor_common::{ContractAddress, PipelineError, PipelineStage, SponsorError};

use crate::overrides::OverrideStore;
use crate::pipeline::{PipelineReceipt, TransactionPipeline};
use crate::provider::WalletProvider;
use crate::query::{CounterQuery, CounterReading};
use crate::runtime::WalletRuntime;

/// Default validity window of built transactions.
pub const DEFAULT_TX_TTL: Duration = Duration::from_secs(300);

/// Runs activate → pipeline → deactivate as one unit.
///
/// Requests are serialized, so one request's override can never leak into
/// another request's proving stage. The override is cleared when the request
/// ends, whether it succeeded, failed, or was dropped mid-flight.
pub struct SponsorSession {
    provider: Arc<WalletProvider>,
    overrides: Arc<OverrideStore>,
    contract: ContractAddress,
    tx_ttl: Duration,
    lock: Mutex<()>,
}

impl SponsorSession {
    pub fn new(
        provider: Arc<WalletProvider>,
        overrides: Arc<OverrideStore>,
        contract: ContractAddress,
        tx_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            overrides,
            contract,
            tx_ttl,
            lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &Arc<WalletProvider> {
        &self.provider
    }

    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    pub fn contract(&self) -> ContractAddress {
        self.contract
    }

    /// Increment the counter of `prover`, or of the sponsor when `None`.
    pub async fn increment(
        &self,
        prover: Option<Arc<dyn WalletRuntime>>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReceipt, PipelineError> {
        let label = prover
            .as_ref()
            .map_or_else(|| self.provider.sponsor().label().to_string(), |p| p.label().to_string());
        let span = info_span!("sponsored_increment", prover = %label, contract = %self.contract);

        async move {
            let _guard = self.lock.lock().await;
            // Dropped before `_guard`, so the store is clear before the next
            // request can take the lock.
            let _reset = OverrideReset(&self.overrides);
            self.increment_locked(prover, cancel).await
        }
        .instrument(span)
        .await
    }

    /// Counter of the sponsor's own identity.
    ///
    /// Waits for any in-flight increment, so a request's temporary override
    /// is never reported as the caller's own identity.
    pub async fn own_counter(&self, query: &CounterQuery) -> Result<CounterReading, SponsorError> {
        let _guard = self.lock.lock().await;
        query.counter_for(None, &self.provider, &self.overrides).await
    }

    async fn increment_locked(
        &self,
        prover: Option<Arc<dyn WalletRuntime>>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReceipt, PipelineError> {
        match prover {
            Some(wallet) => {
                self.overrides
                    .activate(wallet, cancel)
                    .await
                    .map_err(PipelineError::at(PipelineStage::Built))?;
            }
            None => {
                self.overrides.deactivate();
            }
        }

        let pipeline = TransactionPipeline::begin(&self.provider, &self.overrides);
        let tx = pipeline.build_increment(self.contract, self.tx_ttl);
        pipeline.run(tx, Vec::new()).await
    }
}

/// Clears the override store when a request ends, including when the
/// request future is dropped before completing.
struct OverrideReset<'a>(&'a OverrideStore);

impl Drop for OverrideReset<'_> {
    fn drop(&mut self) {
        self.0.deactivate();
    }
}
