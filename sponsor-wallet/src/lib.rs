//! Sponsored wallet provider.
//!
//! One wallet (the sponsor) pays fees and submits transactions while another
//! identity (the prover) owns the resulting ledger state.
//!
//! ```text
//!  SponsorSession ─┬─ OverrideStore      (which identity proves)
//!                  └─ TransactionPipeline
//!                       └─ WalletProvider ─┬─ sponsor: balance, submit
//!                                          └─ prover:  prove
//! ```

pub mod overrides;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod runtime;
pub mod session;
pub mod sync;

#[cfg(test)]
mod testing;

pub use overrides::{ActiveProver, OverrideStore, ProverOverride};
pub use pipeline::{PipelineReceipt, TransactionPipeline};
pub use provider::WalletProvider;
pub use query::{CounterQuery, CounterReading};
pub use runtime::{LedgerIndexer, SyncProgress, WalletRuntime, WalletSnapshot};
pub use session::{SponsorSession, DEFAULT_TX_TTL};
pub use sync::{wait_for_keys, wait_until, SyncPolicy, DEFAULT_SYNC_TIMEOUT};
