//! Error types for sponsored transactions.
//!
//! Every failure surfaced by the pipeline, the query layer or the HTTP rail is
//! one of the [`SponsorError`] kinds. Pipeline failures are additionally tagged
//! with the stage at which they occurred.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregated error type for sponsored transactions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SponsorError {
    /// Key material not yet derivable, or the wallet has not finished syncing.
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The sponsor cannot cover the fee and new coins of a transaction.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u128 },

    /// Remote prover error or malformed witness.
    #[error("proof failed: {0}")]
    ProofFailed(String),

    /// Chain-level rejection (replayed nonce, expired tx, rule violation).
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// Address string matched none of the accepted encodings.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// Internal invariant violation in the override store.
    #[error("override state corrupt: {0}")]
    OverrideStateCorrupt(String),

    /// A bounded wallet wait ran out of time.
    #[error("timed out after {0:?} waiting for wallet")]
    SyncTimeout(Duration),

    /// A wallet wait was cancelled by the caller.
    #[error("wait cancelled")]
    Cancelled,

    /// The target contract is not deployed on the chain.
    #[error("contract not found: {0}")]
    ContractNotFound(String),
}

impl SponsorError {
    /// Get a machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            SponsorError::IdentityUnavailable(_) => "IDENTITY_UNAVAILABLE",
            SponsorError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            SponsorError::ProofFailed(_) => "PROOF_FAILED",
            SponsorError::SubmissionRejected(_) => "SUBMISSION_REJECTED",
            SponsorError::MalformedAddress(_) => "MALFORMED_ADDRESS",
            SponsorError::OverrideStateCorrupt(_) => "OVERRIDE_STATE_CORRUPT",
            SponsorError::SyncTimeout(_) => "SYNC_TIMEOUT",
            SponsorError::Cancelled => "CANCELLED",
            SponsorError::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
        }
    }

    /// Whether the caller may reasonably retry the whole request.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SponsorError::IdentityUnavailable(_)
                | SponsorError::SyncTimeout(_)
                | SponsorError::ProofFailed(_)
        )
    }

    /// Get HTTP status code suggestion.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            SponsorError::MalformedAddress(_) => 400,
            SponsorError::InsufficientFunds { .. } => 402,
            SponsorError::ContractNotFound(_) => 404,
            SponsorError::SubmissionRejected(_) => 422,
            SponsorError::Cancelled => 499,
            SponsorError::ProofFailed(_) => 502,
            SponsorError::IdentityUnavailable(_) => 503,
            SponsorError::SyncTimeout(_) => 504,
            SponsorError::OverrideStateCorrupt(_) => 500,
        }
    }
}

/// Stages of the transaction pipeline, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Built,
    Balanced,
    Proven,
    Submitted,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Built => "built",
            PipelineStage::Balanced => "balanced",
            PipelineStage::Proven => "proven",
            PipelineStage::Submitted => "submitted",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure: the stage that could not be reached and why.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: SponsorError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: SponsorError) -> Self {
        Self { stage, source }
    }

    /// Returns a closure tagging a [`SponsorError`] with `stage`.
    pub fn at(stage: PipelineStage) -> impl Fn(SponsorError) -> PipelineError {
        move |source| PipelineError::new(stage, source)
    }

    pub fn error_code(&self) -> &'static str {
        self.source.error_code()
    }
}
