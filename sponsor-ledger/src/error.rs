//! Ledger errors.

use sponsor_common::{CoinPublicKey, SponsorError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("counter for {key} would overflow")]
    CounterOverflow { key: CoinPublicKey },

    #[error("call targets contract {0}, this is a different contract")]
    WrongContract(String),
}

impl From<LedgerError> for SponsorError {
    fn from(err: LedgerError) -> Self {
        SponsorError::SubmissionRejected(err.to_string())
    }
}
