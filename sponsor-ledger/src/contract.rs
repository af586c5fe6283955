//! Counter contract state machine.
//!
//! The contract holds one [`IsolatedLedgerMap`] plus a global `round` counting
//! every successful increment. A call is applied only after the surrounding
//! chain has verified that the proof was produced by `caller`; the contract
//! itself trusts `caller` as the ledger key.

use serde::{Deserialize, Serialize};
use sponsor_common::{CoinPublicKey, ContractAddress, ContractCall, UnprovenTransaction};
use tracing::debug;

use crate::error::LedgerError;
use crate::map::IsolatedLedgerMap;

/// Result of applying one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub caller: CoinPublicKey,
    /// Caller's count after the call.
    pub count: u64,
    /// Contract-wide round after the call.
    pub round: u64,
}

/// Public ledger state of one deployed counter contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterContract {
    address: ContractAddress,
    round: u64,
    counters: IsolatedLedgerMap,
}

impl CounterContract {
    pub fn new(address: ContractAddress) -> Self {
        Self {
            address,
            round: 0,
            counters: IsolatedLedgerMap::new(),
        }
    }

    pub fn address(&self) -> &ContractAddress {
        &self.address
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn counters(&self) -> &IsolatedLedgerMap {
        &self.counters
    }

    /// Apply the call carried by `tx`. Either every field changes or none does.
    pub fn execute(&mut self, tx: &UnprovenTransaction) -> Result<CallOutcome, LedgerError> {
        if tx.contract != self.address {
            return Err(LedgerError::WrongContract(tx.contract.to_hex()));
        }

        match tx.call {
            ContractCall::Increment => self.increment(tx.caller),
        }
    }

    fn increment(&mut self, caller: CoinPublicKey) -> Result<CallOutcome, LedgerError> {
        let round = self
            .round
            .checked_add(1)
            .ok_or(LedgerError::CounterOverflow { key: caller })?;
        let count = self.counters.increment(caller)?;
        self.round = round;

        debug!(contract = %self.address, %caller, count, round, "counter incremented");
        Ok(CallOutcome {
            caller,
            count,
            round,
        })
    }
}
