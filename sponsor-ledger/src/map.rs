//! Identity-keyed counter map.
//!
//! Each coin public key owns exactly one counter. A key is present iff at least
//! one increment has succeeded for it, and an increment under key K touches no
//! entry other than K's.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sponsor_common::CoinPublicKey;

use crate::error::LedgerError;

/// Count held for one identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter(u64);

impl Counter {
    pub fn value(&self) -> u64 {
        self.0
    }

    fn incremented(self) -> Option<Self> {
        self.0.checked_add(1).map(Counter)
    }
}

/// Mapping from identity key to its counter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IsolatedLedgerMap {
    entries: HashMap<CoinPublicKey, Counter>,
}

impl IsolatedLedgerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-default, then add one to `key`'s counter. Returns the new count.
    ///
    /// On overflow nothing is modified.
    pub fn increment(&mut self, key: CoinPublicKey) -> Result<u64, LedgerError> {
        let current = self.entries.get(&key).copied().unwrap_or_default();
        let next = current
            .incremented()
            .ok_or(LedgerError::CounterOverflow { key })?;
        self.entries.insert(key, next);
        Ok(next.value())
    }

    pub fn member(&self, key: &CoinPublicKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn lookup(&self, key: &CoinPublicKey) -> Option<u64> {
        self.entries.get(key).map(Counter::value)
    }

    /// Count for `key`, 0 when it has never been incremented.
    pub fn count_of(&self, key: &CoinPublicKey) -> u64 {
        self.lookup(key).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CoinPublicKey, u64)> {
        self.entries.iter().map(|(k, c)| (k, c.value()))
    }

    #[cfg(test)]
    pub(crate) fn set_raw(&mut self, key: CoinPublicKey, value: u64) {
        self.entries.insert(key, Counter(value));
    }
}
