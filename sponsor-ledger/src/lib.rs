//! Contract-side state for sponsored counters.
//!
//! # State Model
//!
//! ```text
//! CounterContract = {
//!     address:  ContractAddress
//!     round:    u64                              - increments across all identities
//!     counters: Map<CoinPublicKey, Counter>      - one entry per identity that ever incremented
//! }
//! ```
//!
//! # Transitions
//!
//! `increment(caller)` inserts a zero counter for `caller` if absent and adds
//! one to it. No other identity's entry is read or written.

pub mod contract;
pub mod error;
pub mod map;

pub use contract::{CallOutcome, CounterContract};
pub use error::LedgerError;
pub use map::{Counter, IsolatedLedgerMap};
