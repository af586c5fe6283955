//! sponsor-common
//!
//! Types shared by every crate in the sponsored-transaction workspace:
//!
//! - identity key material (`CoinPublicKey`, `EncryptionPublicKey`)
//! - the three textual address forms and their resolution
//! - the unproven → balanced → proven transaction model
//! - the error taxonomy surfaced to callers

pub mod address;
pub mod error;
pub mod keys;
pub mod tx;

pub use address::{encode_address, resolve_address, AddressFormat, NetworkId};
pub use error::{PipelineError, PipelineStage, SponsorError};
pub use keys::{CoinPublicKey, EncryptionPublicKey, IdentityKeys, KEY_LEN};
pub use tx::{
    now_unix, BalancedTransaction, CoinInfo, ContractAddress, ContractCall, FeePayment, Proof,
    ProvenTransaction, TxId, UnprovenTransaction,
};

/// Rail identifier reported by the HTTP service.
pub const RAIL_ID_SPONSOR: &str = "SPONSORED_WALLET";

/// Default endpoint of the local proof server.
pub const DEFAULT_PROOF_SERVER_URL: &str = "http://127.0.0.1:6300";
