//! Transaction model for the three-stage pipeline.
//!
//! ```text
//! UnprovenTransaction --balance(sponsor)--> BalancedTransaction
//!                     --prove(prover)-----> ProvenTransaction
//!                     --submit(sponsor)---> TxId
//! ```
//!
//! The proof is an ed25519 signature by the caller's coin key over the
//! balanced transaction's digest, so ownership of the resulting state change
//! is tied to whoever produced the proof.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::SponsorError;
use crate::keys::{serde_hex32, CoinPublicKey};

const TX_DOMAIN: &[u8] = b"sponsor.tx.v1";
const CONTRACT_DOMAIN: &[u8] = b"sponsor.contract.v1";

/// Current unix time in seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Address of a deployed counter contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ContractAddress(#[serde(with = "serde_hex32")] pub [u8; 32]);

impl ContractAddress {
    /// Derive the address a deployment by `deployer` with `nonce` lands at.
    pub fn derive(deployer: &CoinPublicKey, nonce: &[u8; 32]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(CONTRACT_DOMAIN);
        hasher.update(deployer.as_bytes());
        hasher.update(nonce);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Circuit invoked on the counter contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum ContractCall {
    /// Insert-default then add one to the caller's counter.
    Increment,
}

impl ContractCall {
    fn tag(&self) -> u8 {
        match self {
            ContractCall::Increment => 1,
        }
    }
}

/// A contract call that nobody has paid for or proven yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprovenTransaction {
    pub contract: ContractAddress,
    pub call: ContractCall,
    /// Coin key that will own the resulting state change.
    pub caller: CoinPublicKey,
    #[serde(with = "serde_hex32")]
    pub nonce: [u8; 32],
    /// Unix timestamp after which the chain rejects the transaction.
    pub expires_at: u64,
}

impl UnprovenTransaction {
    /// Build an increment call with a fresh random nonce.
    pub fn increment(contract: ContractAddress, caller: CoinPublicKey, ttl: Duration) -> Self {
        Self {
            contract,
            call: ContractCall::Increment,
            caller,
            nonce: rand::random(),
            expires_at: now_unix().saturating_add(ttl.as_secs()),
        }
    }

    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.update(&self.contract.0);
        hasher.update(&[self.call.tag()]);
        hasher.update(self.caller.as_bytes());
        hasher.update(&self.nonce);
        hasher.update(&self.expires_at.to_le_bytes());
    }
}

/// A coin created by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    pub owner: CoinPublicKey,
    pub value: u128,
}

/// Fee coverage attached by the balancing identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePayment {
    pub payer: CoinPublicKey,
    pub amount: u128,
}

/// Transaction with fee coverage, ready to be proven.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancedTransaction {
    pub transaction: UnprovenTransaction,
    pub fee: FeePayment,
    #[serde(default)]
    pub new_coins: Vec<CoinInfo>,
}

impl BalancedTransaction {
    /// Total the payer must hold: fee plus the value of every new coin.
    pub fn required_funds(&self) -> u128 {
        self.new_coins
            .iter()
            .fold(self.fee.amount, |acc, coin| acc.saturating_add(coin.value))
    }

    /// Digest signed by the prover.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.update(TX_DOMAIN);
        self.transaction.hash_into(&mut hasher);
        hasher.update(self.fee.payer.as_bytes());
        hasher.update(&self.fee.amount.to_le_bytes());
        hasher.update(&(self.new_coins.len() as u64).to_le_bytes());
        for coin in &self.new_coins {
            hasher.update(coin.owner.as_bytes());
            hasher.update(&coin.value.to_le_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}

/// Proof of authorization by the identity owning the state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub prover: CoinPublicKey,
    /// Hex-encoded 64-byte ed25519 signature over the balanced digest.
    pub signature: String,
}

/// Balanced and proven transaction, ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenTransaction {
    pub transaction: BalancedTransaction,
    pub proof: Proof,
}

impl ProvenTransaction {
    /// Check that the proof was produced by the transaction's caller.
    pub fn verify(&self) -> Result<(), SponsorError> {
        if self.proof.prover != self.transaction.transaction.caller {
            return Err(SponsorError::ProofFailed(format!(
                "prover {} does not own caller key {}",
                self.proof.prover, self.transaction.transaction.caller
            )));
        }

        let verifying_key = VerifyingKey::from_bytes(self.proof.prover.as_bytes())
            .map_err(|e| SponsorError::ProofFailed(format!("invalid prover key: {e}")))?;
        let sig_bytes = hex::decode(&self.proof.signature)
            .map_err(|e| SponsorError::ProofFailed(format!("invalid signature hex: {e}")))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| SponsorError::ProofFailed(format!("invalid signature: {e}")))?;

        verifying_key
            .verify_strict(&self.transaction.digest(), &signature)
            .map_err(|_| SponsorError::ProofFailed("signature does not verify".into()))
    }

    pub fn id(&self) -> TxId {
        let mut hasher = Hasher::new();
        hasher.update(&self.transaction.digest());
        hasher.update(self.proof.prover.as_bytes());
        hasher.update(self.proof.signature.as_bytes());
        TxId(*hasher.finalize().as_bytes())
    }
}

/// Identifier of an accepted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TxId(#[serde(with = "serde_hex32")] pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn coin_key(sk: &SigningKey) -> CoinPublicKey {
        CoinPublicKey(sk.verifying_key().to_bytes())
    }

    fn balanced_for(caller: CoinPublicKey, payer: CoinPublicKey) -> BalancedTransaction {
        let contract = ContractAddress::derive(&payer, &[0; 32]);
        BalancedTransaction {
            transaction: UnprovenTransaction::increment(contract, caller, Duration::from_secs(60)),
            fee: FeePayment { payer, amount: 5 },
            new_coins: vec![],
        }
    }

    fn prove(sk: &SigningKey, balanced: BalancedTransaction) -> ProvenTransaction {
        let signature = sk.sign(&balanced.digest());
        ProvenTransaction {
            proof: Proof {
                prover: coin_key(sk),
                signature: hex::encode(signature.to_bytes()),
            },
            transaction: balanced,
        }
    }

    #[test]
    fn proof_by_caller_verifies() {
        let prover = signing_key(7);
        let sponsor = signing_key(9);
        let tx = prove(&prover, balanced_for(coin_key(&prover), coin_key(&sponsor)));
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn proof_by_other_identity_is_rejected() {
        let prover = signing_key(7);
        let sponsor = signing_key(9);
        let tx = prove(&sponsor, balanced_for(coin_key(&prover), coin_key(&sponsor)));
        let err = tx.verify().unwrap_err();
        assert_eq!(err.error_code(), "PROOF_FAILED");
    }

    #[test]
    fn tampered_fee_breaks_signature() {
        let prover = signing_key(7);
        let sponsor = signing_key(9);
        let mut tx = prove(&prover, balanced_for(coin_key(&prover), coin_key(&sponsor)));
        tx.transaction.fee.amount = 0;
        assert!(matches!(tx.verify(), Err(SponsorError::ProofFailed(_))));
    }

    #[test]
    fn required_funds_includes_new_coins() {
        let sponsor = signing_key(9);
        let mut balanced = balanced_for(coin_key(&sponsor), coin_key(&sponsor));
        balanced.new_coins.push(CoinInfo {
            owner: coin_key(&sponsor),
            value: 10,
        });
        assert_eq!(balanced.required_funds(), 15);
    }

    #[test]
    fn contract_address_is_deterministic() {
        let deployer = coin_key(&signing_key(1));
        assert_eq!(
            ContractAddress::derive(&deployer, &[3; 32]),
            ContractAddress::derive(&deployer, &[3; 32])
        );
        assert_ne!(
            ContractAddress::derive(&deployer, &[3; 32]),
            ContractAddress::derive(&deployer, &[4; 32])
        );
    }

    #[test]
    fn proven_transaction_json_round_trip() {
        let prover = signing_key(7);
        let tx = prove(&prover, balanced_for(coin_key(&prover), coin_key(&prover)));
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transaction"]["transaction"]["call"]["circuit"], "increment");
        let back: ProvenTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), tx.id());
    }
}
