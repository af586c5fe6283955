//! Identity key material.
//!
//! An identity is known to the rest of the system only through its two public
//! keys. The coin public key doubles as the identity's ledger key and as the
//! ed25519 verifying key its proofs are checked against; equality of identities
//! is equality of coin public keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length in bytes of every public key handled by the workspace.
pub const KEY_LEN: usize = 32;

/// Coin public key: owns balances and keys the per-identity ledger entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoinPublicKey(#[serde(with = "serde_hex32")] pub [u8; KEY_LEN]);

/// Encryption public key used for private-state encryption.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptionPublicKey(#[serde(with = "serde_hex32")] pub [u8; KEY_LEN]);

impl CoinPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl EncryptionPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for CoinPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoinPublicKey({})", short_hex(&self.0))
    }
}

impl fmt::Display for CoinPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionPublicKey({})", short_hex(&self.0))
    }
}

fn short_hex(bytes: &[u8; KEY_LEN]) -> String {
    format!("{}..{}", hex::encode(&bytes[..4]), hex::encode(&bytes[KEY_LEN - 4..]))
}

/// The public half of an identity. Both keys are always present together.
///
/// Equality and hashing only look at the coin public key.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IdentityKeys {
    pub coin_public_key: CoinPublicKey,
    pub encryption_public_key: EncryptionPublicKey,
}

impl IdentityKeys {
    pub fn new(coin_public_key: CoinPublicKey, encryption_public_key: EncryptionPublicKey) -> Self {
        Self {
            coin_public_key,
            encryption_public_key,
        }
    }
}

impl PartialEq for IdentityKeys {
    fn eq(&self, other: &Self) -> bool {
        self.coin_public_key == other.coin_public_key
    }
}

impl Eq for IdentityKeys {}

impl std::hash::Hash for IdentityKeys {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.coin_public_key.hash(state);
    }
}

/// Serde module for 32-byte arrays as `0x`-prefixed hex strings.
pub mod serde_hex32 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }

    /// Parse 64 hex digits, with or without a `0x`/`0X` prefix.
    pub fn parse(s: &str) -> Result<[u8; 32], String> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if trimmed.len() != 64 {
            return Err(format!("expected 64 hex chars, got {}", trimmed.len()));
        }
        let bytes = hex::decode(trimmed).map_err(|e| format!("invalid hex: {e}"))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}
