//! Human-facing address encodings of a coin public key.
//!
//! Three textual forms name the same 32-byte key:
//!
//! - **Prefixed**: Bech32m with a network-specific HRP, e.g. `cpk_test1...`
//! - **Short**: unpadded URL-safe base64, 43 characters
//! - **Hex**: 64 hex digits, optionally `0x`-prefixed

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, Hrp};
use serde::{Deserialize, Serialize};

use crate::error::SponsorError;
use crate::keys::{serde_hex32, CoinPublicKey, KEY_LEN};

/// Length of the short (base64) form of a 32-byte key.
pub const SHORT_FORM_LEN: usize = 43;

/// Network an address belongs to; selects the Bech32m HRP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkId {
    #[default]
    Undeployed,
    DevNet,
    TestNet,
    MainNet,
}

impl NetworkId {
    pub const ALL: [NetworkId; 4] = [
        NetworkId::Undeployed,
        NetworkId::DevNet,
        NetworkId::TestNet,
        NetworkId::MainNet,
    ];

    /// Bech32m human-readable part for coin public keys on this network.
    pub fn coin_key_hrp(&self) -> &'static str {
        match self {
            NetworkId::Undeployed => "cpk_undeployed",
            NetworkId::DevNet => "cpk_dev",
            NetworkId::TestNet => "cpk_test",
            NetworkId::MainNet => "cpk",
        }
    }

    pub fn from_coin_key_hrp(hrp: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.coin_key_hrp() == hrp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Undeployed => "undeployed",
            NetworkId::DevNet => "devnet",
            NetworkId::TestNet => "testnet",
            NetworkId::MainNet => "mainnet",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = SponsorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SponsorError::MalformedAddress(format!("unknown network: {s}")))
    }
}

/// The accepted textual encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFormat {
    Prefixed,
    Short,
    Hex,
}

impl AddressFormat {
    pub const ALL: [AddressFormat; 3] = [
        AddressFormat::Prefixed,
        AddressFormat::Short,
        AddressFormat::Hex,
    ];
}

/// Encode `key` in the given textual form.
pub fn encode_address(key: &CoinPublicKey, format: AddressFormat, network: NetworkId) -> String {
    match format {
        AddressFormat::Prefixed => encode_prefixed(key, network),
        AddressFormat::Short => URL_SAFE_NO_PAD.encode(key.as_bytes()),
        AddressFormat::Hex => key.to_hex(),
    }
}

fn encode_prefixed(key: &CoinPublicKey, network: NetworkId) -> String {
    // HRPs are static ASCII and the payload is 32 bytes, so neither step can fail.
    let hrp = Hrp::parse_unchecked(network.coin_key_hrp());
    bech32::encode::<Bech32m>(hrp, key.as_bytes()).unwrap_or_default()
}

/// Resolve any accepted address form to the coin public key it names.
///
/// Prefixed addresses must carry the HRP of `network`.
pub fn resolve_address(input: &str, network: NetworkId) -> Result<CoinPublicKey, SponsorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SponsorError::MalformedAddress("address is empty".into()));
    }

    if looks_like_hex(input) {
        return serde_hex32::parse(input)
            .map(CoinPublicKey)
            .map_err(SponsorError::MalformedAddress);
    }

    // A Bech32m key address is always longer than the short form.
    if is_base64url(input) {
        return decode_short(input)
            .ok_or_else(|| SponsorError::MalformedAddress("invalid short-form key".into()));
    }

    decode_prefixed(input, network)
}

fn looks_like_hex(input: &str) -> bool {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    digits.len() == 2 * KEY_LEN && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_base64url(input: &str) -> bool {
    input.len() == SHORT_FORM_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn decode_short(input: &str) -> Option<CoinPublicKey> {
    let bytes = URL_SAFE_NO_PAD.decode(input).ok()?;
    let bytes: [u8; KEY_LEN] = bytes.try_into().ok()?;
    Some(CoinPublicKey(bytes))
}

fn decode_prefixed(input: &str, network: NetworkId) -> Result<CoinPublicKey, SponsorError> {
    // Only the Bech32m checksum is accepted; a plain Bech32 string is malformed.
    let checked = CheckedHrpstring::new::<Bech32m>(input)
        .map_err(|e| SponsorError::MalformedAddress(format!("not a recognised address: {e}")))?;

    let prefix = checked.hrp().to_lowercase();
    let found = NetworkId::from_coin_key_hrp(&prefix).ok_or_else(|| {
        SponsorError::MalformedAddress(format!("unknown address prefix: {prefix}"))
    })?;
    if found != network {
        return Err(SponsorError::MalformedAddress(format!(
            "address is for {found}, expected {network}"
        )));
    }

    let data: Vec<u8> = checked.byte_iter().collect();
    let bytes: [u8; KEY_LEN] = data.try_into().map_err(|data: Vec<u8>| {
        SponsorError::MalformedAddress(format!(
            "expected {KEY_LEN}-byte key, got {} bytes",
            data.len()
        ))
    })?;
    Ok(CoinPublicKey(bytes))
}
