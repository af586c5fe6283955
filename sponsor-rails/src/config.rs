//! Service configuration.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use sponsor_common::{keys::serde_hex32, NetworkId, DEFAULT_PROOF_SERVER_URL};
use sponsor_devnet::{Devnet, DEFAULT_FEE, DEFAULT_SPONSOR_FUNDS};
use sponsor_wallet::{SyncPolicy, DEFAULT_SYNC_TIMEOUT, DEFAULT_TX_TTL};

pub const DEFAULT_PORT: u16 = 3010;

#[derive(Clone, Debug)]
pub struct RailConfig {
    pub port: u16,
    pub network: NetworkId,
    /// Sponsor wallet seed. A random one is generated when unset.
    pub sponsor_seed: Option<[u8; 32]>,
    /// Named prover wallets available to `/increment`.
    pub prover_seeds: Vec<(String, [u8; 32])>,
    pub sync_timeout: Duration,
    pub tx_ttl: Duration,
    pub fee: u128,
    /// Funds minted to the sponsor on the local chain.
    pub initial_funds: u128,
    pub proof_server_url: String,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            network: NetworkId::default(),
            sponsor_seed: None,
            prover_seeds: Vec::new(),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            tx_ttl: DEFAULT_TX_TTL,
            fee: DEFAULT_FEE,
            initial_funds: DEFAULT_SPONSOR_FUNDS,
            proof_server_url: DEFAULT_PROOF_SERVER_URL.to_string(),
        }
    }
}

impl RailConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let network = match env::var("SPONSOR_NETWORK") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("SPONSOR_NETWORK has unknown network {value:?}"))?,
            Err(_) => defaults.network,
        };

        let sponsor_seed = env::var("SPONSOR_SEED")
            .ok()
            .map(|s| serde_hex32::parse(&s).map_err(|e| anyhow!(e)))
            .transpose()
            .context("SPONSOR_SEED must be 32 bytes of hex")?;

        let prover_seeds = match env::var("SPONSOR_PROVER_SEEDS") {
            Ok(value) => parse_prover_seeds(&value).context("invalid SPONSOR_PROVER_SEEDS")?,
            Err(_) => Vec::new(),
        };

        let sync_timeout = env::var("SPONSOR_SYNC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sync_timeout);

        let tx_ttl = env::var("SPONSOR_TX_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.tx_ttl);

        let fee: u128 = env::var("SPONSOR_FEE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.fee);

        let initial_funds: u128 = env::var("SPONSOR_INITIAL_FUNDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.initial_funds);

        let proof_server_url =
            env::var("SPONSOR_PROOF_SERVER_URL").unwrap_or(defaults.proof_server_url);

        Ok(Self {
            port,
            network,
            sponsor_seed,
            prover_seeds,
            sync_timeout,
            tx_ttl,
            fee,
            initial_funds,
            proof_server_url,
        })
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy::with_timeout(self.sync_timeout)
    }

    /// Start a local chain with the configured sponsor and provers.
    pub fn start_devnet(&self) -> Devnet {
        let seed = self.sponsor_seed.unwrap_or_else(|| {
            tracing::warn!("SPONSOR_SEED not set, using a random sponsor wallet");
            rand::random()
        });
        let mut devnet = Devnet::start(seed, self.fee, self.initial_funds);
        for (name, seed) in &self.prover_seeds {
            devnet.add_prover(name, *seed);
        }
        devnet
    }
}

/// Parse `name=hex,name=hex`.
pub fn parse_prover_seeds(value: &str) -> Result<Vec<(String, [u8; 32])>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, seed) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("expected name=hex, got {entry:?}"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(anyhow!("prover name missing in {entry:?}"));
            }
            let seed = serde_hex32::parse(seed.trim())
                .map_err(|e| anyhow!("prover {name}: {e}"))?;
            Ok((name.to_string(), seed))
        })
        .collect()
}
