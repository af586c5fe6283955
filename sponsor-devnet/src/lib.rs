//! Local development network for sponsored transactions.
//!
//! Wires a [`LocalChain`] with a funded sponsor wallet, any number of named
//! prover wallets, and one deployed counter contract. Used by the rail binary
//! in development and by integration tests.

pub mod chain;
pub mod wallet;

use std::collections::BTreeMap;
use std::sync::Arc;

use sponsor_common::{ContractAddress, IdentityKeys};

pub use chain::LocalChain;
pub use wallet::{derive_keys, LocalWallet};

/// Funds minted to the sponsor when none are configured.
pub const DEFAULT_SPONSOR_FUNDS: u128 = 1_000_000;

/// Fee charged per transaction when none is configured.
pub const DEFAULT_FEE: u128 = 1_000;

pub struct Devnet {
    chain: Arc<LocalChain>,
    sponsor: Arc<LocalWallet>,
    provers: BTreeMap<String, Arc<LocalWallet>>,
    contract: ContractAddress,
    fee: u128,
}

impl Devnet {
    /// Start a chain, fund the sponsor derived from `sponsor_seed`, and
    /// deploy a counter contract from it.
    pub fn start(sponsor_seed: [u8; 32], fee: u128, sponsor_funds: u128) -> Self {
        let chain = Arc::new(LocalChain::new());
        let sponsor = Arc::new(LocalWallet::new("sponsor", sponsor_seed, Arc::clone(&chain), fee));
        chain.fund(sponsor.coin_public_key(), sponsor_funds);
        let contract = chain.deploy_counter(&sponsor.coin_public_key());
        sponsor.refresh();

        Self {
            chain,
            sponsor,
            provers: BTreeMap::new(),
            contract,
            fee,
        }
    }

    /// Devnet with a random sponsor and default economics.
    pub fn ephemeral() -> Self {
        Self::start(rand::random(), DEFAULT_FEE, DEFAULT_SPONSOR_FUNDS)
    }

    /// Register a prover identity under `name`. Replaces any previous one.
    pub fn add_prover(&mut self, name: &str, seed: [u8; 32]) -> Arc<LocalWallet> {
        let wallet = Arc::new(LocalWallet::new(name, seed, Arc::clone(&self.chain), self.fee));
        self.provers.insert(name.to_string(), Arc::clone(&wallet));
        wallet
    }

    pub fn chain(&self) -> &Arc<LocalChain> {
        &self.chain
    }

    pub fn sponsor(&self) -> &Arc<LocalWallet> {
        &self.sponsor
    }

    pub fn sponsor_keys(&self) -> IdentityKeys {
        self.sponsor.keys()
    }

    pub fn prover(&self, name: &str) -> Option<&Arc<LocalWallet>> {
        self.provers.get(name)
    }

    pub fn provers(&self) -> impl Iterator<Item = (&str, &Arc<LocalWallet>)> {
        self.provers.iter().map(|(name, wallet)| (name.as_str(), wallet))
    }

    pub fn contract(&self) -> ContractAddress {
        self.contract
    }

    pub fn fee(&self) -> u128 {
        self.fee
    }
}
