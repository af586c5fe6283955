//! In-process chain: accounts, deployed counter contracts, and the
//! admission checks a real node performs on submitted transactions.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};

use sponsor_common::{
    now_unix, CoinPublicKey, ContractAddress, ProvenTransaction, SponsorError, TxId,
};
use sponsor_ledger::CounterContract;
use sponsor_wallet::LedgerIndexer;

#[derive(Default)]
struct ChainState {
    height: u64,
    accounts: HashMap<CoinPublicKey, u128>,
    contracts: HashMap<ContractAddress, CounterContract>,
    nonces: HashSet<[u8; 32]>,
}

/// Shared chain state. Every method takes `&self`.
#[derive(Default)]
pub struct LocalChain {
    state: Mutex<ChainState>,
}

impl LocalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(&self) -> u64 {
        self.lock().height
    }

    pub fn balance_of(&self, key: &CoinPublicKey) -> u128 {
        self.lock().accounts.get(key).copied().unwrap_or(0)
    }

    /// Mint `amount` to `key`.
    pub fn fund(&self, key: CoinPublicKey, amount: u128) {
        let mut state = self.lock();
        let balance = state.accounts.entry(key).or_default();
        *balance = balance.saturating_add(amount);
        state.height += 1;
        info!(%key, amount, "account funded");
    }

    /// Deploy an empty counter contract owned by `deployer`.
    pub fn deploy_counter(&self, deployer: &CoinPublicKey) -> ContractAddress {
        let address = ContractAddress::derive(deployer, &rand::random());
        let mut state = self.lock();
        state
            .contracts
            .insert(address, CounterContract::new(address));
        state.height += 1;
        info!(contract = %address, %deployer, "counter contract deployed");
        address
    }

    /// Snapshot of a deployed contract.
    pub fn contract(&self, address: &ContractAddress) -> Option<CounterContract> {
        self.lock().contracts.get(address).cloned()
    }

    /// Admit `tx`: verify, charge the payer, and run the contract call.
    ///
    /// Rejected transactions leave the chain untouched.
    pub fn apply(&self, tx: &ProvenTransaction) -> Result<TxId, SponsorError> {
        tx.verify()?;

        let call = &tx.transaction.transaction;
        if call.expires_at < now_unix() {
            return Err(SponsorError::SubmissionRejected(format!(
                "transaction expired at {}",
                call.expires_at
            )));
        }

        let mut state = self.lock();
        if state.nonces.contains(&call.nonce) {
            return Err(SponsorError::SubmissionRejected(
                "duplicate transaction nonce".into(),
            ));
        }

        let payer = tx.transaction.fee.payer;
        let required = tx.transaction.required_funds();
        let available = state.accounts.get(&payer).copied().unwrap_or(0);
        if available < required {
            warn!(%payer, required, available, "payer cannot cover transaction");
            return Err(SponsorError::InsufficientFunds {
                required,
                available,
            });
        }

        let contract = state
            .contracts
            .get_mut(&call.contract)
            .ok_or_else(|| SponsorError::ContractNotFound(call.contract.to_hex()))?;
        let outcome = contract.execute(call)?;

        state.accounts.insert(payer, available - required);
        for coin in &tx.transaction.new_coins {
            let balance = state.accounts.entry(coin.owner).or_default();
            *balance = balance.saturating_add(coin.value);
        }
        state.nonces.insert(call.nonce);
        state.height += 1;

        let id = tx.id();
        info!(
            tx_id = %id,
            caller = %outcome.caller,
            count = outcome.count,
            %payer,
            height = state.height,
            "transaction applied"
        );
        Ok(id)
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LedgerIndexer for LocalChain {
    async fn counter_of(
        &self,
        contract: &ContractAddress,
        key: &CoinPublicKey,
    ) -> Result<Option<u64>, SponsorError> {
        let state = self.lock();
        let contract = state
            .contracts
            .get(contract)
            .ok_or_else(|| SponsorError::ContractNotFound(contract.to_hex()))?;
        Ok(contract.counters().lookup(key))
    }

    async fn contract_round(&self, contract: &ContractAddress) -> Result<u64, SponsorError> {
        self.lock()
            .contracts
            .get(contract)
            .map(CounterContract::round)
            .ok_or_else(|| SponsorError::ContractNotFound(contract.to_hex()))
    }
}
