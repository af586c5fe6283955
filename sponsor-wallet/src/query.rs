//! Counter queries by textual address.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sponsor_common::{resolve_address, CoinPublicKey, ContractAddress, NetworkId, SponsorError};

use crate::overrides::OverrideStore;
use crate::provider::WalletProvider;
use crate::runtime::LedgerIndexer;

/// A counter value and the key it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterReading {
    pub key: CoinPublicKey,
    pub count: u64,
}

pub struct CounterQuery {
    indexer: Arc<dyn LedgerIndexer>,
    contract: ContractAddress,
    network: NetworkId,
}

impl CounterQuery {
    pub fn new(indexer: Arc<dyn LedgerIndexer>, contract: ContractAddress, network: NetworkId) -> Self {
        Self {
            indexer,
            contract,
            network,
        }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn contract(&self) -> ContractAddress {
        self.contract
    }

    /// Resolve any accepted address form on this query's network.
    pub fn resolve(&self, address: &str) -> Result<CoinPublicKey, SponsorError> {
        resolve_address(address, self.network)
    }

    /// Counter of `key`. Keys that never incremented read as zero.
    pub async fn query_counter(&self, key: &CoinPublicKey) -> Result<u64, SponsorError> {
        let count = self.indexer.counter_of(&self.contract, key).await?;
        debug!(%key, ?count, "counter queried");
        Ok(count.unwrap_or(0))
    }

    pub async fn contract_round(&self) -> Result<u64, SponsorError> {
        self.indexer.contract_round(&self.contract).await
    }

    /// Counter for `address`, or for the provider's effective identity when
    /// no address is given.
    pub async fn counter_for(
        &self,
        address: Option<&str>,
        provider: &WalletProvider,
        overrides: &OverrideStore,
    ) -> Result<CounterReading, SponsorError> {
        let key = match address {
            Some(address) => self.resolve(address)?,
            None => provider.coin_public_key(overrides),
        };
        let count = self.query_counter(&key).await?;
        Ok(CounterReading { key, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncPolicy;
    use crate::testing::{FixedIndexer, MockWallet};
    use sponsor_common::{encode_address, AddressFormat};
    use tokio_util::sync::CancellationToken;

    fn query(counts: &[(CoinPublicKey, u64)]) -> CounterQuery {
        CounterQuery::new(
            Arc::new(FixedIndexer::with_counts(counts)),
            ContractAddress([5; 32]),
            NetworkId::Undeployed,
        )
    }

    #[tokio::test]
    async fn all_address_forms_read_same_counter() {
        let key = CoinPublicKey([0x42; 32]);
        let q = query(&[(key, 4)]);
        for format in AddressFormat::ALL {
            let text = encode_address(&key, format, NetworkId::Undeployed);
            let reading = q.counter_for(Some(text.as_str()), &provider().await, &OverrideStore::default())
                .await
                .unwrap();
            assert_eq!(reading, CounterReading { key, count: 4 });
        }
    }

    #[tokio::test]
    async fn unknown_key_reads_zero() {
        let q = query(&[]);
        assert_eq!(q.query_counter(&CoinPublicKey([1; 32])).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected() {
        let q = query(&[]);
        let err = q
            .counter_for(Some("not-an-address"), &provider().await, &OverrideStore::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SponsorError::MalformedAddress(_)));
    }

    #[tokio::test]
    async fn own_counter_follows_override() {
        let sponsor = MockWallet::ready("sponsor", 0xa, 0);
        let prover = MockWallet::ready("b", 0xb, 0);
        let q = query(&[(prover.keys().coin_public_key, 1)]);
        let provider = WalletProvider::connect(
            Arc::new(sponsor.clone()),
            SyncPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let store = OverrideStore::default();

        store
            .activate(Arc::new(prover.clone()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(q.counter_for(None, &provider, &store).await.unwrap().count, 1);

        store.deactivate();
        let reading = q.counter_for(None, &provider, &store).await.unwrap();
        assert_eq!(reading.key, sponsor.keys().coin_public_key);
        assert_eq!(reading.count, 0);
    }

    async fn provider() -> WalletProvider {
        WalletProvider::connect(
            Arc::new(MockWallet::ready("sponsor", 0xa, 0)),
            SyncPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }
}
