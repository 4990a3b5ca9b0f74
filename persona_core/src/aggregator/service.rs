use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{keys, CacheStore};
use crate::error::{PersonaError, PersonaResult};
use crate::helpers::dto::{
    ActivityEntry, NftAsset, Profile, TokenBalance, TransferDirection,
};
use crate::helpers::utils::{format_units, normalize_address, parse_hex_quantity};
use crate::upstream::chain::SupportedChain;
use crate::upstream::dto::{RawTransfer, TransferKind};
use crate::upstream::UpstreamSource;

use super::classify::classify;

pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Cache TTLs per resource, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub profile_ttl: u64,
    pub nfts_ttl: u64,
    pub activity_ttl: u64,
    pub balances_ttl: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            profile_ttl: 15 * 60,
            nfts_ttl: 5 * 60,
            activity_ttl: 2 * 60,
            balances_ttl: 5 * 60,
        }
    }
}

/// Cache-first aggregation over the upstream data client.
///
/// Both collaborators are injected so tests can substitute them. Concurrent
/// misses for the same address may duplicate upstream calls; cache writes
/// are idempotent and last-write-wins, so that is tolerated rather than
/// deduplicated.
pub struct AggregationService {
    cache: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamSource>,
    chains: Vec<SupportedChain>,
    policy: CachePolicy,
}

impl AggregationService {
    pub fn new(cache: Arc<dyn CacheStore>, upstream: Arc<dyn UpstreamSource>) -> Self {
        Self::with_policy(cache, upstream, CachePolicy::default())
    }

    pub fn with_policy(
        cache: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamSource>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            cache,
            upstream,
            chains: SupportedChain::ALL.to_vec(),
            policy,
        }
    }

    pub fn with_chains(mut self, chains: Vec<SupportedChain>) -> Self {
        self.chains = chains;
        self
    }

    /// Identity for an address, merged from per-chain lookups. TTL 15 min.
    pub async fn get_profile(&self, address: &str) -> PersonaResult<Profile> {
        let address = normalize_address(address)?;
        let key = keys::profile(&address);
        if let Some(profile) = self.read_cached(&key).await {
            return Ok(profile);
        }
        if !self.upstream.configured() {
            warn!("upstream not configured; serving placeholder profile for {}", address);
            return Ok(Profile::placeholder(&address));
        }

        let lookups = self
            .chains
            .iter()
            .map(|chain| self.upstream.resolve_identity(*chain, &address));
        let results = join_all(lookups).await;

        let mut records = Vec::new();
        let mut failures = 0;
        for (chain, result) in self.chains.iter().zip(results) {
            match result {
                Ok(record) => records.extend(record),
                Err(e) => {
                    failures += 1;
                    warn!("identity resolution failed on {}: {}", chain, e);
                }
            }
        }
        if failures == self.chains.len() {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "identity resolution failed on every chain for {}",
                address
            )));
        }

        let profile = Profile::merge(&address, records);
        self.write_cached(&key, &profile, self.policy.profile_ttl)
            .await?;
        Ok(profile)
    }

    /// NFT holdings across all configured chains, flattened. TTL 5 min.
    /// A failing chain contributes nothing; only all chains failing is an
    /// error.
    pub async fn aggregate_nfts(&self, address: &str) -> PersonaResult<Vec<NftAsset>> {
        let address = normalize_address(address)?;
        let key = keys::nfts(&address);
        if let Some(assets) = self.read_cached(&key).await {
            return Ok(assets);
        }
        if !self.upstream.configured() {
            warn!("upstream not configured; serving empty NFT list for {}", address);
            return Ok(Vec::new());
        }

        let queries = self
            .chains
            .iter()
            .map(|chain| self.upstream.list_nfts(*chain, &address));
        let results = join_all(queries).await;

        let mut assets = Vec::new();
        let mut failures = 0;
        for (chain, result) in self.chains.iter().zip(results) {
            match result {
                Ok(mut chunk) => assets.append(&mut chunk),
                Err(e) => {
                    failures += 1;
                    warn!("NFT query failed on {}: {}", chain, e);
                }
            }
        }
        if failures == self.chains.len() {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "NFT queries failed on every chain for {}",
                address
            )));
        }

        self.write_cached(&key, &assets, self.policy.nfts_ttl).await?;
        Ok(assets)
    }

    /// Activity feed: transfers in both directions, classified and sorted by
    /// block number descending. TTL 2 min. A hash can appear once per
    /// direction view; both entries are kept.
    pub async fn get_activity_feed(&self, address: &str) -> PersonaResult<Vec<ActivityEntry>> {
        let address = normalize_address(address)?;
        let key = keys::activity(&address);
        if let Some(entries) = self.read_cached(&key).await {
            return Ok(entries);
        }
        if !self.upstream.configured() {
            warn!("upstream not configured; serving empty activity feed for {}", address);
            return Ok(Vec::new());
        }

        let (sent, received) = futures::join!(
            self.upstream.list_transfers(&address, TransferDirection::From),
            self.upstream.list_transfers(&address, TransferDirection::To),
        );
        if sent.is_err() && received.is_err() {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "transfer queries failed in both directions for {}",
                address
            )));
        }

        let mut entries: Vec<ActivityEntry> = Vec::new();
        for result in [sent, received] {
            match result {
                Ok(transfers) => entries.extend(
                    transfers
                        .into_iter()
                        .filter_map(|transfer| normalize_transfer(transfer, &address)),
                ),
                Err(e) => warn!("transfer query failed for {}: {}", address, e),
            }
        }
        entries.sort_by(|a, b| b.block_number.cmp(&a.block_number));

        self.write_cached(&key, &entries, self.policy.activity_ttl)
            .await?;
        Ok(entries)
    }

    /// Nonzero fungible balances with metadata resolved per token. TTL
    /// 5 min. A failed metadata lookup falls back to 18 decimals and no
    /// symbol; it never fails the collection.
    pub async fn get_token_balances(&self, address: &str) -> PersonaResult<Vec<TokenBalance>> {
        let address = normalize_address(address)?;
        let key = keys::balances(&address);
        if let Some(balances) = self.read_cached(&key).await {
            return Ok(balances);
        }
        if !self.upstream.configured() {
            warn!("upstream not configured; serving empty balances for {}", address);
            return Ok(Vec::new());
        }

        let raw = self.upstream.list_token_balances(&address).await?;

        let mut nonzero = Vec::new();
        for balance in raw {
            match balance.token_balance.as_deref().and_then(parse_hex_quantity) {
                Some(0) => {}
                Some(value) => nonzero.push((balance, value)),
                None => warn!(
                    "unparseable balance for token {}; dropping",
                    balance.contract_address
                ),
            }
        }

        let lookups = nonzero
            .iter()
            .map(|(balance, _)| self.upstream.token_metadata(&balance.contract_address));
        let metadata_results = join_all(lookups).await;

        let mut balances = Vec::new();
        for ((raw_balance, value), metadata) in nonzero.into_iter().zip(metadata_results) {
            let metadata = match metadata {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(
                        "metadata lookup failed for {}: {}",
                        raw_balance.contract_address, e
                    );
                    None
                }
            };
            let decimals = metadata
                .as_ref()
                .and_then(|m| m.decimals)
                .unwrap_or(DEFAULT_TOKEN_DECIMALS);
            let symbol = metadata.and_then(|m| m.symbol);
            balances.push(TokenBalance {
                contract_address: raw_balance.contract_address,
                symbol,
                balance: format_units(value, decimals),
                decimals,
                usd_value: None,
            });
        }

        self.write_cached(&key, &balances, self.policy.balances_ttl)
            .await?;
        Ok(balances)
    }

    /// Deletes every cached entry for the address. The next read of any
    /// resource goes back to upstream.
    pub async fn invalidate(&self, address: &str) -> PersonaResult<()> {
        let address = normalize_address(address)?;
        for key in keys::all(&address) {
            self.cache.delete(&key).await;
        }
        info!("invalidated cached entries for {}", address);
        Ok(())
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.cache.get(key).await?;
        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!("cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("corrupt cache payload for {}: {}; treating as miss", key, e);
                self.cache.delete(key).await;
                None
            }
        }
    }

    async fn write_cached<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> PersonaResult<()> {
        let payload = serde_json::to_string(value)?;
        if !self.cache.set(key, &payload, ttl_secs).await {
            warn!("cache write failed for {}", key);
        }
        Ok(())
    }
}

/// Converts one raw transfer into a feed entry. Transfers without a
/// parseable block number are dropped; an unrecognized provider category is
/// kept but flagged `Other` by the classifier.
fn normalize_transfer(transfer: RawTransfer, address: &str) -> Option<ActivityEntry> {
    let block_number = parse_hex_quantity(&transfer.block_num)
        .and_then(|value| u64::try_from(value).ok())?;

    let kind = TransferKind::parse(&transfer.category);
    if kind.is_none() {
        debug!(
            "unrecognized transfer category '{}' on {}",
            transfer.category, transfer.hash
        );
    }
    let category = classify(kind, &transfer.from, transfer.to.as_deref(), address);

    let timestamp_secs = transfer
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.block_timestamp.as_deref())
        .and_then(parse_block_timestamp)
        .unwrap_or(0);

    Some(ActivityEntry {
        transaction_hash: transfer.hash,
        block_number,
        from: transfer.from,
        to: transfer.to,
        value: transfer.value,
        asset: transfer.asset,
        category,
        timestamp_secs,
    })
}

fn parse_block_timestamp(raw: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.timestamp())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::helpers::dto::{ActivityCategory, IdentityRecord, NftAttribute};
    use crate::upstream::dto::{RawTokenBalance, TokenMetadata, TransferMetadata};

    const ADDRESS: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1";
    const COUNTERPARTY: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2";
    const UNISWAP_V2: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

    #[derive(Default)]
    struct MockUpstream {
        unconfigured: bool,
        failing_chains: Vec<SupportedChain>,
        identities: HashMap<SupportedChain, IdentityRecord>,
        nfts: HashMap<SupportedChain, Vec<NftAsset>>,
        transfers_from: Vec<RawTransfer>,
        transfers_to: Vec<RawTransfer>,
        balances: Vec<RawTokenBalance>,
        metadata: HashMap<String, TokenMetadata>,
        fail_metadata: bool,
        identity_calls: AtomicUsize,
        nft_calls: AtomicUsize,
        transfer_calls: AtomicUsize,
    }

    impl MockUpstream {
        fn failing(chain: SupportedChain) -> PersonaResult<()> {
            Err(PersonaError::UpstreamUnavailable(format!(
                "mock failure on {}",
                chain
            )))
        }
    }

    #[async_trait]
    impl UpstreamSource for MockUpstream {
        fn configured(&self) -> bool {
            !self.unconfigured
        }

        async fn resolve_identity(
            &self,
            chain: SupportedChain,
            _address: &str,
        ) -> PersonaResult<Option<IdentityRecord>> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_chains.contains(&chain) {
                Self::failing(chain)?;
            }
            Ok(self.identities.get(&chain).cloned())
        }

        async fn list_nfts(
            &self,
            chain: SupportedChain,
            _address: &str,
        ) -> PersonaResult<Vec<NftAsset>> {
            self.nft_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_chains.contains(&chain) {
                Self::failing(chain)?;
            }
            Ok(self.nfts.get(&chain).cloned().unwrap_or_default())
        }

        async fn list_token_balances(
            &self,
            _address: &str,
        ) -> PersonaResult<Vec<RawTokenBalance>> {
            Ok(self.balances.clone())
        }

        async fn token_metadata(
            &self,
            contract_address: &str,
        ) -> PersonaResult<Option<TokenMetadata>> {
            if self.fail_metadata {
                return Err(PersonaError::UpstreamUnavailable(
                    "mock metadata failure".to_string(),
                ));
            }
            Ok(self.metadata.get(contract_address).cloned())
        }

        async fn list_transfers(
            &self,
            _address: &str,
            direction: TransferDirection,
        ) -> PersonaResult<Vec<RawTransfer>> {
            self.transfer_calls.fetch_add(1, Ordering::SeqCst);
            match direction {
                TransferDirection::From => Ok(self.transfers_from.clone()),
                TransferDirection::To => Ok(self.transfers_to.clone()),
            }
        }
    }

    fn transfer(hash: &str, block: u64, from: &str, to: &str, category: &str) -> RawTransfer {
        RawTransfer {
            hash: hash.to_string(),
            block_num: format!("0x{:x}", block),
            from: from.to_string(),
            to: Some(to.to_string()),
            value: Some(1.0),
            asset: Some("TOK".to_string()),
            category: category.to_string(),
            metadata: Some(TransferMetadata {
                block_timestamp: Some("2024-05-01T12:00:00.000Z".to_string()),
            }),
        }
    }

    fn nft(chain: SupportedChain, token_id: &str) -> NftAsset {
        NftAsset {
            chain: chain.name().to_string(),
            contract_address: "0xc0ffee".to_string(),
            token_id: token_id.to_string(),
            name: Some(format!("Token #{}", token_id)),
            description: None,
            image_uri: None,
            collection_name: Some("Test Collection".to_string()),
            attributes: vec![NftAttribute {
                trait_type: "Kind".to_string(),
                value: "Test".to_string(),
            }],
        }
    }

    fn ens_identity(name: &str) -> IdentityRecord {
        IdentityRecord {
            name: Some(name.to_string()),
            avatar: Some("ipfs://avatar".to_string()),
            bio: None,
            handles: vec![("ens".to_string(), name.to_string())],
        }
    }

    fn service(upstream: MockUpstream, policy: CachePolicy) -> (AggregationService, Arc<MockUpstream>) {
        let upstream = Arc::new(upstream);
        let service = AggregationService::with_policy(
            Arc::new(MemoryCache::new()),
            upstream.clone(),
            policy,
        )
        .with_chains(vec![SupportedChain::Ethereum]);
        (service, upstream)
    }

    #[tokio::test]
    async fn profile_is_idempotent_within_ttl() {
        let mut upstream = MockUpstream::default();
        upstream
            .identities
            .insert(SupportedChain::Ethereum, ens_identity("alice.eth"));
        let (service, upstream) = service(upstream, CachePolicy::default());

        let first = service.get_profile(ADDRESS).await.unwrap();
        let second = service.get_profile(ADDRESS).await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let mut upstream = MockUpstream::default();
        upstream
            .identities
            .insert(SupportedChain::Ethereum, ens_identity("alice.eth"));
        let policy = CachePolicy {
            profile_ttl: 0,
            ..CachePolicy::default()
        };
        let (service, upstream) = service(upstream, policy);

        service.get_profile(ADDRESS).await.unwrap();
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 1);
        service.get_profile(ADDRESS).await.unwrap();
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nft_fan_out_isolates_a_failing_chain() {
        let mut upstream = MockUpstream::default();
        upstream.nfts.insert(
            SupportedChain::Ethereum,
            vec![nft(SupportedChain::Ethereum, "1"), nft(SupportedChain::Ethereum, "2")],
        );
        upstream.failing_chains.push(SupportedChain::Polygon);
        let upstream = Arc::new(upstream);
        let service = AggregationService::new(Arc::new(MemoryCache::new()), upstream.clone())
            .with_chains(vec![SupportedChain::Ethereum, SupportedChain::Polygon]);

        let assets = service.aggregate_nfts(ADDRESS).await.unwrap();

        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|asset| asset.chain == "Ethereum"));
    }

    #[tokio::test]
    async fn all_chains_failing_is_a_resource_error() {
        let mut upstream = MockUpstream::default();
        upstream.failing_chains =
            vec![SupportedChain::Ethereum, SupportedChain::Polygon];
        let upstream = Arc::new(upstream);
        let service = AggregationService::new(Arc::new(MemoryCache::new()), upstream)
            .with_chains(vec![SupportedChain::Ethereum, SupportedChain::Polygon]);

        let result = service.aggregate_nfts(ADDRESS).await;
        assert!(matches!(result, Err(PersonaError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn activity_feed_is_sorted_by_block_descending() {
        let mut upstream = MockUpstream::default();
        upstream.transfers_from = vec![
            transfer("0xh1", 100, ADDRESS, COUNTERPARTY, "erc20"),
            transfer("0xh2", 300, ADDRESS, COUNTERPARTY, "external"),
        ];
        upstream.transfers_to = vec![
            transfer("0xh3", 200, COUNTERPARTY, ADDRESS, "erc20"),
        ];
        let (service, _) = service(upstream, CachePolicy::default());

        let feed = service.get_activity_feed(ADDRESS).await.unwrap();

        assert_eq!(feed.len(), 3);
        assert!(feed
            .windows(2)
            .all(|pair| pair[0].block_number >= pair[1].block_number));
    }

    #[tokio::test]
    async fn dex_router_counterparty_classifies_as_swap() {
        let mut upstream = MockUpstream::default();
        upstream.transfers_from =
            vec![transfer("0xswap", 100, ADDRESS, UNISWAP_V2, "erc20")];
        let (service, _) = service(upstream, CachePolicy::default());

        let feed = service.get_activity_feed(ADDRESS).await.unwrap();
        assert_eq!(feed[0].category, ActivityCategory::Swap);
    }

    #[tokio::test]
    async fn same_hash_kept_for_both_direction_views() {
        let mut upstream = MockUpstream::default();
        upstream.transfers_from =
            vec![transfer("0xdup", 100, ADDRESS, COUNTERPARTY, "erc20")];
        upstream.transfers_to =
            vec![transfer("0xdup", 100, COUNTERPARTY, ADDRESS, "erc20")];
        let (service, _) = service(upstream, CachePolicy::default());

        let feed = service.get_activity_feed(ADDRESS).await.unwrap();
        assert_eq!(feed.len(), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_next_read_through_to_upstream() {
        let mut upstream = MockUpstream::default();
        upstream
            .identities
            .insert(SupportedChain::Ethereum, ens_identity("alice.eth"));
        let (service, upstream) = service(upstream, CachePolicy::default());

        service.get_profile(ADDRESS).await.unwrap();
        service.get_profile(ADDRESS).await.unwrap();
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 1);

        service.invalidate(ADDRESS).await.unwrap();

        service.get_profile(ADDRESS).await.unwrap();
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn balances_skip_zero_and_survive_metadata_failure() {
        let mut upstream = MockUpstream::default();
        upstream.balances = vec![
            RawTokenBalance {
                contract_address: "0xtok1".to_string(),
                token_balance: Some("0xde0b6b3a7640000".to_string()),
                error: None,
            },
            RawTokenBalance {
                contract_address: "0xtok2".to_string(),
                token_balance: Some("0x0".to_string()),
                error: None,
            },
        ];
        upstream.fail_metadata = true;
        let (service, _) = service(upstream, CachePolicy::default());

        let balances = service.get_token_balances(ADDRESS).await.unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].balance, "1.0");
        assert_eq!(balances[0].decimals, DEFAULT_TOKEN_DECIMALS);
        assert_eq!(balances[0].symbol, None);
    }

    #[tokio::test]
    async fn metadata_decimals_are_applied_when_available() {
        let mut upstream = MockUpstream::default();
        upstream.balances = vec![RawTokenBalance {
            contract_address: "0xusdc".to_string(),
            token_balance: Some("0x16e360".to_string()),
            error: None,
        }];
        upstream.metadata.insert(
            "0xusdc".to_string(),
            TokenMetadata {
                name: Some("USD Coin".to_string()),
                symbol: Some("USDC".to_string()),
                decimals: Some(6),
                logo: None,
            },
        );
        let (service, _) = service(upstream, CachePolicy::default());

        let balances = service.get_token_balances(ADDRESS).await.unwrap();

        assert_eq!(balances[0].symbol.as_deref(), Some("USDC"));
        assert_eq!(balances[0].balance, "1.5");
    }

    #[tokio::test]
    async fn unconfigured_upstream_serves_placeholder_data() {
        let upstream = MockUpstream {
            unconfigured: true,
            ..MockUpstream::default()
        };
        let (service, upstream) = service(upstream, CachePolicy::default());

        let profile = service.get_profile(ADDRESS).await.unwrap();
        assert_eq!(profile, Profile::placeholder(ADDRESS));
        assert!(service.aggregate_nfts(ADDRESS).await.unwrap().is_empty());
        assert!(service.get_activity_feed(ADDRESS).await.unwrap().is_empty());
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_any_lookup() {
        let (service, upstream) = service(MockUpstream::default(), CachePolicy::default());

        let result = service.get_profile("not-an-address").await;
        assert!(matches!(result, Err(PersonaError::InvalidAddress(_))));
        assert_eq!(upstream.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_category_entries_are_kept_as_other() {
        let mut upstream = MockUpstream::default();
        upstream.transfers_from =
            vec![transfer("0xodd", 100, ADDRESS, COUNTERPARTY, "erc4626")];
        let (service, _) = service(upstream, CachePolicy::default());

        let feed = service.get_activity_feed(ADDRESS).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].category, ActivityCategory::Other);
    }
}
