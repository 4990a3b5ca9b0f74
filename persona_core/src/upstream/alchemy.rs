use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{PersonaError, PersonaResult};
use crate::helpers::dto::{IdentityRecord, NftAsset, TransferDirection};

use super::abi;
use super::chain::{AlchemyNetwork, SupportedChain};
use super::dto::{
    AssetTransfersResult, JsonRpcRequest, JsonRpcResponse, OwnedNftsResponse, RawTokenBalance,
    RawTransfer, TokenBalancesResult, TokenMetadata,
};
use super::UpstreamSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TRANSFERS: u32 = 50;
const NFT_PAGE_SIZE: u32 = 100;
const GET_PROFILE_SIGNATURE: &str = "getProfile(address)";

/// Alchemy-backed upstream client. JSON-RPC for balances, metadata,
/// transfers and the registry `eth_call`; the NFT REST API for holdings.
///
/// Constructed without an API key the client reports itself unconfigured and
/// refuses every request, letting the aggregation service degrade instead of
/// the process crashing.
pub struct AlchemyClient {
    client: Client,
    api_key: Option<String>,
    network: AlchemyNetwork,
    /// Per-chain profile-registry contracts. A chain without one resolves no
    /// identity record.
    registries: HashMap<SupportedChain, String>,
    endpoint_override: Option<String>,
}

impl AlchemyClient {
    pub fn new(api_key: Option<String>, network: AlchemyNetwork) -> Self {
        Self {
            client: Client::new(),
            api_key,
            network,
            registries: HashMap::new(),
            endpoint_override: None,
        }
    }

    pub fn with_registry(mut self, chain: SupportedChain, contract_address: String) -> Self {
        self.registries.insert(chain, contract_address);
        self
    }

    /// Points every request at `base` instead of the Alchemy hosts. Test
    /// hook for running against a local mock server.
    #[doc(hidden)]
    pub fn with_endpoint_override(mut self, base: String) -> Self {
        self.endpoint_override = Some(base);
        self
    }

    fn rpc_url(&self, chain: SupportedChain) -> Option<String> {
        if let Some(base) = &self.endpoint_override {
            return Some(format!("{}/rpc/{}", base, chain.subdomain(self.network)));
        }
        let key = self.api_key.as_ref()?;
        Some(format!(
            "https://{}.g.alchemy.com/v2/{}",
            chain.subdomain(self.network),
            key
        ))
    }

    fn nft_api_url(&self, chain: SupportedChain) -> Option<String> {
        if let Some(base) = &self.endpoint_override {
            return Some(format!(
                "{}/nft/{}/getNFTsForOwner",
                base,
                chain.subdomain(self.network)
            ));
        }
        let key = self.api_key.as_ref()?;
        Some(format!(
            "https://{}.g.alchemy.com/nft/v3/{}/getNFTsForOwner",
            chain.subdomain(self.network),
            key
        ))
    }

    async fn rpc(
        &self,
        chain: SupportedChain,
        method: &str,
        params: Value,
    ) -> PersonaResult<Value> {
        let url = self.rpc_url(chain).ok_or_else(|| {
            PersonaError::UpstreamUnavailable("upstream API key not configured".to_string())
        })?;

        let request = JsonRpcRequest::new(method, params);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PersonaError::UpstreamUnavailable(format!("{} request failed: {}", method, e))
            })?;

        if !response.status().is_success() {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "{} returned status {}",
                method,
                response.status()
            )));
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            PersonaError::UpstreamUnavailable(format!("{} returned malformed body: {}", method, e))
        })?;

        if let Some(error) = body.error {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }

        body.result.ok_or_else(|| {
            PersonaError::UpstreamUnavailable(format!("{} returned no result", method))
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[async_trait]
impl UpstreamSource for AlchemyClient {
    fn configured(&self) -> bool {
        self.api_key.is_some() || self.endpoint_override.is_some()
    }

    async fn resolve_identity(
        &self,
        chain: SupportedChain,
        address: &str,
    ) -> PersonaResult<Option<IdentityRecord>> {
        let registry = match self.registries.get(&chain) {
            Some(registry) => registry,
            None => return Ok(None),
        };

        let calldata = abi::encode_address_call(GET_PROFILE_SIGNATURE, address)?;
        let result = self
            .rpc(
                chain,
                "eth_call",
                json!([{ "to": registry, "data": calldata }, "latest"]),
            )
            .await?;

        let raw = result.as_str().unwrap_or_default();
        let decoded = match abi::decode_profile_return(raw) {
            Some(decoded) => decoded,
            None => {
                warn!("undecodable registry response on {} for {}", chain, address);
                return Ok(None);
            }
        };
        if !decoded.exists {
            return Ok(None);
        }

        let mut record = IdentityRecord {
            name: non_empty(decoded.name),
            avatar: non_empty(decoded.image_uri),
            bio: non_empty(decoded.bio),
            handles: Vec::new(),
        };
        if let (Some(platform), Some(name)) = (chain.social_platform(), record.name.clone()) {
            record.handles.push((platform.to_string(), name));
        }
        Ok(Some(record))
    }

    async fn list_nfts(
        &self,
        chain: SupportedChain,
        address: &str,
    ) -> PersonaResult<Vec<NftAsset>> {
        let url = self.nft_api_url(chain).ok_or_else(|| {
            PersonaError::UpstreamUnavailable("upstream API key not configured".to_string())
        })?;

        let response = self
            .client
            .get(&url)
            .query(&[
                ("owner", address),
                ("withMetadata", "true"),
                ("pageSize", &NFT_PAGE_SIZE.to_string()),
                ("excludeFilters[]", "SPAM"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                PersonaError::UpstreamUnavailable(format!(
                    "NFT query failed on {}: {}",
                    chain, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(PersonaError::UpstreamUnavailable(format!(
                "NFT query on {} returned status {}",
                chain,
                response.status()
            )));
        }

        let body: OwnedNftsResponse = response.json().await.map_err(|e| {
            PersonaError::UpstreamUnavailable(format!(
                "NFT query on {} returned malformed body: {}",
                chain, e
            ))
        })?;

        let total = body.owned_nfts.len();
        let assets: Vec<NftAsset> = body
            .owned_nfts
            .into_iter()
            .filter_map(|nft| nft.normalize(chain))
            .collect();
        if assets.len() < total {
            debug!(
                "dropped {} malformed NFT items on {} for {}",
                total - assets.len(),
                chain,
                address
            );
        }
        Ok(assets)
    }

    async fn list_token_balances(&self, address: &str) -> PersonaResult<Vec<RawTokenBalance>> {
        let result = self
            .rpc(
                SupportedChain::Ethereum,
                "alchemy_getTokenBalances",
                json!([address, "erc20"]),
            )
            .await?;

        let parsed: TokenBalancesResult = serde_json::from_value(result).map_err(|e| {
            PersonaError::UpstreamUnavailable(format!("malformed token balances response: {}", e))
        })?;
        Ok(parsed.token_balances)
    }

    async fn token_metadata(&self, contract_address: &str) -> PersonaResult<Option<TokenMetadata>> {
        let result = self
            .rpc(
                SupportedChain::Ethereum,
                "alchemy_getTokenMetadata",
                json!([contract_address]),
            )
            .await?;

        let parsed: TokenMetadata = serde_json::from_value(result).map_err(|e| {
            PersonaError::UpstreamUnavailable(format!("malformed token metadata response: {}", e))
        })?;
        Ok(Some(parsed))
    }

    async fn list_transfers(
        &self,
        address: &str,
        direction: TransferDirection,
    ) -> PersonaResult<Vec<RawTransfer>> {
        let mut params = json!({
            "fromBlock": "0x0",
            "toBlock": "latest",
            "category": ["external", "erc20", "erc721", "erc1155"],
            "withMetadata": true,
            "excludeZeroValue": false,
            "maxCount": format!("0x{:x}", MAX_TRANSFERS),
            "order": "desc",
        });
        match direction {
            TransferDirection::From => params["fromAddress"] = json!(address),
            TransferDirection::To => params["toAddress"] = json!(address),
        }

        let result = self
            .rpc(
                SupportedChain::Ethereum,
                "alchemy_getAssetTransfers",
                json!([params]),
            )
            .await?;

        let parsed: AssetTransfersResult = serde_json::from_value(result).map_err(|e| {
            PersonaError::UpstreamUnavailable(format!("malformed asset transfers response: {}", e))
        })?;
        Ok(parsed.transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlchemyClient {
        AlchemyClient::new(None, AlchemyNetwork::Mainnet).with_endpoint_override(server.uri())
    }

    #[tokio::test]
    async fn token_balances_parse_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/eth-mainnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1",
                    "tokenBalances": [
                        { "contractAddress": "0x1111", "tokenBalance": "0xde0b6b3a7640000" },
                        { "contractAddress": "0x2222", "tokenBalance": "0x0" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let balances = client_for(&server)
            .list_token_balances("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1")
            .await
            .unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].contract_address, "0x1111");
        assert_eq!(balances[0].token_balance.as_deref(), Some("0xde0b6b3a7640000"));
    }

    #[tokio::test]
    async fn rpc_error_object_maps_to_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/eth-mainnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "capacity exceeded" }
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .list_transfers(
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1",
                TransferDirection::From,
            )
            .await;

        assert!(matches!(result, Err(PersonaError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn nft_listing_drops_malformed_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nft/polygon-mainnet/getNFTsForOwner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ownedNfts": [
                    {
                        "contract": { "address": "0xc0ffee", "name": "Explorers" },
                        "tokenId": "1",
                        "name": "Explorer #1"
                    },
                    { "name": "no contract, no token id" }
                ],
                "totalCount": 2
            })))
            .mount(&server)
            .await;

        let assets = client_for(&server)
            .list_nfts(
                SupportedChain::Polygon,
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1",
            )
            .await
            .unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].chain, "Polygon");
        assert_eq!(assets[0].token_id, "1");
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_requests() {
        let client = AlchemyClient::new(None, AlchemyNetwork::Mainnet);
        assert!(!client.configured());
        let result = client
            .list_token_balances("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1")
            .await;
        assert!(matches!(result, Err(PersonaError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn identity_resolution_decodes_registry_call() {
        let server = MockServer::start().await;

        // (name="alice", bio="", imageUri="", exists=true)
        let mut ret = String::from("0x");
        let word = |v: &str| format!("{:0>64}", v);
        ret.push_str(&word("80"));
        ret.push_str(&word("c0"));
        ret.push_str(&word("e0"));
        ret.push_str(&word("1"));
        ret.push_str(&word("5"));
        ret.push_str(&format!("{:0<64}", hex::encode("alice")));
        ret.push_str(&word("0"));
        ret.push_str(&word("0"));

        Mock::given(method("POST"))
            .and(path("/rpc/eth-mainnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": ret
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).with_registry(
            SupportedChain::Ethereum,
            "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2".to_string(),
        );

        let record = client
            .resolve_identity(
                SupportedChain::Ethereum,
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1",
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.name.as_deref(), Some("alice"));
        assert_eq!(record.handles, vec![("ens".to_string(), "alice".to_string())]);
    }

    #[tokio::test]
    async fn chain_without_registry_resolves_no_identity() {
        let client = AlchemyClient::new(Some("key".to_string()), AlchemyNetwork::Mainnet);
        let record = client
            .resolve_identity(
                SupportedChain::Arbitrum,
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1",
            )
            .await
            .unwrap();
        assert!(record.is_none());
    }
}
