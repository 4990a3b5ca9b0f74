//! Provider wire shapes. Normalization into the domain model happens here,
//! at the boundary, and fails closed: items with an unrecognized shape are
//! dropped with a log instead of passed through.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::dto::{NftAsset, NftAttribute};

use super::chain::SupportedChain;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u32,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// `alchemy_getTokenBalances` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalancesResult {
    pub address: String,
    #[serde(default)]
    pub token_balances: Vec<RawTokenBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    pub contract_address: String,
    /// Hex-encoded uint256.
    pub token_balance: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `alchemy_getTokenMetadata` result.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub logo: Option<String>,
}

/// `alchemy_getAssetTransfers` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfersResult {
    #[serde(default)]
    pub transfers: Vec<RawTransfer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    pub hash: String,
    /// Hex block number.
    pub block_num: String,
    pub from: String,
    pub to: Option<String>,
    pub value: Option<f64>,
    pub asset: Option<String>,
    pub category: String,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub block_timestamp: Option<String>,
}

/// Provider transfer categories as a closed set. Anything the provider sends
/// outside this set stays unclassified (`None`) and is flagged downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    External,
    Internal,
    Erc20,
    Erc721,
    Erc1155,
}

impl TransferKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "external" => Some(Self::External),
            "internal" => Some(Self::Internal),
            "erc20" => Some(Self::Erc20),
            "erc721" | "specialnft" => Some(Self::Erc721),
            "erc1155" => Some(Self::Erc1155),
            _ => None,
        }
    }

    pub fn is_nft(&self) -> bool {
        matches!(self, Self::Erc721 | Self::Erc1155)
    }
}

/// NFT API v3 `getNFTsForOwner` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNftsResponse {
    #[serde(default)]
    pub owned_nfts: Vec<OwnedNft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNft {
    pub contract: Option<NftContract>,
    pub token_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<NftImage>,
    pub raw: Option<NftRawData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftContract {
    pub address: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftImage {
    pub cached_url: Option<String>,
    pub original_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NftRawData {
    pub metadata: Option<NftRawMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct NftRawMetadata {
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl OwnedNft {
    /// Normalizes one owned NFT, tagging it with its source chain. Items
    /// without a contract address or token id are dropped.
    pub fn normalize(self, chain: SupportedChain) -> Option<NftAsset> {
        let contract = self.contract?;
        let contract_address = contract.address?;
        let token_id = self.token_id?;

        let image_uri = self
            .image
            .and_then(|image| image.cached_url.or(image.original_url));
        let attributes = self
            .raw
            .and_then(|raw| raw.metadata)
            .and_then(|metadata| metadata.attributes)
            .map(parse_attributes)
            .unwrap_or_default();

        Some(NftAsset {
            chain: chain.name().to_string(),
            contract_address,
            token_id,
            name: self.name,
            description: self.description,
            image_uri,
            collection_name: contract.name,
            attributes,
        })
    }
}

/// Raw metadata attributes come back in loose shapes; keep the entries that
/// look like `{trait_type, value}` and stringify scalar values.
fn parse_attributes(raw: Value) -> Vec<NftAttribute> {
    let entries = match raw {
        Value::Array(entries) => entries,
        other => {
            debug!("ignoring non-array NFT attributes: {}", other);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let object = entry.as_object()?;
            let trait_type = object.get("trait_type")?.as_str()?.to_string();
            let value = match object.get("value")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(NftAttribute { trait_type, value })
        })
        .collect()
}
