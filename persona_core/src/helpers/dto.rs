use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unified identity for an address, merged from per-chain lookups.
///
/// `social_handles` is a `BTreeMap` so serialization order is deterministic
/// and repeated cache hits stay byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub address: String,
    pub ens_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub social_handles: BTreeMap<String, String>,
    /// The on-chain profile registry knows this address.
    pub registry_verified: bool,
    /// At least two independent social handles were found.
    pub socially_verified: bool,
}

impl Profile {
    /// Empty, unverified profile. Served when the upstream is unconfigured.
    pub fn placeholder(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ens_name: None,
            avatar: None,
            bio: None,
            social_handles: BTreeMap::new(),
            registry_verified: false,
            socially_verified: false,
        }
    }

    /// Merges per-chain identity records. First record in chain order wins
    /// for name/avatar/bio; handles are unioned across all records.
    pub fn merge(address: &str, records: Vec<IdentityRecord>) -> Self {
        let mut profile = Self::placeholder(address);

        for record in records {
            if profile.ens_name.is_none() {
                profile.ens_name = record.name;
            }
            if profile.avatar.is_none() {
                profile.avatar = record.avatar;
            }
            if profile.bio.is_none() {
                profile.bio = record.bio;
            }
            for (platform, handle) in record.handles {
                profile.social_handles.entry(platform).or_insert(handle);
            }
            profile.registry_verified = true;
        }

        profile.socially_verified = profile.social_handles.len() >= 2;
        profile
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: String,
}

/// One owned NFT, scoped to the chain it was found on. Tokens with the same
/// contract and id on different chains are distinct assets, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftAsset {
    pub chain: String,
    pub contract_address: String,
    pub token_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
    pub collection_name: Option<String>,
    pub attributes: Vec<NftAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Send,
    Receive,
    Mint,
    Swap,
    Stake,
    External,
    Other,
}

/// One transfer in an address's activity feed. The same transaction hash may
/// appear once per direction view (sender and receiver) since `to` differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub transaction_hash: String,
    pub block_number: u64,
    pub from: String,
    pub to: Option<String>,
    pub value: Option<f64>,
    pub asset: Option<String>,
    pub category: ActivityCategory,
    pub timestamp_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub contract_address: String,
    pub symbol: Option<String>,
    /// Decimal string, already adjusted for token decimals.
    pub balance: String,
    pub decimals: u8,
    /// No price feed is wired up; kept for the front-end contract.
    pub usd_value: Option<f64>,
}

/// One chain's identity-resolution result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityRecord {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub handles: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    From,
    To,
}
