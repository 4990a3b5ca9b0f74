pub mod abi;
pub mod alchemy;
pub mod chain;
pub mod dto;

pub use alchemy::AlchemyClient;
pub use chain::{AlchemyNetwork, SupportedChain};

use async_trait::async_trait;

use crate::error::PersonaResult;
use crate::helpers::dto::{IdentityRecord, NftAsset, TransferDirection};

use dto::{RawTokenBalance, RawTransfer, TokenMetadata};

/// Per-chain blockchain-data provider, injected into the aggregation service
/// so tests can substitute a mock.
///
/// Every call is a single sub-query: a failure is an error for that call
/// only, and callers isolate it per chain or per item.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// False when no credentials are configured; the service then serves
    /// placeholder data instead of issuing requests.
    fn configured(&self) -> bool;

    /// Identity record for the address on one chain, `None` when the chain
    /// has no record (or no registry to ask).
    async fn resolve_identity(
        &self,
        chain: SupportedChain,
        address: &str,
    ) -> PersonaResult<Option<IdentityRecord>>;

    /// NFTs owned by the address on one chain, spam-filtered, provider order.
    async fn list_nfts(
        &self,
        chain: SupportedChain,
        address: &str,
    ) -> PersonaResult<Vec<NftAsset>>;

    /// Raw fungible-token balances for the address.
    async fn list_token_balances(&self, address: &str) -> PersonaResult<Vec<RawTokenBalance>>;

    /// Symbol/decimals metadata for one token contract.
    async fn token_metadata(&self, contract_address: &str) -> PersonaResult<Option<TokenMetadata>>;

    /// Asset transfers where the address is the sender (`From`) or the
    /// recipient (`To`), bounded and in provider-native descending order.
    async fn list_transfers(
        &self,
        address: &str,
        direction: TransferDirection,
    ) -> PersonaResult<Vec<RawTransfer>>;
}
