//! Heuristic transfer classification.
//!
//! Known limitation: this only matches the counterparty address against
//! static allow-lists. It never inspects transaction input data or logs, so
//! a swap through an unlisted router shows up as a plain send and a receive
//! from an unlisted pool as a plain receive.

use crate::helpers::dto::ActivityCategory;
use crate::upstream::dto::TransferKind;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Known DEX router contracts (Ethereum mainnet), lowercase.
const DEX_ROUTERS: [&str; 6] = [
    // Uniswap v2 router 02
    "0x7a250d5630b4cf539739df2c5dacb4c659f2488d",
    // Uniswap v3 swap router
    "0xe592427a0aece92de3edee1f18e0157c05861564",
    // Uniswap universal router
    "0x3fc91a3afd70395cd496c647d5a6cc9d4b2b7fad",
    // SushiSwap router
    "0xd9e1ce17f2641f24ae83637ab66a2cca9c378b9f",
    // 1inch v5 aggregation router
    "0x1111111254eeb25477b68fb85ed929f73a960582",
    // 0x exchange proxy
    "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
];

/// Known staking contracts (Ethereum mainnet), lowercase.
const STAKING_CONTRACTS: [&str; 3] = [
    // Lido stETH
    "0xae7ab96520de3a18e5e111b5eaab095312d7fe84",
    // Rocket Pool deposit pool
    "0xdd3f50f8a6cafbe9b31a427582963f465e745af8",
    // Beacon chain deposit contract
    "0x00000000219ab540356cbb839cbe05303d7705fa",
];

/// Assigns a category to one transfer as seen from `address`'s feed.
///
/// NFT transfers classify by direction, with a receive from the zero address
/// reported as a mint. Fungible transfers check the counterparty against the
/// DEX and staking allow-lists before falling back to direction. Native
/// transfers are `External`, and a transfer whose provider category was not
/// recognized (`kind == None`) is flagged `Other` rather than dropped.
pub fn classify(
    kind: Option<TransferKind>,
    from: &str,
    to: Option<&str>,
    address: &str,
) -> ActivityCategory {
    let kind = match kind {
        Some(kind) => kind,
        None => return ActivityCategory::Other,
    };

    let address = address.to_ascii_lowercase();
    let from = from.to_ascii_lowercase();
    let to = to.map(|to| to.to_ascii_lowercase());
    let outgoing = from == address;

    match kind {
        TransferKind::Erc721 | TransferKind::Erc1155 => {
            if outgoing {
                ActivityCategory::Send
            } else if from == ZERO_ADDRESS {
                ActivityCategory::Mint
            } else {
                ActivityCategory::Receive
            }
        }
        TransferKind::Erc20 => {
            let counterparty = if outgoing {
                to.as_deref().unwrap_or_default()
            } else {
                from.as_str()
            };
            if DEX_ROUTERS.contains(&counterparty) {
                ActivityCategory::Swap
            } else if STAKING_CONTRACTS.contains(&counterparty) {
                ActivityCategory::Stake
            } else if outgoing {
                ActivityCategory::Send
            } else {
                ActivityCategory::Receive
            }
        }
        TransferKind::External | TransferKind::Internal => ActivityCategory::External,
    }
}
