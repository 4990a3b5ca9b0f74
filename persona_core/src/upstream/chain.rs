use std::fmt;

/// Chains the aggregator fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedChain {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlchemyNetwork {
    Mainnet,
    Testnet,
}

impl AlchemyNetwork {
    pub fn from_env_value(value: &str) -> Self {
        match value {
            "mainnet" => Self::Mainnet,
            "testnet" | "sepolia" => Self::Testnet,
            _ => Self::Testnet,
        }
    }
}

impl SupportedChain {
    pub const ALL: [SupportedChain; 4] = [
        SupportedChain::Ethereum,
        SupportedChain::Polygon,
        SupportedChain::Arbitrum,
        SupportedChain::Optimism,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SupportedChain::Ethereum => "Ethereum",
            SupportedChain::Polygon => "Polygon",
            SupportedChain::Arbitrum => "Arbitrum",
            SupportedChain::Optimism => "Optimism",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            SupportedChain::Ethereum => 1,
            SupportedChain::Polygon => 137,
            SupportedChain::Arbitrum => 42161,
            SupportedChain::Optimism => 10,
        }
    }

    /// Alchemy endpoint subdomain for the selected network.
    pub fn subdomain(&self, network: AlchemyNetwork) -> &'static str {
        match (self, network) {
            (SupportedChain::Ethereum, AlchemyNetwork::Mainnet) => "eth-mainnet",
            (SupportedChain::Ethereum, AlchemyNetwork::Testnet) => "eth-sepolia",
            (SupportedChain::Polygon, AlchemyNetwork::Mainnet) => "polygon-mainnet",
            (SupportedChain::Polygon, AlchemyNetwork::Testnet) => "polygon-amoy",
            (SupportedChain::Arbitrum, AlchemyNetwork::Mainnet) => "arb-mainnet",
            (SupportedChain::Arbitrum, AlchemyNetwork::Testnet) => "arb-sepolia",
            (SupportedChain::Optimism, AlchemyNetwork::Mainnet) => "opt-mainnet",
            (SupportedChain::Optimism, AlchemyNetwork::Testnet) => "opt-sepolia",
        }
    }

    /// Name service whose record doubles as a social handle on this chain:
    /// ENS on Ethereum, Lens on Polygon, Farcaster on Optimism.
    pub fn social_platform(&self) -> Option<&'static str> {
        match self {
            SupportedChain::Ethereum => Some("ens"),
            SupportedChain::Polygon => Some("lens"),
            SupportedChain::Optimism => Some("farcaster"),
            SupportedChain::Arbitrum => None,
        }
    }

    /// Parses the `?chain=` query filter value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Some(SupportedChain::Ethereum),
            "polygon" | "matic" => Some(SupportedChain::Polygon),
            "arbitrum" | "arb" => Some(SupportedChain::Arbitrum),
            "optimism" | "opt" => Some(SupportedChain::Optimism),
            _ => None,
        }
    }
}

impl fmt::Display for SupportedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
