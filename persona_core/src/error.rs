use thiserror::Error;

/// Failures that can surface from the aggregation layer.
///
/// Cache failures never show up here: an unreachable cache store is treated
/// as a miss and the request proceeds to upstream. Per-chain and per-item
/// failures are recovered where they happen; only a total fan-out failure
/// becomes an `UpstreamUnavailable` for the resource.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PersonaResult<T> = Result<T, PersonaError>;
