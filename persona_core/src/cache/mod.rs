pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use async_trait::async_trait;

/// Key-value store with per-key TTL, used to memoize upstream results.
///
/// Caching is a performance optimization, not a correctness requirement:
/// none of these operations propagate store failures. A broken store reads
/// as a miss and the aggregation service falls through to upstream.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Absent on miss, expiry, or store failure.
    async fn get(&self, key: &str) -> Option<String>;

    /// False on store failure; the caller proceeds either way.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool;

    /// Immediate removal, used for invalidation.
    async fn delete(&self, key: &str);
}

/// Cache key scheme, one namespace per resource type.
pub mod keys {
    pub fn profile(address: &str) -> String {
        format!("profile:{}", address)
    }

    pub fn nfts(address: &str) -> String {
        format!("nfts:{}", address)
    }

    pub fn activity(address: &str) -> String {
        format!("activity:{}", address)
    }

    pub fn balances(address: &str) -> String {
        format!("balances:{}", address)
    }

    pub fn social(address: &str) -> String {
        format!("social:{}", address)
    }

    /// Every key invalidation must clear for an address.
    pub fn all(address: &str) -> [String; 5] {
        [
            profile(address),
            nfts(address),
            activity(address),
            balances(address),
            social(address),
        ]
    }
}
