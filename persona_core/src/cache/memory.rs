use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStore;

/// In-process fallback store used when no Redis URL is configured. Same TTL
/// semantics as the distributed store so the aggregation service stays
/// store-agnostic. Expiry is lazy: checked on read, no eviction thread.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the entry only if it is still past its deadline. A `set` that
    /// landed between the expiry check and this call must not be deleted.
    async fn evict_if_expired(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if let Some((_, deadline)) = entries.get(key) {
            if *deadline <= Instant::now() {
                entries.remove(key);
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, deadline)) if *deadline > Instant::now() => {
                    return Some(value.clone())
                }
                None => return None,
                // expired, fall through to remove
                Some(_) => {}
            }
        }
        self.evict_if_expired(key).await;
        None
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), deadline));
        true
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
