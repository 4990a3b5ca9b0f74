use async_trait::async_trait;
use log::{info, warn};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::CacheStore;

/// Redis-backed cache over a multiplexed async connection. Per-call failures
/// are logged and absorbed; a broken cache makes the service slower, not
/// broken.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut connection = self.connection.clone();
        match connection.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis GET failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let mut connection = self.connection.clone();
        match connection.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Redis SETEX failed for {}: {}", key, e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) {
        let mut connection = self.connection.clone();
        if let Err(e) = connection.del::<_, ()>(key).await {
            warn!("Redis DEL failed for {}: {}", key, e);
        }
    }
}
