use std::{env, sync::Arc};

use axum::{Router, routing::get};
use log::{info, warn};
use persona_core::aggregator::AggregationService;
use persona_core::cache::{CacheStore, MemoryCache, RedisCache};
use persona_core::helpers::dto::ActivityEntry;
use persona_core::upstream::{AlchemyClient, AlchemyNetwork, SupportedChain};
use persona_core::watcher::ActivityWatcher;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::{
    activity::handler::activity,
    balances::handler::balances,
    docs::{dto::ApiDoc, handler::api_docs},
    info::handler::info,
    nfts::handler::nfts,
    profile::handler::profile,
    state::ServerState,
};

pub async fn router() -> anyhow::Result<Router> {
    let network = env::var("ALCHEMY_NETWORK").unwrap_or("mainnet".to_string());
    let network = AlchemyNetwork::from_env_value(&network);

    let api_key = env::var("ALCHEMY_API_KEY").ok();
    if api_key.is_none() {
        warn!("ALCHEMY_API_KEY not set; serving placeholder data");
    }

    let mut upstream = AlchemyClient::new(api_key, network);
    if let Ok(registry) = env::var("PROFILE_REGISTRY_ADDRESS") {
        upstream = upstream.with_registry(SupportedChain::Ethereum, registry);
    }

    let cache: Arc<dyn CacheStore> = match env::var("REDIS_URL") {
        Ok(redis_url) => match RedisCache::connect(&redis_url).await {
            Ok(redis) => {
                info!("connected to redis at {}", redis_url);
                Arc::new(redis)
            }
            Err(e) => {
                warn!("redis unavailable ({}); using in-process cache", e);
                Arc::new(MemoryCache::new())
            }
        },
        Err(_) => {
            info!("REDIS_URL not set; using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let aggregator = Arc::new(AggregationService::new(cache, Arc::new(upstream)));
    let watcher = Arc::new(ActivityWatcher::new(aggregator.clone()));

    if let Ok(watch_addresses) = env::var("WATCH_ADDRESSES") {
        for address in watch_addresses.split(',').map(str::trim) {
            if address.is_empty() {
                continue;
            }
            match watcher.subscribe(address) {
                Ok(mut receiver) => {
                    let address = address.to_string();
                    tokio::spawn(async move {
                        log_refreshes(&address, &mut receiver).await;
                    });
                }
                Err(e) => warn!("cannot watch {}: {}", address, e),
            }
        }
    }

    let state = Arc::new(ServerState::from((aggregator, watcher)));

    let doc = ApiDoc::openapi();

    Ok(Router::new()
        .merge(Redoc::with_url("/redoc", doc))
        .route("/", get(info))
        .route("/docs", get(api_docs))
        .route("/profile/{address}", get(profile))
        .route("/nfts/{address}", get(nfts))
        .route("/activity/{address}", get(activity))
        .route("/balances/{address}", get(balances))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Logs refresh broadcasts for one watched address until the channel closes.
/// A lagged receiver skips the missed feeds and keeps listening instead of
/// dying on the first overflow.
async fn log_refreshes(
    address: &str,
    receiver: &mut broadcast::Receiver<Vec<ActivityEntry>>,
) -> usize {
    let mut processed = 0;
    loop {
        match receiver.recv().await {
            Ok(feed) => {
                processed += 1;
                info!("activity refresh for {}: {} entries", address, feed.len());
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("refresh log for {} lagged by {} updates", address, missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    processed
}
