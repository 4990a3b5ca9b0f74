use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregator::AggregationService;
use crate::error::PersonaResult;
use crate::helpers::dto::ActivityEntry;
use crate::helpers::utils::normalize_address;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const CHANNEL_CAPACITY: usize = 16;

struct Subscription {
    sender: broadcast::Sender<Vec<ActivityEntry>>,
    listeners: usize,
    task: JoinHandle<()>,
}

/// Polling stand-in for block subscriptions. One background task per
/// watched address compares activity snapshots on an interval and, when
/// the feed changed, invalidates the cache and broadcasts the fresh feed
/// to every subscriber of that address.
pub struct ActivityWatcher {
    aggregator: Arc<AggregationService>,
    interval: Duration,
    subscriptions: DashMap<String, Subscription>,
}

impl ActivityWatcher {
    pub fn new(aggregator: Arc<AggregationService>) -> Self {
        Self::with_interval(aggregator, POLL_INTERVAL)
    }

    pub fn with_interval(aggregator: Arc<AggregationService>, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
            subscriptions: DashMap::new(),
        }
    }

    /// Starts watching the address if it is not watched yet and returns a
    /// receiver for change notifications. Additional subscribers to the
    /// same address share one polling task.
    pub fn subscribe(
        &self,
        address: &str,
    ) -> PersonaResult<broadcast::Receiver<Vec<ActivityEntry>>> {
        let address = normalize_address(address)?;
        match self.subscriptions.entry(address.clone()) {
            Entry::Occupied(mut entry) => {
                let subscription = entry.get_mut();
                subscription.listeners += 1;
                Ok(subscription.sender.subscribe())
            }
            Entry::Vacant(entry) => {
                let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
                let task = tokio::spawn(poll_loop(
                    self.aggregator.clone(),
                    address.clone(),
                    self.interval,
                    sender.clone(),
                ));
                entry.insert(Subscription {
                    sender,
                    listeners: 1,
                    task,
                });
                info!("watching activity for {}", address);
                Ok(receiver)
            }
        }
    }

    /// Drops one listener for the address. The polling task stops when the
    /// last listener unsubscribes.
    pub fn unsubscribe(&self, address: &str) -> PersonaResult<()> {
        let address = normalize_address(address)?;
        let drained = match self.subscriptions.get_mut(&address) {
            Some(mut subscription) => {
                subscription.listeners = subscription.listeners.saturating_sub(1);
                subscription.listeners == 0
            }
            None => return Ok(()),
        };
        if drained {
            if let Some((_, subscription)) = self.subscriptions.remove(&address) {
                subscription.task.abort();
                info!("stopped watching activity for {}", address);
            }
        }
        Ok(())
    }

    /// Number of addresses with an active polling task.
    pub fn watched(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for ActivityWatcher {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.value().task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WatchState {
    Idle,
    Polling,
    Invalidating,
}

async fn poll_loop(
    aggregator: Arc<AggregationService>,
    address: String,
    interval: Duration,
    sender: broadcast::Sender<Vec<ActivityEntry>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // First tick fires immediately and establishes the baseline snapshot.
    let mut last_seen: Option<(Option<String>, usize)> = None;

    loop {
        ticker.tick().await;
        debug!("watcher {}: {:?}", address, WatchState::Polling);

        let feed = match aggregator.get_activity_feed(&address).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!("watcher poll failed for {}: {}", address, e);
                continue;
            }
        };

        let current = fingerprint(&feed);
        let changed = match &last_seen {
            Some(previous) => *previous != current,
            None => false,
        };
        let baseline = last_seen.is_none();
        last_seen = Some(current);

        if baseline || !changed {
            debug!("watcher {}: {:?}", address, WatchState::Idle);
            continue;
        }

        debug!("watcher {}: {:?}", address, WatchState::Invalidating);
        if let Err(e) = aggregator.invalidate(&address).await {
            warn!("watcher invalidation failed for {}: {}", address, e);
        }
        match aggregator.get_activity_feed(&address).await {
            Ok(fresh) => {
                last_seen = Some(fingerprint(&fresh));
                // No receivers is fine; the task keeps its snapshot current.
                let _ = sender.send(fresh);
            }
            Err(e) => warn!("watcher refetch failed for {}: {}", address, e),
        }
    }
}

fn fingerprint(feed: &[ActivityEntry]) -> (Option<String>, usize) {
    (
        feed.first().map(|entry| entry.transaction_hash.clone()),
        feed.len(),
    )
}
