use std::sync::Arc;

use persona_core::aggregator::AggregationService;
use persona_core::watcher::ActivityWatcher;

#[derive(Clone)]
pub struct ServerState {
    aggregator: Arc<AggregationService>,
    watcher: Arc<ActivityWatcher>,
}

impl From<(Arc<AggregationService>, Arc<ActivityWatcher>)> for ServerState {
    fn from(states: (Arc<AggregationService>, Arc<ActivityWatcher>)) -> Self {
        let (aggregator, watcher) = states;
        Self { aggregator, watcher }
    }
}

impl ServerState {
    pub fn aggregator(&self) -> &AggregationService {
        &self.aggregator
    }

    pub fn watcher(&self) -> &ActivityWatcher {
        &self.watcher
    }
}
