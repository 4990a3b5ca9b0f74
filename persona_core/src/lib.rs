pub mod aggregator;
pub mod cache;
pub mod error;
pub mod helpers;
pub mod upstream;
pub mod watcher;
