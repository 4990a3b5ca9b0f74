pub mod classify;
pub mod service;

pub use service::{AggregationService, CachePolicy};
