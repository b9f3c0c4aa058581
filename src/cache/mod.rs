//! Query plan caching
//!
//! - **QueryCache**: Fingerprint-keyed cache of assembled plans with hit/miss counters
//! - **Store**: Pluggable bounded eviction policies (LRU, LFU)

mod query_cache;
mod store;

pub use query_cache::{CacheStats, Fingerprint, QueryCache, RequestMethod};
pub use store::{LfuStore, LruStore, PlanStore};
