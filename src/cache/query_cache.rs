//! Query plan cache
//!
//! One cache per schema. Plans are keyed by a [`Fingerprint`] of the schema
//! name, the raw query text and the caller's base query. The store is guarded
//! by a mutex, but compilation runs outside it: two concurrent misses for the
//! same key both compile and the later write simply replaces the earlier one.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::store::{LfuStore, LruStore, PlanStore};
use crate::config::{CacheConfig, CachePolicy};
use crate::plan::{BaseQuery, QueryPlan};

/// Cache key of a compiled plan
///
/// Hashing uses the precomputed digest while equality compares the full
/// key, so requests whose digests collide never share a plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fingerprint {
    digest: u64,
    key: Arc<FingerprintKey>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FingerprintKey {
    schema: String,
    query: String,
    base: String,
}

impl Fingerprint {
    /// Key of `query` against `schema` under the caller's base query
    pub fn new(schema: &str, query: &str, base: &BaseQuery) -> serde_json::Result<Self> {
        let base = serde_json::to_string(base)?;

        let mut hasher = DefaultHasher::new();
        schema.hash(&mut hasher);
        query.hash(&mut hasher);
        base.hash(&mut hasher);
        Ok(Self::with_digest(hasher.finish(), schema, query, base))
    }

    pub(crate) fn with_digest(digest: u64, schema: &str, query: &str, base: String) -> Self {
        Self {
            digest,
            key: Arc::new(FingerprintKey {
                schema: schema.to_string(),
                query: query.to_string(),
                base,
            }),
        }
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.digest)
    }
}

/// Request method of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl RequestMethod {
    /// Only read-only requests may be served from the cache
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }
}

impl FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown request method: {}", other)),
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits, {} misses ({:.1}% hit rate), {}/{} entries",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.entries,
            self.capacity
        )
    }
}

/// Thread-safe bounded cache of query plans
pub struct QueryCache {
    store: Mutex<Box<dyn PlanStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Create a cache over any store
    pub fn with_store(store: impl PlanStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache with a built-in policy
    pub fn new(policy: CachePolicy, capacity: NonZeroUsize) -> Self {
        match policy {
            CachePolicy::Lru => Self::with_store(LruStore::new(capacity)),
            CachePolicy::Lfu => Self::with_store(LfuStore::new(capacity)),
        }
    }

    /// Create a cache from configuration, `None` when caching is off
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let capacity = NonZeroUsize::new(config.capacity)?;
        Some(Self::new(config.policy, capacity))
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Arc<QueryPlan>> {
        let plan = self.store.lock().get(key);
        match &plan {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(fingerprint = %key, "Plan cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(fingerprint = %key, "Plan cache miss");
            }
        }
        plan
    }

    pub fn put(&self, key: Fingerprint, plan: Arc<QueryPlan>) {
        self.store.lock().put(key, plan);
    }

    /// Return the cached plan or compute, store and return a new one
    ///
    /// `compute` runs without holding the lock. Errors are not cached.
    pub fn get_or_try_insert_with<E, F>(
        &self,
        key: Fingerprint,
        compute: F,
    ) -> Result<Arc<QueryPlan>, E>
    where
        F: FnOnce() -> Result<QueryPlan, E>,
    {
        if let Some(plan) = self.get(&key) {
            return Ok(plan);
        }

        let plan = Arc::new(compute()?);
        self.put(key, Arc::clone(&plan));
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached plan; counters are kept
    pub fn clear(&self) {
        self.store.lock().clear();
        tracing::debug!("Cleared plan cache");
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.store.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: store.len(),
            capacity: store.capacity(),
        }
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish()
    }
}
