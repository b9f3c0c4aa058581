//! Bounded plan stores
//!
//! The eviction policy behind a [`super::QueryCache`] is pluggable: anything
//! implementing [`PlanStore`] can hold plans. Two policies ship with the
//! crate, recency ([`LruStore`]) and frequency ([`LfuStore`]).

use lru::LruCache;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::Fingerprint;
use crate::plan::QueryPlan;

/// Storage and eviction policy for cached plans
pub trait PlanStore: Send {
    /// Look up a plan, recording the access
    fn get(&mut self, key: &Fingerprint) -> Option<Arc<QueryPlan>>;

    /// Insert or replace a plan, evicting another one when full
    fn put(&mut self, key: Fingerprint, plan: Arc<QueryPlan>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn clear(&mut self);
}

/// Least recently used eviction
pub struct LruStore {
    entries: LruCache<Fingerprint, Arc<QueryPlan>>,
}

impl LruStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }
}

impl PlanStore for LruStore {
    fn get(&mut self, key: &Fingerprint) -> Option<Arc<QueryPlan>> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: Fingerprint, plan: Arc<QueryPlan>) {
        if let Some((evicted, _)) = self.entries.push(key.clone(), plan) {
            if evicted != key {
                tracing::trace!(fingerprint = %evicted, "Evicted plan");
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

struct LfuEntry {
    plan: Arc<QueryPlan>,
    hits: u64,
    tick: u64,
}

/// Least frequently used eviction
///
/// Ties are broken by recency: among equally used plans the one touched
/// longest ago goes first.
pub struct LfuStore {
    capacity: NonZeroUsize,
    entries: HashMap<Fingerprint, LfuEntry>,
    /// `(hits, tick, key)` ordered so the first element is the victim
    order: BTreeSet<(u64, u64, Fingerprint)>,
    tick: u64,
}

impl LfuStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.get()),
            order: BTreeSet::new(),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict(&mut self) {
        if let Some(victim) = self.order.pop_first() {
            let (hits, _, key) = victim;
            self.entries.remove(&key);
            tracing::trace!(fingerprint = %key, hits, "Evicted plan");
        }
    }
}

impl PlanStore for LfuStore {
    fn get(&mut self, key: &Fingerprint) -> Option<Arc<QueryPlan>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;

        self.order.remove(&(entry.hits, entry.tick, key.clone()));
        entry.hits += 1;
        entry.tick = tick;
        self.order.insert((entry.hits, entry.tick, key.clone()));
        Some(Arc::clone(&entry.plan))
    }

    fn put(&mut self, key: Fingerprint, plan: Arc<QueryPlan>) {
        let tick = self.next_tick();

        if let Some(entry) = self.entries.get_mut(&key) {
            self.order.remove(&(entry.hits, entry.tick, key.clone()));
            entry.plan = plan;
            entry.tick = tick;
            self.order.insert((entry.hits, entry.tick, key));
            return;
        }

        if self.entries.len() >= self.capacity.get() {
            self.evict();
        }
        self.order.insert((0, tick, key.clone()));
        self.entries.insert(key, LfuEntry { plan, hits: 0, tick });
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
