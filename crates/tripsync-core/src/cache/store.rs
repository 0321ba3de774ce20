use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::keys::CacheKey;

/// Smallest period the cleanup task will tick at.
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(10);

/// Store-wide settings, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
    pub cleanup_interval: Duration,
    /// Share of `max_entries` dropped when a new key arrives at capacity.
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            default_ttl: Duration::from_secs(10 * 60),
            cleanup_interval: Duration::from_secs(60),
            eviction_fraction: 0.1,
        }
    }
}

impl CacheConfig {
    fn eviction_batch(&self) -> usize {
        let batch = (self.max_entries as f64 * self.eviction_fraction).ceil() as usize;
        batch.clamp(1, self.max_entries.max(1))
    }
}

/// Approximate memory weight of a cached value.
pub trait CacheWeight {
    fn weight(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl CacheWeight for String {
    fn weight(&self) -> usize {
        std::mem::size_of::<String>() + self.len()
    }
}

impl CacheWeight for u32 {}
impl CacheWeight for u64 {}

#[derive(Debug)]
struct CacheEntry<V> {
    data: V,
    created_at: Instant,
    ttl: Option<Duration>,
    access_count: u64,
    last_accessed_at: Instant,
    /// Strictly increasing touch counter; breaks ties between equal instants.
    access_seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

struct StoreInner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    seq: u64,
    hits: u64,
    misses: u64,
}

impl<V> StoreInner<V> {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Diagnostic snapshot. Approximate; never drive correctness from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub estimated_memory: usize,
}

/// Bounded key/value store with TTL expiry and LRU eviction.
///
/// Reads check expiry themselves, so an expired value is never returned even
/// if the background sweep has not run yet. Nothing here fails: absence is a
/// miss and capacity pressure evicts silently.
pub struct CacheStore<V> {
    config: CacheConfig,
    inner: Mutex<StoreInner<V>>,
}

impl<V> CacheStore<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                seq: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite `key`, stamping its creation time.
    pub fn set(&self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_entries {
            self.evict_lru(&mut inner);
        }

        let seq = inner.next_seq();
        trace!(key = %key, "cache set");
        inner.entries.insert(
            key,
            CacheEntry {
                data: value,
                created_at: now,
                ttl,
                access_count: 0,
                last_accessed_at: now,
                access_seq: seq,
            },
        );
    }

    /// Remove up to one eviction batch, least recently used first. Returns
    /// how many entries were actually removed.
    fn evict_lru(&self, inner: &mut StoreInner<V>) -> usize {
        let batch = self.config.eviction_batch();
        let mut by_age: Vec<(u64, CacheKey)> = inner
            .entries
            .iter()
            .map(|(k, e)| (e.access_seq, k.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        let mut evicted = 0;
        for (_, key) in by_age.into_iter().take(batch) {
            if inner.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }
        debug!(
            evicted,
            batch,
            remaining = inner.entries.len(),
            "cache at capacity, evicted least recently used"
        );
        evicted
    }

    /// Shared read path for `get` and `has` so both update stats identically.
    fn lookup<R>(&self, key: &CacheKey, ttl: Option<Duration>, read: impl FnOnce(&V) -> R) -> Option<R> {
        let now = Instant::now();
        let mut inner = self.lock();
        let seq = inner.next_seq();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                trace!(key = %key, "cache miss");
                return None;
            }
            Some(entry) => {
                let ttl = ttl.or(entry.ttl).unwrap_or(self.config.default_ttl);
                entry.is_expired(now, ttl)
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            trace!(key = %key, "cache entry expired on read");
            return None;
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_accessed_at = now;
        entry.access_seq = seq;
        trace!(key = %key, hits = entry.access_count, "cache hit");
        Some(read(&entry.data))
    }

    pub fn has(&self, key: &CacheKey, ttl: Option<Duration>) -> bool {
        self.lookup(key, ttl, |_| ()).is_some()
    }

    pub fn delete(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drop everything (`None`) or every key within `scope`.
    pub fn invalidate(&self, scope: Option<&CacheKey>) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        match scope {
            None => inner.entries.clear(),
            Some(scope) => inner.entries.retain(|k, _| !k.is_within(scope)),
        }
        let removed = before - inner.entries.len();
        debug!(scope = ?scope.map(CacheKey::as_str), removed, "cache invalidated");
        removed
    }

    pub fn clear(&self) {
        self.invalidate(None);
    }

    /// Remove entries older than their TTL. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let default_ttl = self.config.default_ttl;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| !e.is_expired(now, e.ttl.unwrap_or(default_ttl)));
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage counters for a key: `(access_count, last_accessed_at)`.
    pub fn access_info(&self, key: &CacheKey) -> Option<(u64, Instant)> {
        self.lock()
            .entries
            .get(key)
            .map(|e| (e.access_count, e.last_accessed_at))
    }
}

impl<V: Clone> CacheStore<V> {
    pub fn get(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<V> {
        self.lookup(key, ttl, V::clone)
    }
}

impl<V: CacheWeight> CacheStore<V> {
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.hits + inner.misses;
        let estimated_memory = inner
            .entries
            .iter()
            .map(|(k, e)| k.as_str().len() + std::mem::size_of::<CacheEntry<()>>() + e.data.weight())
            .sum();

        CacheStats {
            size: inner.entries.len(),
            max_size: self.config.max_entries,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            estimated_memory,
        }
    }
}

/// Handle to the periodic sweep; aborts the task when dropped.
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl CleanupTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<V: Send + 'static> CacheStore<V> {
    /// Start the recurring expiry sweep on the current tokio runtime.
    ///
    /// The task only holds a weak reference and exits once the store is gone.
    pub fn spawn_cleanup(self: &Arc<Self>) -> CleanupTask {
        let store = Arc::downgrade(self);
        let period = self.config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("cache dropped, stopping cleanup");
                    break;
                };
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "cache cleanup swept expired entries");
                }
            }
        });

        CleanupTask { handle }
    }
}

// ============================================================================
// Tests
// ============================================================================
