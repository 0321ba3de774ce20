//! Typed views over the shared store, one per cached domain.
//!
//! Facades own no state beyond their key scheme and TTL. Every read and
//! write goes through [`CacheStore`], so expiry and eviction apply uniformly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::keys::{search_key, CacheKey};
use super::store::{CacheStore, CacheWeight};
use crate::models::{ArchivedList, Coordinates, Place, Schedule, ScheduleRequest};

/// Everything the shared store can hold.
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Places(Arc<Vec<Place>>),
    Place(Arc<Place>),
    Lists(Arc<Vec<ArchivedList>>),
    Schedule(Arc<Schedule>),
}

impl CachedPayload {
    fn kind(&self) -> &'static str {
        match self {
            CachedPayload::Places(_) => "places",
            CachedPayload::Place(_) => "place",
            CachedPayload::Lists(_) => "lists",
            CachedPayload::Schedule(_) => "schedule",
        }
    }
}

impl CacheWeight for CachedPayload {
    fn weight(&self) -> usize {
        match self {
            CachedPayload::Places(places) => places.iter().map(Place::approx_size).sum(),
            CachedPayload::Place(place) => place.approx_size(),
            CachedPayload::Lists(lists) => lists.iter().map(ArchivedList::approx_size).sum(),
            CachedPayload::Schedule(schedule) => schedule.approx_size(),
        }
    }
}

pub type SharedCache = Arc<CacheStore<CachedPayload>>;

/// Per-domain lifetimes.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    pub search: Duration,
    pub lists: Duration,
    pub place_details: Duration,
    pub schedules: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            // Opening hours and availability drift quickly
            search: Duration::from_secs(5 * 60),
            lists: Duration::from_secs(30 * 60),
            place_details: Duration::from_secs(60 * 60),
            schedules: Duration::from_secs(60 * 60),
        }
    }
}

fn mismatch(key: &CacheKey, found: &CachedPayload, expected: &str) {
    warn!(key = %key, found = found.kind(), expected, "cache payload type mismatch, treating as miss");
}

// ===== Search results =====

#[derive(Clone)]
pub struct SearchCache {
    store: SharedCache,
    ttl: Duration,
    precision: u32,
}

impl SearchCache {
    pub fn new(store: SharedCache, ttl: Duration, precision: u32) -> Self {
        Self {
            store,
            ttl,
            precision,
        }
    }

    pub fn key(&self, query: &str, center: Option<Coordinates>) -> CacheKey {
        search_key(query, center, self.precision)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Place>>> {
        match self.store.get(key, Some(self.ttl))? {
            CachedPayload::Places(places) => Some(places),
            other => {
                mismatch(key, &other, "places");
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, places: Vec<Place>) {
        self.store
            .set(key, CachedPayload::Places(Arc::new(places)), Some(self.ttl));
    }

    pub fn invalidate_all(&self) -> usize {
        self.store.invalidate(Some(&CacheKey::root("search")))
    }
}

// ===== Archived lists =====

#[derive(Clone)]
pub struct ArchivedListCache {
    store: SharedCache,
    ttl: Duration,
}

impl ArchivedListCache {
    pub fn new(store: SharedCache, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn index_key() -> CacheKey {
        CacheKey::root("lists")
    }

    /// Scope holding a list and everything derived from it.
    pub fn list_scope(list_id: &str) -> CacheKey {
        CacheKey::root("list").push(list_id)
    }

    pub fn get_all(&self) -> Option<Arc<Vec<ArchivedList>>> {
        let key = Self::index_key();
        match self.store.get(&key, Some(self.ttl))? {
            CachedPayload::Lists(lists) => Some(lists),
            other => {
                mismatch(&key, &other, "lists");
                None
            }
        }
    }

    pub fn put_all(&self, lists: Vec<ArchivedList>) {
        self.store.set(
            Self::index_key(),
            CachedPayload::Lists(Arc::new(lists)),
            Some(self.ttl),
        );
    }

    /// Drop only the list index, e.g. after a new list was added.
    pub fn invalidate_index(&self) -> bool {
        let removed = self.store.delete(&Self::index_key());
        debug!(removed, "invalidated archived list index");
        removed
    }

    /// Drop the index and every entry under `list:{id}` after a mutation.
    pub fn on_list_changed(&self, list_id: &str) -> usize {
        let mut removed = usize::from(self.store.delete(&Self::index_key()));
        removed += self.store.invalidate(Some(&Self::list_scope(list_id)));
        debug!(list_id, removed, "invalidated archived list caches");
        removed
    }
}

// ===== Place details =====

#[derive(Clone)]
pub struct PlaceDetailsCache {
    store: SharedCache,
    ttl: Duration,
}

impl PlaceDetailsCache {
    pub fn new(store: SharedCache, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(place_id: &str) -> CacheKey {
        CacheKey::root("place").push(place_id)
    }

    pub fn get(&self, place_id: &str) -> Option<Arc<Place>> {
        let key = Self::key(place_id);
        match self.store.get(&key, Some(self.ttl))? {
            CachedPayload::Place(place) => Some(place),
            other => {
                mismatch(&key, &other, "place");
                None
            }
        }
    }

    pub fn put(&self, place: Arc<Place>) {
        self.store
            .set(Self::key(&place.id), CachedPayload::Place(place), Some(self.ttl));
    }
}

// ===== Generated schedules =====

#[derive(Clone)]
pub struct ScheduleCache {
    store: SharedCache,
    ttl: Duration,
}

impl ScheduleCache {
    pub fn new(store: SharedCache, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Schedules built from a saved list live under that list's scope so a
    /// list mutation takes them down with it.
    pub fn key(list_id: Option<&str>, request: &ScheduleRequest) -> CacheKey {
        let base = match list_id {
            Some(id) => ArchivedListCache::list_scope(id).push("schedule"),
            None => CacheKey::root("schedule"),
        };
        base.push(request.fingerprint())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Schedule>> {
        match self.store.get(key, Some(self.ttl))? {
            CachedPayload::Schedule(schedule) => Some(schedule),
            other => {
                mismatch(key, &other, "schedule");
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, schedule: Arc<Schedule>) {
        self.store
            .set(key, CachedPayload::Schedule(schedule), Some(self.ttl));
    }
}

/// All facades over one shared store.
#[derive(Clone)]
pub struct CacheFacades {
    pub store: SharedCache,
    pub search: SearchCache,
    pub lists: ArchivedListCache,
    pub places: PlaceDetailsCache,
    pub schedules: ScheduleCache,
}

impl CacheFacades {
    pub fn new(store: SharedCache, ttl: &TtlPolicy, precision: u32) -> Self {
        Self {
            search: SearchCache::new(store.clone(), ttl.search, precision),
            lists: ArchivedListCache::new(store.clone(), ttl.lists),
            places: PlaceDetailsCache::new(store.clone(), ttl.place_details),
            schedules: ScheduleCache::new(store.clone(), ttl.schedules),
            store,
        }
    }
}
