//! Cached, cancellable place search.
//!
//! Each call supersedes the previous one: its request is aborted and its
//! result is never published, so a slow response to an early keystroke can
//! not overwrite the results of a later one. Callers always get a list back;
//! failures degrade to an empty one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use tracing::{debug, info, warn};

use super::history::RecentSearches;
use crate::api::PlacesApi;
use crate::cache::{normalize_query, SearchCache};
use crate::events::{DomainEvent, EventBus};
use crate::models::{Coordinates, Place, SearchArea};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub history_size: usize,
    /// Radius for the location bias and the proximity fallback.
    pub proximity_radius_m: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            proximity_radius_m: 5_000.0,
        }
    }
}

struct SearchState {
    generation: u64,
    in_flight: Option<AbortHandle>,
    history: RecentSearches,
}

/// Clears the in-flight marker when a search future is dropped mid-flight.
struct InFlightGuard<'a> {
    controller: &'a SearchController,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        if state.generation == self.generation {
            state.in_flight = None;
        }
    }
}

pub struct SearchController {
    api: Arc<dyn PlacesApi>,
    cache: SearchCache,
    bus: EventBus,
    config: SearchConfig,
    state: Mutex<SearchState>,
}

impl SearchController {
    pub fn new(api: Arc<dyn PlacesApi>, cache: SearchCache, bus: &EventBus, config: SearchConfig) -> Self {
        let history = RecentSearches::new(config.history_size);
        Self {
            api,
            cache,
            bus: bus.clone(),
            config,
            state: Mutex::new(SearchState {
                generation: 0,
                in_flight: None,
                history,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Abort whatever is in flight and claim a new generation.
    fn begin(&self) -> (u64, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let mut state = self.lock();
        if let Some(previous) = state.in_flight.replace(handle) {
            previous.abort();
        }
        state.generation += 1;
        (state.generation, registration)
    }

    /// Finish `generation` if it is still the latest. Returns false when a
    /// newer search has taken over, in which case nothing is touched.
    fn finish(&self, generation: u64, successful_query: Option<&str>) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.in_flight = None;
        if let Some(query) = successful_query {
            state.history.record(query);
        }
        true
    }

    /// Publish `places` as the outcome of `generation`, unless a newer search
    /// or a cancel has taken over. Superseded results are dropped.
    fn deliver(
        &self,
        generation: u64,
        successful_query: Option<&str>,
        places: Vec<Place>,
    ) -> Vec<Place> {
        if !self.finish(generation, successful_query) {
            debug!(generation, "search superseded, dropping results");
            return Vec::new();
        }
        self.bus.publish(DomainEvent::SearchResults {
            places: places.clone(),
        });
        places
    }

    /// Abort any in-flight search without starting a new one.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(handle) = state.in_flight.take() {
            handle.abort();
            debug!("in-flight search cancelled");
        }
    }

    pub async fn search(&self, query: &str, center: Option<Coordinates>) -> Vec<Place> {
        let (generation, registration) = self.begin();
        let _guard = InFlightGuard {
            controller: self,
            generation,
        };
        let query = query.trim();

        if normalize_query(query).is_empty() {
            return self.deliver(generation, None, Vec::new());
        }

        let center = center.filter(Coordinates::is_valid);
        let key = self.cache.key(query, center);

        if let Some(cached) = self.cache.get(&key) {
            debug!(query, count = cached.len(), "search served from cache");
            return self.deliver(generation, Some(query), cached.as_ref().clone());
        }

        let fetched = match Abortable::new(self.fetch(query, center), registration).await {
            Err(_aborted) => {
                debug!(query, "search superseded before completion");
                return Vec::new();
            }
            Ok(result) => result,
        };

        match fetched {
            Ok(places) => {
                if !places.is_empty() && self.is_current(generation) {
                    self.cache.put(key, places.clone());
                }
                info!(query, count = places.len(), "search complete");
                self.deliver(generation, Some(query), places)
            }
            Err(e) => {
                warn!(query, error = %e, "place search failed, showing no results");
                self.deliver(generation, None, Vec::new())
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Text search first; an empty answer near a known center falls back to
    /// a proximity search.
    async fn fetch(&self, query: &str, center: Option<Coordinates>) -> anyhow::Result<Vec<Place>> {
        let area = center.map(|center| SearchArea {
            center,
            radius_m: self.config.proximity_radius_m,
        });

        let places = self.api.search_text(query, area).await?;
        match area {
            Some(area) if places.is_empty() => {
                debug!(query, "no text matches, falling back to nearby search");
                self.api.search_nearby(area).await
            }
            _ => Ok(places),
        }
    }

    /// Past successful queries, most recent first.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.entries()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn is_searching(&self) -> bool {
        self.lock().in_flight.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::cache::{CacheConfig, CacheStore};
    use crate::events::EventKind;

    #[derive(Default)]
    struct FakePlaces {
        text: HashMap<String, (Duration, Vec<Place>)>,
        nearby: Vec<Place>,
        fail: bool,
        text_calls: AtomicUsize,
        nearby_calls: AtomicUsize,
    }

    impl FakePlaces {
        fn with(mut self, query: &str, delay_ms: u64, ids: &[&str]) -> Self {
            let places = ids.iter().map(|id| place(id)).collect();
            self.text
                .insert(query.to_string(), (Duration::from_millis(delay_ms), places));
            self
        }
    }

    #[async_trait]
    impl PlacesApi for FakePlaces {
        async fn search_text(&self, query: &str, _bias: Option<SearchArea>) -> anyhow::Result<Vec<Place>> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            match self.text.get(query) {
                Some((delay, places)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(places.clone())
                }
                None => Ok(Vec::new()),
            }
        }

        async fn search_nearby(&self, _area: SearchArea) -> anyhow::Result<Vec<Place>> {
            self.nearby_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nearby.clone())
        }

        async fn place_details(&self, place_id: &str) -> anyhow::Result<Place> {
            Ok(place(place_id))
        }
    }

    fn place(id: &str) -> Place {
        Place::new(id, id, Coordinates::new(40.7, -74.0))
    }

    type Published = Arc<Mutex<Vec<Vec<String>>>>;

    fn setup(api: FakePlaces) -> (Arc<SearchController>, Arc<FakePlaces>, Published, crate::events::Subscription) {
        let api = Arc::new(api);
        let bus = EventBus::new();
        let store = Arc::new(CacheStore::new(CacheConfig::default()));
        let cache = SearchCache::new(store, Duration::from_secs(300), 3);
        let controller = Arc::new(SearchController::new(api.clone(), cache, &bus, SearchConfig::default()));

        let published: Published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        let sub = bus.subscribe(EventKind::SearchResults, move |event| {
            if let DomainEvent::SearchResults { places } = event {
                sink.lock().unwrap().push(places.iter().map(|p| p.id.clone()).collect());
            }
            Ok(())
        });
        (controller, api, published, sub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_search_supersedes_slower_one() {
        let api = FakePlaces::default()
            .with("a", 200, &["slow-a"])
            .with("ab", 10, &["fast-ab"]);
        let (controller, _api, published, _sub) = setup(api);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.search("a", None).await })
        };
        // Let the first search reach its network call
        tokio::task::yield_now().await;

        let second = controller.search("ab", None).await;
        let first = first.await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(first.is_empty());
        assert_eq!(second[0].id, "fast-ab");
        assert_eq!(*published.lock().unwrap(), vec![vec!["fast-ab".to_string()]]);
        assert_eq!(controller.history(), vec!["ab"]);
        assert!(!controller.is_searching());
    }

    #[tokio::test]
    async fn test_superseded_generation_never_publishes() {
        let (controller, _api, published, _sub) = setup(FakePlaces::default());

        // An older search still holding its results after a newer one began
        let (stale, _registration) = controller.begin();
        let (current, _registration) = controller.begin();

        let dropped = controller.deliver(stale, Some("a"), vec![place("stale-a")]);
        assert!(dropped.is_empty());
        assert!(published.lock().unwrap().is_empty());
        assert!(controller.history().is_empty());

        controller.deliver(current, Some("ab"), vec![place("fresh-ab")]);
        assert_eq!(*published.lock().unwrap(), vec![vec!["fresh-ab".to_string()]]);
    }

    #[tokio::test]
    async fn test_superseded_cache_hit_is_dropped() {
        let api = FakePlaces::default().with("a", 0, &["cached-a"]);
        let (controller, _api, published, _sub) = setup(api);
        controller.search("a", None).await;
        published.lock().unwrap().clear();

        let (stale, _registration) = controller.begin();
        controller.cancel();
        let key = controller.cache.key("a", None);
        let cached = controller.cache.get(&key).unwrap();

        assert!(controller.deliver(stale, Some("a"), cached.as_ref().clone()).is_empty());
        assert!(published.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_search() {
        let api = FakePlaces::default().with("slow", 200, &["s"]);
        let (controller, _api, published, _sub) = setup(api);

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.search("slow", None).await })
        };
        tokio::task::yield_now().await;
        assert!(controller.is_searching());

        controller.cancel();
        let results = pending.await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(results.is_empty());
        assert!(published.lock().unwrap().is_empty());
        assert!(!controller.is_searching());
        assert!(controller.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_search_is_not_left_in_flight() {
        let api = FakePlaces::default().with("slow", 200, &["s"]);
        let (controller, _api, published, _sub) = setup(api);

        let outcome = tokio::time::timeout(Duration::from_millis(50), controller.search("slow", None)).await;

        assert!(outcome.is_err());
        assert!(!controller.is_searching());
        assert!(published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network_but_still_publishes() {
        let api = FakePlaces::default().with("museum", 0, &["m1", "m2"]);
        let (controller, api, published, _sub) = setup(api);
        let center = Some(Coordinates::new(40.71279, -74.00601));

        controller.search("museum", center).await;
        let again = controller.search("  Museum ", Some(Coordinates::new(40.71284, -74.00599))).await;

        assert_eq!(again.len(), 2);
        assert_eq!(api.text_calls.load(Ordering::SeqCst), 1);
        assert_eq!(published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_query_publishes_empty_results() {
        let (controller, api, published, _sub) = setup(FakePlaces::default());

        let results = controller.search("   ", None).await;

        assert!(results.is_empty());
        assert_eq!(*published.lock().unwrap(), vec![Vec::<String>::new()]);
        assert_eq!(api.text_calls.load(Ordering::SeqCst), 0);
        assert!(controller.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_cancels_pending_search() {
        let api = FakePlaces::default().with("pizza", 100, &["p"]);
        let (controller, _api, published, _sub) = setup(api);

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.search("pizza", None).await })
        };
        tokio::task::yield_now().await;
        controller.search("", None).await;
        assert!(pending.await.unwrap().is_empty());

        assert_eq!(*published.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_falls_back_to_nearby_with_center() {
        let api = FakePlaces {
            nearby: vec![place("near")],
            ..Default::default()
        };
        let (controller, api, _published, _sub) = setup(api);

        let results = controller.search("zzz", Some(Coordinates::new(40.0, -74.0))).await;

        assert_eq!(results[0].id, "near");
        assert_eq!(api.nearby_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_without_center() {
        let api = FakePlaces {
            nearby: vec![place("near")],
            ..Default::default()
        };
        let (controller, api, published, _sub) = setup(api);

        let results = controller.search("zzz", None).await;

        assert!(results.is_empty());
        assert_eq!(api.nearby_calls.load(Ordering::SeqCst), 0);
        assert_eq!(published.lock().unwrap().len(), 1);
        // An empty answer is still a successful search
        assert_eq!(controller.history(), vec!["zzz"]);
    }

    #[tokio::test]
    async fn test_network_failure_degrades_to_empty() {
        let api = FakePlaces {
            fail: true,
            ..Default::default()
        };
        let (controller, api, published, _sub) = setup(api);

        let results = controller.search("coffee", None).await;
        controller.search("coffee", None).await;

        assert!(results.is_empty());
        assert_eq!(published.lock().unwrap().len(), 2);
        // Failures are not cached and not remembered
        assert_eq!(api.text_calls.load(Ordering::SeqCst), 2);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_recency_ordered() {
        let api = FakePlaces::default().with("a", 0, &["1"]).with("b", 0, &["2"]);
        let (controller, _api, _published, _sub) = setup(api);

        controller.search("a", None).await;
        controller.search("b", None).await;
        controller.search("A", None).await;

        assert_eq!(controller.history(), vec!["A", "b"]);
        controller.clear_history();
        assert!(controller.history().is_empty());
    }
}
