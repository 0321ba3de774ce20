//! Application wiring for tripsync.
//!
//! `App` builds one shared cache, one event bus and the controllers that
//! hang off them. The frontend talks to the controllers; the controllers talk
//! to each other only through the bus.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::{ApiClient, PlacesApi, TripApi};
use crate::cache::{CacheFacades, CacheStats, CacheStore, CleanupTask, SharedCache};
use crate::config::Config;
use crate::events::{DomainEvent, EventBus, PublishReport, Tab};
use crate::itinerary::ItineraryService;
use crate::map::MapSyncController;
use crate::models::Place;
use crate::search::SearchController;

pub struct App {
    config: Config,
    bus: EventBus,
    caches: CacheFacades,
    map: MapSyncController,
    search: Arc<SearchController>,
    itinerary: ItineraryService,
    // Stops the sweep when the app goes away
    cleanup: Option<CleanupTask>,
}

impl App {
    /// Validate `config` and wire everything to the HTTP backend it names.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ApiClient::new(&config.api.base_url, config.request_timeout())?
            .with_locale(&config.search.language_code, &config.search.region_code);
        let client = Arc::new(client);
        Self::with_backend(config, client.clone(), client)
    }

    /// Wire everything to caller-provided backends.
    ///
    /// The periodic cache sweep only runs when called inside a tokio
    /// runtime; without one, expired entries are still dropped on read.
    pub fn with_backend(
        config: Config,
        places: Arc<dyn PlacesApi>,
        trips: Arc<dyn TripApi>,
    ) -> Result<Self> {
        config.validate()?;

        let store: SharedCache = Arc::new(CacheStore::new(config.cache_config()));
        let cleanup = match tokio::runtime::Handle::try_current() {
            Ok(_) => Some(store.spawn_cleanup()),
            Err(_) => {
                warn!("no tokio runtime, periodic cache cleanup disabled");
                None
            }
        };
        let caches = CacheFacades::new(
            store,
            &config.ttl_policy(),
            config.search.coordinate_precision,
        );

        let bus = EventBus::new();
        let map = MapSyncController::new(&bus, config.map_config());
        let search = Arc::new(SearchController::new(
            places.clone(),
            caches.search.clone(),
            &bus,
            config.search_config(),
        ));
        let itinerary = ItineraryService::new(places, trips, caches.clone());

        info!(
            base_url = %config.api.base_url,
            max_entries = config.cache.max_entries,
            "tripsync initialized"
        );

        Ok(Self {
            config,
            bus,
            caches,
            map,
            search,
            itinerary,
            cleanup,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn map(&self) -> &MapSyncController {
        &self.map
    }

    pub fn search(&self) -> &Arc<SearchController> {
        &self.search
    }

    pub fn itinerary(&self) -> &ItineraryService {
        &self.itinerary
    }

    pub fn caches(&self) -> &CacheFacades {
        &self.caches
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.store.stats()
    }

    pub fn has_cleanup_task(&self) -> bool {
        self.cleanup.as_ref().is_some_and(|task| !task.is_finished())
    }

    // ===== UI intents =====

    pub fn select_place(&self, place: Place, tab: Tab) -> PublishReport {
        self.bus.publish(DomainEvent::PlaceSelected { place, tab })
    }

    pub fn clear_selection(&self) -> PublishReport {
        self.bus.publish(DomainEvent::SelectionCleared)
    }

    pub fn hover_place(&self, place_id: &str, hovering: bool) -> PublishReport {
        self.bus.publish(DomainEvent::PlaceHoverChanged {
            place_id: place_id.to_string(),
            hovering,
        })
    }

    pub fn change_tab(&self, tab: Tab) -> PublishReport {
        self.bus.publish(DomainEvent::TabChanged { tab })
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.caches.store.clear();
        info!("cache cleared");
    }
}
