//! Archived lists, place details and schedule generation behind the cache.
//!
//! Reads are served from the shared store while fresh. Every list mutation
//! drops the list index plus everything cached under that list, including
//! schedules generated from it.

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{PlacesApi, TripApi};
use crate::cache::{CacheFacades, ScheduleCache};
use crate::models::{
    ArchivedList, ArchivedListInput, Place, Schedule, ScheduleRequest, MIN_SCHEDULE_PLACES,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItineraryError {
    #[error("A schedule needs at least {required} places, got {found}")]
    TooFewPlaces { found: usize, required: usize },
}

pub struct ItineraryService {
    places: Arc<dyn PlacesApi>,
    trips: Arc<dyn TripApi>,
    caches: CacheFacades,
}

impl ItineraryService {
    pub fn new(places: Arc<dyn PlacesApi>, trips: Arc<dyn TripApi>, caches: CacheFacades) -> Self {
        Self {
            places,
            trips,
            caches,
        }
    }

    pub async fn archived_lists(&self) -> Result<Arc<Vec<ArchivedList>>> {
        if let Some(lists) = self.caches.lists.get_all() {
            debug!(count = lists.len(), "archived lists served from cache");
            return Ok(lists);
        }
        self.refresh_archived_lists().await
    }

    /// Fetch the lists from the backend regardless of what is cached.
    pub async fn refresh_archived_lists(&self) -> Result<Arc<Vec<ArchivedList>>> {
        let lists = self
            .trips
            .archived_lists()
            .await
            .context("Failed to load archived lists")?;
        self.caches.lists.put_all(lists);
        // Read back through the store so callers share the cached allocation
        Ok(self
            .caches
            .lists
            .get_all()
            .unwrap_or_else(|| Arc::new(Vec::new())))
    }

    /// Store a new list. Returns the backend's acknowledgement, not a list id.
    pub async fn create_list(&self, list: &ArchivedListInput) -> Result<String> {
        let ack = self
            .trips
            .create_list(list)
            .await
            .context("Failed to create archived list")?;
        // Existing lists are untouched; only the index is stale
        self.caches.lists.invalidate_index();
        info!(ack = %ack, name = %list.name, places = list.places.len(), "archived list created");
        Ok(ack)
    }

    pub async fn update_list(&self, list_id: &str, list: &ArchivedListInput) -> Result<()> {
        self.trips
            .update_list(list_id, list)
            .await
            .with_context(|| format!("Failed to update archived list {}", list_id))?;
        self.caches.lists.on_list_changed(list_id);
        info!(list_id, "archived list updated");
        Ok(())
    }

    pub async fn delete_list(&self, list_id: &str) -> Result<()> {
        self.trips
            .delete_list(list_id)
            .await
            .with_context(|| format!("Failed to delete archived list {}", list_id))?;
        self.caches.lists.on_list_changed(list_id);
        info!(list_id, "archived list deleted");
        Ok(())
    }

    /// Details for one place, or `None` when the backend can't provide them.
    pub async fn place_details(&self, place_id: &str) -> Option<Arc<Place>> {
        if let Some(place) = self.caches.places.get(place_id) {
            return Some(place);
        }
        match self.places.place_details(place_id).await {
            Ok(place) => {
                let place = Arc::new(place);
                self.caches.places.put(place.clone());
                Some(place)
            }
            Err(e) => {
                warn!(place_id, error = %e, "place details unavailable");
                None
            }
        }
    }

    /// Build a day schedule for `request`. Schedules generated from a saved
    /// list are cached under that list.
    pub async fn generate_schedule(
        &self,
        list_id: Option<&str>,
        request: &ScheduleRequest,
    ) -> Result<Arc<Schedule>> {
        let found = request.places.len();
        if found < MIN_SCHEDULE_PLACES {
            return Err(ItineraryError::TooFewPlaces {
                found,
                required: MIN_SCHEDULE_PLACES,
            }
            .into());
        }

        let key = ScheduleCache::key(list_id, request);
        if let Some(schedule) = self.caches.schedules.get(&key) {
            debug!(key = %key, "schedule served from cache");
            return Ok(schedule);
        }

        let schedule = Arc::new(
            self.trips
                .generate_schedule(request)
                .await
                .context("Failed to generate schedule")?,
        );
        self.caches.schedules.put(key, schedule.clone());
        info!(
            places = found,
            items = schedule.items.len(),
            minutes = schedule.total_duration_minutes,
            "schedule generated"
        );
        Ok(schedule)
    }
}
