//! Client-side core of the tripsync trip planner.
//!
//! - [`cache`]: TTL/LRU response store with per-domain facades
//! - [`events`]: typed publish/subscribe bus
//! - [`map`]: keeps the map widget in step with search, hover and selection
//! - [`search`]: cached, cancellable place search with recent history
//! - [`itinerary`]: archived lists and schedule generation
//!
//! [`App`] wires them together over an [`ApiClient`] or any other
//! [`PlacesApi`]/[`TripApi`] implementation.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod events;
pub mod itinerary;
pub mod map;
pub mod models;
pub mod search;

pub use api::{ApiClient, ApiError, PlacesApi, TripApi};
pub use app::App;
pub use config::{Config, ConfigError};
pub use events::{DomainEvent, EventBus, EventKind, Subscription, Tab};
pub use itinerary::{ItineraryError, ItineraryService};
pub use map::{Bounds, MapSyncConfig, MapSyncController, MapSyncState, MapWidget};
pub use models::{ArchivedList, ArchivedListInput, Coordinates, Place, PlaceId, Schedule, ScheduleRequest};
pub use search::{SearchConfig, SearchController};
