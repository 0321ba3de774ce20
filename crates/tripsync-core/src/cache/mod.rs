//! In-memory response cache.
//!
//! A single [`CacheStore`] holds every cached response with TTL expiry and
//! LRU eviction. Domain code talks to it through the facades:
//! - search results (short-lived)
//! - archived lists and their generated schedules
//! - place details
//!
//! Keys are hierarchical (see [`keys`]) so one list mutation can drop every
//! entry derived from that list.

pub mod facades;
pub mod keys;
pub mod store;

pub use facades::{
    ArchivedListCache, CacheFacades, CachedPayload, PlaceDetailsCache, ScheduleCache, SearchCache,
    SharedCache, TtlPolicy,
};
pub use keys::{normalize_query, CacheKey, MAX_COORDINATE_PRECISION};
pub use store::{CacheConfig, CacheStats, CacheStore, CacheWeight, CleanupTask};
