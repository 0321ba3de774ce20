//! Domain models shared by the cache, the event bus and the API client.

pub mod archive;
pub mod place;
pub mod schedule;

pub use archive::{ArchivedList, ArchivedListInput};
pub use place::{ApiPlace, Coordinates, Place, PlaceId, PlacesResponse, SearchArea};
pub use schedule::{
    Measure, RouteSegment, Schedule, ScheduleItem, ScheduleRequest, ScheduleResponse,
    MIN_SCHEDULE_PLACES,
};
