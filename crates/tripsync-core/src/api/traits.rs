//! Backend seams.
//!
//! Controllers depend on these traits rather than on [`ApiClient`] so they
//! can be driven by in-memory fakes.
//!
//! [`ApiClient`]: super::ApiClient

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ArchivedList, ArchivedListInput, Place, Schedule, ScheduleRequest, SearchArea};

#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// Free-text search, optionally biased toward an area.
    async fn search_text(&self, query: &str, bias: Option<SearchArea>) -> Result<Vec<Place>>;

    /// Places inside an area, regardless of text.
    async fn search_nearby(&self, area: SearchArea) -> Result<Vec<Place>>;

    async fn place_details(&self, place_id: &str) -> Result<Place>;
}

#[async_trait]
pub trait TripApi: Send + Sync {
    async fn archived_lists(&self) -> Result<Vec<ArchivedList>>;

    /// Returns the backend's acknowledgement: the owning document id when
    /// the first list is stored, `"updated"` afterwards. It is not the id of
    /// the new list; reload the lists to learn that.
    async fn create_list(&self, list: &ArchivedListInput) -> Result<String>;

    async fn update_list(&self, list_id: &str, list: &ArchivedListInput) -> Result<()>;

    async fn delete_list(&self, list_id: &str) -> Result<()>;

    async fn generate_schedule(&self, request: &ScheduleRequest) -> Result<Schedule>;
}
