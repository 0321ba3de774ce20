//! API client for the trip-planner backend.
//!
//! The backend proxies place search and details, stores archived lists and
//! generates day schedules. `ApiClient` implements both [`PlacesApi`] and
//! [`TripApi`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ApiError, PlacesApi, TripApi};
use crate::models::archive::{CreatedListResponse, OkResponse};
use crate::models::{
    ApiPlace, ArchivedList, ArchivedListInput, Place, PlacesResponse, Schedule, ScheduleRequest,
    ScheduleResponse, SearchArea,
};

// ============================================================================
// Constants
// ============================================================================

/// Backend used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

pub const DEFAULT_LANGUAGE_CODE: &str = "en";
pub const DEFAULT_REGION_CODE: &str = "us";

/// API client for the planner backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    language_code: String,
    region_code: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            region_code: DEFAULT_REGION_CODE.to_string(),
        })
    }

    /// Language and region sent with every place search.
    pub fn with_locale(mut self, language_code: &str, region_code: &str) -> Self {
        self.language_code = language_code.to_string();
        self.region_code = region_code.to_string();
        self
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            language_code: self.language_code.clone(),
            region_code: self.region_code.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// URL for `path` with `id` appended as one percent-encoded segment.
    fn resource_url(&self, path: &str, id: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .with_context(|| format!("Invalid API base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base URL {} cannot take a path", self.base_url))?
            .push(id);
        Ok(url.into())
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send the request built by `build`, rebuilding and resending it with
    /// exponential backoff while the backend answers 429.
    async fn execute<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute(url, || self.client.get(url)).await?;
        Self::parse(response, url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.execute(url, || self.client.post(url).json(body)).await?;
        Self::parse(response, url).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.execute(url, || self.client.put(url).json(body)).await?;
        Self::parse(response, url).await
    }

    async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.execute(url, || self.client.delete(url)).await?;
        Self::parse(response, url).await
    }

    // ===== Request bodies =====

    fn circle(area: &SearchArea) -> Value {
        json!({
            "circle": {
                "center": {
                    "latitude": area.center.lat,
                    "longitude": area.center.lng,
                },
                "radius": area.radius_m,
            }
        })
    }

    fn text_search_body(&self, query: &str, bias: Option<&SearchArea>) -> Value {
        let mut body = json!({
            "textQuery": query,
            "languageCode": self.language_code,
            "regionCode": self.region_code,
        });
        if let Some(area) = bias {
            body["locationBias"] = Self::circle(area);
        }
        body
    }

    fn nearby_search_body(&self, area: &SearchArea) -> Value {
        json!({
            "locationRestriction": Self::circle(area),
            "languageCode": self.language_code,
            "regionCode": self.region_code,
        })
    }

    fn expect_ok(response: OkResponse, what: &str) -> Result<()> {
        if response.ok {
            Ok(())
        } else {
            Err(ApiError::InvalidResponse(format!("{} was not acknowledged", what)).into())
        }
    }
}

#[async_trait]
impl PlacesApi for ApiClient {
    async fn search_text(&self, query: &str, bias: Option<SearchArea>) -> Result<Vec<Place>> {
        let url = self.url("/places:searchText");
        let body = self.text_search_body(query, bias.as_ref());
        let response: PlacesResponse = self.post(&url, &body).await?;
        debug!(query, count = response.places.len(), "Text search returned");
        Ok(response.into_places())
    }

    async fn search_nearby(&self, area: SearchArea) -> Result<Vec<Place>> {
        let url = self.url("/places:searchNearby");
        let body = self.nearby_search_body(&area);
        let response: PlacesResponse = self.post(&url, &body).await?;
        debug!(count = response.places.len(), radius_m = area.radius_m, "Nearby search returned");
        Ok(response.into_places())
    }

    async fn place_details(&self, place_id: &str) -> Result<Place> {
        if place_id.is_empty() {
            return Err(ApiError::BadRequest("empty place id".to_string()).into());
        }
        let url = self.resource_url("/places", place_id)?;
        let place: ApiPlace = self.get(&url).await?;
        Ok(place.to_place())
    }
}

#[async_trait]
impl TripApi for ApiClient {
    async fn archived_lists(&self) -> Result<Vec<ArchivedList>> {
        let url = self.url("/archived-lists");
        self.get(&url).await
    }

    async fn create_list(&self, list: &ArchivedListInput) -> Result<String> {
        let url = self.url("/archived-lists");
        let created: CreatedListResponse = self.post(&url, list).await?;
        Ok(created.id)
    }

    async fn update_list(&self, list_id: &str, list: &ArchivedListInput) -> Result<()> {
        let url = self.resource_url("/archived-lists", list_id)?;
        let response: OkResponse = self.put(&url, list).await?;
        Self::expect_ok(response, "List update")
    }

    async fn delete_list(&self, list_id: &str) -> Result<()> {
        let url = self.resource_url("/archived-lists", list_id)?;
        let response: OkResponse = self.delete(&url).await?;
        Self::expect_ok(response, "List deletion")
    }

    async fn generate_schedule(&self, request: &ScheduleRequest) -> Result<Schedule> {
        let url = self.url("/schedules");
        let response: ScheduleResponse = self.post(&url, request).await?;
        debug!(
            items = response.schedule.items.len(),
            optimized = response.optimized,
            "Schedule generated"
        );
        Ok(response.schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;

    fn client() -> ApiClient {
        ApiClient::new("https://planner.example/", Duration::from_secs(REQUEST_TIMEOUT_SECS)).unwrap()
    }

    fn area() -> SearchArea {
        SearchArea {
            center: Coordinates::new(40.7128, -74.006),
            radius_m: 1500.0,
        }
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = client();
        assert_eq!(client.base_url(), "https://planner.example");
        assert_eq!(
            client.url("/archived-lists/abc"),
            "https://planner.example/api/archived-lists/abc"
        );
    }

    #[test]
    fn test_ids_are_encoded_as_one_segment() {
        let client = client();
        assert_eq!(
            client.resource_url("/archived-lists", "65f0").unwrap(),
            "https://planner.example/api/archived-lists/65f0"
        );
        assert_eq!(
            client.resource_url("/places", "a/b c?x#y").unwrap(),
            "https://planner.example/api/places/a%2Fb%20c%3Fx%23y"
        );
    }

    #[test]
    fn test_text_search_body_without_bias() {
        let body = client().text_search_body("coffee", None);
        assert_eq!(body["textQuery"], "coffee");
        assert_eq!(body["languageCode"], DEFAULT_LANGUAGE_CODE);
        assert_eq!(body["regionCode"], DEFAULT_REGION_CODE);
        assert!(body.get("locationBias").is_none());
    }

    #[test]
    fn test_text_search_body_with_bias() {
        let client = client().with_locale("fr", "fr");
        let body = client.text_search_body("musée", Some(&area()));
        let circle = &body["locationBias"]["circle"];
        assert_eq!(circle["center"]["latitude"], 40.7128);
        assert_eq!(circle["center"]["longitude"], -74.006);
        assert_eq!(circle["radius"], 1500.0);
        assert_eq!(body["languageCode"], "fr");
    }

    #[test]
    fn test_nearby_body_restricts_to_circle() {
        let body = client().nearby_search_body(&area());
        assert_eq!(body["locationRestriction"]["circle"]["radius"], 1500.0);
        assert!(body.get("textQuery").is_none());
    }

    #[test]
    fn test_with_token_sets_bearer_header() {
        let base = client();
        assert!(base.auth_headers().unwrap().is_empty());

        let authed = base.with_token("secret".to_string());
        let headers = authed.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer secret");
        assert_eq!(authed.base_url(), base.base_url());
    }

    #[test]
    fn test_unacknowledged_write_is_an_error() {
        assert!(ApiClient::expect_ok(OkResponse { ok: true }, "List update").is_ok());
        let err = ApiClient::expect_ok(OkResponse { ok: false }, "List update").unwrap_err();
        assert!(err.to_string().contains("not acknowledged"));
    }
}
