use serde::{Deserialize, Serialize};

pub type PlaceId = String;

/// A latitude/longitude pair in degrees.
///
/// `(0, 0)` is what the backend produces when a place has no location, so it
/// is treated as "missing" rather than as a point in the Gulf of Guinea.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_origin(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }

    /// True for finite, in-range coordinates that are not the origin sentinel.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !self.is_origin()
    }
}

/// Circle used for location bias and proximity searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    pub center: Coordinates,
    pub radius_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    #[serde(default)]
    pub location: Coordinates,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "userRatingCount", default)]
    pub user_rating_count: Option<u32>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "businessStatus", default)]
    pub business_status: Option<String>,
    #[serde(rename = "priceLevel", default)]
    pub price_level: Option<String>,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: Coordinates) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            address: None,
            types: Vec::new(),
            rating: None,
            user_rating_count: None,
            website: None,
            phone: None,
            business_status: None,
            price_level: None,
        }
    }

    pub fn has_location(&self) -> bool {
        self.location.is_valid()
    }

    /// Rough heap + inline footprint, used only for cache statistics.
    pub fn approx_size(&self) -> usize {
        let strings = [
            self.address.as_deref(),
            self.website.as_deref(),
            self.phone.as_deref(),
            self.business_status.as_deref(),
            self.price_level.as_deref(),
        ];
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.name.len()
            + strings.iter().flatten().map(|s| s.len()).sum::<usize>()
            + self.types.iter().map(|t| t.len()).sum::<usize>()
    }
}

// ============================================================================
// Google Places wire format (as proxied by the planner backend)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedText {
    pub text: String,
    #[serde(rename = "languageCode", default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiLatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPlace {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<LocalizedText>,
    #[serde(default)]
    pub location: Option<ApiLatLng>,
    #[serde(rename = "formattedAddress", default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "userRatingCount", default)]
    pub user_rating_count: Option<u32>,
    #[serde(rename = "websiteUri", default)]
    pub website_uri: Option<String>,
    #[serde(rename = "internationalPhoneNumber", default)]
    pub international_phone_number: Option<String>,
    #[serde(rename = "businessStatus", default)]
    pub business_status: Option<String>,
    #[serde(rename = "priceLevel", default)]
    pub price_level: Option<String>,
}

impl ApiPlace {
    pub fn to_place(&self) -> Place {
        let name = self
            .display_name
            .as_ref()
            .map(|n| n.text.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| self.formatted_address.clone())
            .unwrap_or_else(|| self.id.clone());

        // A place without a location collapses to the origin sentinel
        let location = self
            .location
            .map(|l| Coordinates::new(l.latitude, l.longitude))
            .unwrap_or_default();

        Place {
            id: self.id.clone(),
            name,
            location,
            address: self.formatted_address.clone(),
            types: self.types.clone(),
            rating: self.rating,
            user_rating_count: self.user_rating_count,
            website: self.website_uri.clone(),
            phone: self.international_phone_number.clone(),
            business_status: self.business_status.clone(),
            price_level: self.price_level.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlacesResponse {
    #[serde(default)]
    pub places: Vec<ApiPlace>,
}

impl PlacesResponse {
    pub fn into_places(self) -> Vec<Place> {
        self.places.iter().map(ApiPlace::to_place).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_not_valid() {
        assert!(!Coordinates::new(0.0, 0.0).is_valid());
        assert!(Coordinates::new(0.0, 12.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 1.0).is_valid());
        assert!(!Coordinates::new(91.0, 1.0).is_valid());
    }

    #[test]
    fn test_api_place_conversion() {
        let json = r#"{
            "id": "ChIJ123",
            "displayName": {"text": "Blue Bottle", "languageCode": "en"},
            "location": {"latitude": 40.71, "longitude": -74.0},
            "formattedAddress": "1 Main St",
            "types": ["cafe", "food"],
            "rating": 4.5,
            "userRatingCount": 812,
            "websiteUri": "https://example.com"
        }"#;
        let api: ApiPlace = serde_json::from_str(json).unwrap();
        let place = api.to_place();
        assert_eq!(place.id, "ChIJ123");
        assert_eq!(place.name, "Blue Bottle");
        assert_eq!(place.location, Coordinates::new(40.71, -74.0));
        assert_eq!(place.types, vec!["cafe", "food"]);
        assert_eq!(place.user_rating_count, Some(812));
        assert_eq!(place.website.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_missing_location_maps_to_sentinel() {
        let api: ApiPlace = serde_json::from_str(r#"{"id": "x", "formattedAddress": "Somewhere"}"#).unwrap();
        let place = api.to_place();
        assert!(place.location.is_origin());
        assert!(!place.has_location());
        assert_eq!(place.name, "Somewhere");
    }

    #[test]
    fn test_places_response_defaults_to_empty() {
        let resp: PlacesResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.into_places().is_empty());
    }
}
