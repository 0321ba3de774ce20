use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{Coordinates, Place};

/// The backend refuses to plan a day with fewer stops than this.
pub const MIN_SCHEDULE_PLACES: usize = 3;

/// Human-readable text plus the raw value (meters or seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Measure {
    pub text: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RouteSegment {
    pub start_location: Coordinates,
    pub end_location: Coordinates,
    pub distance: Measure,
    pub duration: Measure,
    #[serde(default)]
    pub polyline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ScheduleItem {
    pub place_id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub travel_to_next: Option<RouteSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Schedule {
    pub items: Vec<ScheduleItem>,
    pub total_duration_minutes: u32,
    pub total_distance_meters: u64,
}

impl Schedule {
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .items
                .iter()
                .map(|i| {
                    std::mem::size_of::<ScheduleItem>()
                        + i.place_id.len()
                        + i.name.len()
                        + i.activity.as_ref().map_or(0, |a| a.len())
                        + i.travel_to_next.as_ref().map_or(0, |t| t.polyline.len())
                })
                .sum::<usize>()
    }
}

fn default_start_time() -> String {
    "09:00".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ScheduleRequest {
    pub places: Vec<Place>,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub travel_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub day_overview: Option<String>,
}

impl ScheduleRequest {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places,
            start_time: default_start_time(),
            travel_mode: None,
            prompt: None,
            day_overview: None,
        }
    }

    /// Stable digest of everything that influences the generated schedule.
    ///
    /// Place order matters: the same stops in a different order are a
    /// different request.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for place in &self.places {
            place.id.hash(&mut hasher);
        }
        self.start_time.hash(&mut hasher);
        self.travel_mode.hash(&mut hasher);
        self.prompt.hash(&mut hasher);
        self.day_overview.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub schedule: Schedule,
    #[serde(default)]
    pub optimized: bool,
}
