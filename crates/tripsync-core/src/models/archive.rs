use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Place;

/// A saved, named collection of places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ArchivedList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl ArchivedList {
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.name.len()
            + self.note.as_ref().map_or(0, |n| n.len())
            + self.places.iter().map(Place::approx_size).sum::<usize>()
    }
}

/// Body for creating or updating an archived list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ArchivedListInput {
    pub name: String,
    pub places: Vec<Place>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedListResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OkResponse {
    #[serde(default)]
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archived_list_parses_backend_shape() {
        let json = r#"[{
            "id": "65f0",
            "name": "Saturday",
            "places": [{"id": "p1", "name": "Museum", "location": {"lat": 1.0, "lng": 2.0}}],
            "note": null,
            "date": "2024-03-09T10:00:00Z"
        }]"#;
        let lists: Vec<ArchivedList> = serde_json::from_str(json).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].places[0].name, "Museum");
        assert!(lists[0].date.is_some());
    }

    #[test]
    fn test_input_skips_empty_note() {
        let input = ArchivedListInput {
            name: "Trip".to_string(),
            places: vec![],
            note: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("note").is_none());
    }
}
