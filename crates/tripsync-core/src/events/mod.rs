//! Domain events shared between the map, the search panel and the itinerary.
//!
//! The event set is closed: subscribers match on [`DomainEvent`] instead of
//! probing payload shapes at runtime.

mod bus;

pub use bus::{EventBus, Handler, PublishReport, Subscription};

use serde::{Deserialize, Serialize};

use crate::models::{Coordinates, Place, PlaceId};

/// Sidebar tabs that can originate a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Search,
    Favorites,
    Archive,
    Itinerary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A search finished (possibly with no results).
    SearchResults { places: Vec<Place> },
    PlaceSelected { place: Place, tab: Tab },
    PlaceHoverChanged { place_id: PlaceId, hovering: bool },
    SelectionCleared,
    TabChanged { tab: Tab },
    /// Derived by the map controller: the debounced highlighted marker.
    HighlightChanged { place_id: Option<PlaceId> },
    /// Derived by the map controller: the map settled on a new center.
    ViewportChanged { center: Coordinates },
}

/// Discriminant used to route events to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SearchResults,
    PlaceSelected,
    PlaceHoverChanged,
    SelectionCleared,
    TabChanged,
    HighlightChanged,
    ViewportChanged,
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::SearchResults { .. } => EventKind::SearchResults,
            DomainEvent::PlaceSelected { .. } => EventKind::PlaceSelected,
            DomainEvent::PlaceHoverChanged { .. } => EventKind::PlaceHoverChanged,
            DomainEvent::SelectionCleared => EventKind::SelectionCleared,
            DomainEvent::TabChanged { .. } => EventKind::TabChanged,
            DomainEvent::HighlightChanged { .. } => EventKind::HighlightChanged,
            DomainEvent::ViewportChanged { .. } => EventKind::ViewportChanged,
        }
    }
}
