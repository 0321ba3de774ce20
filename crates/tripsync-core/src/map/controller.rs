//! Keeps the map in step with the search and itinerary panels.
//!
//! The controller listens on the [`EventBus`], owns hover, selection and
//! viewport state, and publishes derived events (`HighlightChanged`,
//! `ViewportChanged`). Other components only see its state through those
//! events or the accessors below.
//!
//! Hover hides are debounced: leaving a marker starts a short timer, and
//! hovering anything before it fires cancels it, so moving the pointer across
//! the gap between a marker and its popup never flickers.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use super::hover::{HideTimer, HoverState};
use super::{Bounds, MapWidget};
use crate::events::{DomainEvent, EventBus, EventKind, Subscription, Tab};
use crate::models::{Coordinates, Place, PlaceId};

#[derive(Debug, Clone, PartialEq)]
pub struct MapSyncConfig {
    /// Grace period between hover-end and hiding the highlight.
    pub hover_hide_delay: Duration,
    /// Minimum center movement (degrees, either axis) worth reporting.
    pub viewport_epsilon: f64,
}

impl Default for MapSyncConfig {
    fn default() -> Self {
        Self {
            hover_hide_delay: Duration::from_millis(150),
            viewport_epsilon: 1e-6,
        }
    }
}

/// Observable controller state. Selection takes precedence over hover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSyncState {
    Idle,
    Hovering(PlaceId),
    PendingHide(PlaceId),
    Selected(PlaceId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FitRequest {
    Center(Coordinates),
    Bounds(Bounds),
}

#[derive(Default)]
struct Viewport {
    center: Option<Coordinates>,
    last_fitted_place_ids: BTreeSet<PlaceId>,
}

#[derive(Default)]
struct SyncInner {
    hover: HoverState,
    selected: Option<PlaceId>,
    tab: Tab,
    viewport: Viewport,
    map: Option<Arc<dyn MapWidget>>,
    pending_fit: Option<FitRequest>,
    next_timer_id: u64,
}

struct Shared {
    config: MapSyncConfig,
    bus: EventBus,
    inner: Mutex<SyncInner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SyncInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_event(self: &Arc<Self>, event: &DomainEvent) {
        match event {
            DomainEvent::SearchResults { places } => self.on_search_results(places),
            DomainEvent::PlaceSelected { place, .. } => self.on_place_selected(place),
            DomainEvent::PlaceHoverChanged { place_id, hovering: true } => self.hover_start(place_id),
            DomainEvent::PlaceHoverChanged { place_id, hovering: false } => self.hover_end(place_id),
            DomainEvent::SelectionCleared => {
                self.lock().selected = None;
            }
            DomainEvent::TabChanged { tab } => self.on_tab_changed(*tab),
            // Our own outputs
            DomainEvent::HighlightChanged { .. } | DomainEvent::ViewportChanged { .. } => {}
        }
    }

    fn hover_start(self: &Arc<Self>, place_id: &PlaceId) {
        let previous = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.hover, HoverState::Hovering(place_id.clone()))
        };
        let changed = previous.highlighted() != Some(place_id);
        // Dropping the previous state cancels any pending hide
        drop(previous);

        trace!(place_id = %place_id, changed, "hover start");
        if changed {
            self.bus.publish(DomainEvent::HighlightChanged {
                place_id: Some(place_id.clone()),
            });
        }
    }

    fn hover_end(self: &Arc<Self>, place_id: &PlaceId) {
        let mut inner = self.lock();
        if !matches!(&inner.hover, HoverState::Hovering(id) if id == place_id) {
            trace!(place_id = %place_id, "hover end for a marker that is not hovered, ignored");
            return;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            // No runtime to run the timer on; hide immediately
            inner.hover = HoverState::Idle;
            drop(inner);
            self.bus.publish(DomainEvent::HighlightChanged { place_id: None });
            return;
        }

        inner.next_timer_id += 1;
        let timer_id = inner.next_timer_id;
        let weak: Weak<Shared> = Arc::downgrade(self);
        let timer = HideTimer::start(timer_id, self.config.hover_hide_delay, move || {
            if let Some(shared) = weak.upgrade() {
                shared.hide_timer_fired(timer_id);
            }
        });
        inner.hover = HoverState::PendingHide {
            place_id: place_id.clone(),
            timer,
        };
        trace!(place_id = %place_id, timer_id, "hover end, hide pending");
    }

    fn hide_timer_fired(&self, timer_id: u64) {
        {
            let mut inner = self.lock();
            let current = matches!(&inner.hover, HoverState::PendingHide { timer, .. } if timer.id() == timer_id);
            if !current {
                return;
            }
            if let HoverState::PendingHide { timer, place_id } = std::mem::take(&mut inner.hover) {
                timer.disarm();
                trace!(place_id = %place_id, "hide timer fired");
            }
        }
        self.bus.publish(DomainEvent::HighlightChanged { place_id: None });
    }

    fn on_place_selected(&self, place: &Place) {
        let map = {
            let mut inner = self.lock();
            inner.selected = Some(place.id.clone());
            inner.map.clone()
        };
        if let (Some(map), true) = (map, place.has_location()) {
            map.set_center(place.location);
        }
    }

    fn on_tab_changed(&self, tab: Tab) {
        let previous = {
            let mut inner = self.lock();
            inner.tab = tab;
            std::mem::take(&mut inner.hover)
        };
        let had_highlight = previous.highlighted().is_some();
        drop(previous);

        if had_highlight {
            self.bus.publish(DomainEvent::HighlightChanged { place_id: None });
        }
    }

    fn on_search_results(&self, places: &[Place]) {
        if places.is_empty() {
            // Viewport stays put, but the next result set must fit again
            self.lock().viewport.last_fitted_place_ids.clear();
            return;
        }
        let Some(bounds) = Bounds::covering(places.iter().map(|p| p.location)) else {
            debug!(count = places.len(), "no usable coordinates in results, viewport unchanged");
            return;
        };
        let ids: BTreeSet<PlaceId> = places.iter().map(|p| p.id.clone()).collect();
        let fit = if bounds.is_point() {
            FitRequest::Center(bounds.south_west)
        } else {
            FitRequest::Bounds(bounds)
        };

        let map = {
            let mut inner = self.lock();
            if inner.viewport.last_fitted_place_ids == ids {
                trace!("same result set already fitted");
                return;
            }
            inner.viewport.last_fitted_place_ids = ids;
            match inner.map.clone() {
                Some(map) => map,
                None => {
                    inner.pending_fit = Some(fit);
                    return;
                }
            }
        };
        apply_fit(map.as_ref(), fit);
    }

    fn on_map_idle(&self, center: Coordinates) -> bool {
        let moved = {
            let mut inner = self.lock();
            let eps = self.config.viewport_epsilon;
            let moved = match inner.viewport.center {
                None => true,
                Some(prev) => (prev.lat - center.lat).abs() > eps || (prev.lng - center.lng).abs() > eps,
            };
            if moved {
                inner.viewport.center = Some(center);
                // The fitted view is gone once the map moves
                inner.viewport.last_fitted_place_ids.clear();
            }
            moved
        };
        if moved {
            self.bus.publish(DomainEvent::ViewportChanged { center });
        }
        moved
    }
}

fn apply_fit(map: &dyn MapWidget, fit: FitRequest) {
    match fit {
        FitRequest::Center(center) => map.set_center(center),
        FitRequest::Bounds(bounds) => map.fit_bounds(bounds),
    }
}

/// Map-side state owner. Dropping it unsubscribes every handler and cancels
/// any pending hide.
pub struct MapSyncController {
    // Declared first so handlers are gone before the state is released
    subscriptions: Vec<Subscription>,
    shared: Arc<Shared>,
}

impl MapSyncController {
    pub fn new(bus: &EventBus, config: MapSyncConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            bus: bus.clone(),
            inner: Mutex::new(SyncInner::default()),
        });

        let kinds = [
            EventKind::SearchResults,
            EventKind::PlaceSelected,
            EventKind::PlaceHoverChanged,
            EventKind::SelectionCleared,
            EventKind::TabChanged,
        ];
        let subscriptions = kinds
            .into_iter()
            .map(|kind| {
                let weak = Arc::downgrade(&shared);
                bus.subscribe(kind, move |event| {
                    if let Some(shared) = weak.upgrade() {
                        shared.handle_event(event);
                    }
                    Ok(())
                })
            })
            .collect();

        Self {
            subscriptions,
            shared,
        }
    }

    /// The map finished loading. Applies any fit requested before it existed.
    pub fn attach_map(&self, map: Arc<dyn MapWidget>) {
        let pending = {
            let mut inner = self.shared.lock();
            inner.map = Some(map.clone());
            inner.pending_fit.take()
        };
        debug!(pending_fit = pending.is_some(), "map attached");
        if let Some(fit) = pending {
            apply_fit(map.as_ref(), fit);
        }
    }

    /// The map was unmounted.
    pub fn detach_map(&self) {
        self.shared.lock().map = None;
        debug!("map detached");
    }

    /// Idle callback from the widget. Returns whether a change was reported.
    pub fn on_map_idle(&self, center: Coordinates) -> bool {
        self.shared.on_map_idle(center)
    }

    /// Click on the map itself. Background clicks clear the selection;
    /// clicks that bubbled up from a marker are ignored here.
    pub fn on_map_click(&self, from_marker: bool) {
        if from_marker {
            return;
        }
        let had_selection = self.shared.lock().selected.take().is_some();
        if had_selection {
            self.shared.bus.publish(DomainEvent::SelectionCleared);
        }
    }

    pub fn on_marker_click(&self, place: Place) {
        let tab = {
            let mut inner = self.shared.lock();
            inner.selected = Some(place.id.clone());
            inner.tab
        };
        self.shared.bus.publish(DomainEvent::PlaceSelected { place, tab });
    }

    pub fn state(&self) -> MapSyncState {
        let inner = self.shared.lock();
        if let Some(id) = &inner.selected {
            return MapSyncState::Selected(id.clone());
        }
        match &inner.hover {
            HoverState::Idle => MapSyncState::Idle,
            HoverState::Hovering(id) => MapSyncState::Hovering(id.clone()),
            HoverState::PendingHide { place_id, .. } => MapSyncState::PendingHide(place_id.clone()),
        }
    }

    pub fn highlighted_id(&self) -> Option<PlaceId> {
        self.shared.lock().hover.highlighted().cloned()
    }

    pub fn selected_id(&self) -> Option<PlaceId> {
        self.shared.lock().selected.clone()
    }

    pub fn current_tab(&self) -> Tab {
        self.shared.lock().tab
    }

    pub fn viewport_center(&self) -> Option<Coordinates> {
        self.shared.lock().viewport.center
    }

    pub fn last_fitted_place_ids(&self) -> BTreeSet<PlaceId> {
        self.shared.lock().viewport.last_fitted_place_ids.clone()
    }

    pub fn zoom(&self) -> Option<f64> {
        let map = self.shared.lock().map.clone();
        map.map(|m| m.zoom())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
