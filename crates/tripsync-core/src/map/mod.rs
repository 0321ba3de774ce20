//! Map-side synchronization: viewport fitting, debounced hover, selection.

mod bounds;
pub mod controller;
mod hover;
mod widget;

pub use bounds::Bounds;
pub use controller::{MapSyncConfig, MapSyncController, MapSyncState};
pub use widget::MapWidget;
