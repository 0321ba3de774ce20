use super::Bounds;
use crate::models::Coordinates;

/// The embedded map widget, as seen from the synchronization layer.
///
/// Only these calls are made. Implementations may synchronously fire an idle
/// callback back into the controller; the controller never holds its own
/// lock while calling out.
pub trait MapWidget: Send + Sync {
    fn fit_bounds(&self, bounds: Bounds);
    fn set_center(&self, center: Coordinates);
    fn zoom(&self) -> f64;
}
