use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Axis-aligned lat/lng box. Does not handle antimeridian wrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

impl Bounds {
    pub fn from_point(point: Coordinates) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Smallest box covering every valid point; `None` when none are valid.
    ///
    /// Origin-sentinel and out-of-range coordinates are skipped so a place
    /// with a missing location cannot drag the viewport to (0, 0).
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinates>,
    {
        points
            .into_iter()
            .filter(Coordinates::is_valid)
            .fold(None, |acc: Option<Bounds>, p| match acc {
                None => Some(Bounds::from_point(p)),
                Some(b) => Some(b.extend(p)),
            })
    }

    pub fn extend(self, p: Coordinates) -> Self {
        Self {
            south_west: Coordinates::new(self.south_west.lat.min(p.lat), self.south_west.lng.min(p.lng)),
            north_east: Coordinates::new(self.north_east.lat.max(p.lat), self.north_east.lng.max(p.lng)),
        }
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn is_point(&self) -> bool {
        self.south_west == self.north_east
    }

    pub fn contains(&self, p: Coordinates) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&p.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&p.lng)
    }
}
