use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

use crate::geo_point::{GeoError, GeoPoint, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Geographic rectangle currently visible to the user.
///
/// Immutable; the `with_*` methods return adjusted copies. Bounds are
/// inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    rect: Rect,
}

/// Raw viewport bounds as exchanged with presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Viewport {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, GeoError> {
        let values = [min_lat, max_lat, min_lon, max_lon];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeoError::InvalidViewport(format!(
                "non-finite bound in {values:?}"
            )));
        }
        if min_lat > max_lat {
            return Err(GeoError::InvalidViewport(format!(
                "min_lat {min_lat} > max_lat {max_lat}"
            )));
        }
        if min_lon > max_lon {
            return Err(GeoError::InvalidViewport(format!(
                "min_lon {min_lon} > max_lon {max_lon}"
            )));
        }
        if min_lat < MIN_LAT || max_lat > MAX_LAT || min_lon < MIN_LON || max_lon > MAX_LON {
            return Err(GeoError::InvalidViewport(format!(
                "bounds {values:?} exceed the world rectangle"
            )));
        }

        Ok(Self {
            rect: Rect::new(
                coord! { x: min_lon, y: min_lat },
                coord! { x: max_lon, y: max_lat },
            ),
        })
    }

    pub fn world() -> Self {
        Self {
            rect: Rect::new(
                coord! { x: MIN_LON, y: MIN_LAT },
                coord! { x: MAX_LON, y: MAX_LAT },
            ),
        }
    }

    pub fn from_bounds(bounds: ViewportBounds) -> Result<Self, GeoError> {
        Self::new(bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon)
    }

    pub fn min_lat(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_lat(&self) -> f64 {
        self.rect.max().y
    }

    pub fn min_lon(&self) -> f64 {
        self.rect.min().x
    }

    pub fn max_lon(&self) -> f64 {
        self.rect.max().x
    }

    pub fn bounds(&self) -> ViewportBounds {
        ViewportBounds {
            min_lat: self.min_lat(),
            max_lat: self.max_lat(),
            min_lon: self.min_lon(),
            max_lon: self.max_lon(),
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let (lat, lon) = (point.lat(), point.lon());
        lat >= self.min_lat()
            && lat <= self.max_lat()
            && lon >= self.min_lon()
            && lon <= self.max_lon()
    }

    /// Grows the rectangle by `degrees` on every side, clamped to the world.
    pub fn with_padding(&self, degrees: f64) -> Result<Self, GeoError> {
        Self::new(
            (self.min_lat() - degrees).max(MIN_LAT),
            (self.max_lat() + degrees).min(MAX_LAT),
            (self.min_lon() - degrees).max(MIN_LON),
            (self.max_lon() + degrees).min(MAX_LON),
        )
    }

    /// Same size, recentred on `center` and clamped to the world.
    pub fn with_center(&self, center: &GeoPoint) -> Result<Self, GeoError> {
        let half_lat = (self.max_lat() - self.min_lat()) / 2.0;
        let half_lon = (self.max_lon() - self.min_lon()) / 2.0;
        Self::new(
            (center.lat() - half_lat).max(MIN_LAT),
            (center.lat() + half_lat).min(MAX_LAT),
            (center.lon() - half_lon).max(MIN_LON),
            (center.lon() + half_lon).min(MAX_LON),
        )
    }
}
