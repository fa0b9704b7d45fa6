use chrono::{DateTime, SecondsFormat, Utc};
use geo::{Distance, Haversine, Point};
use std::fmt;

use crate::identity::PointRef;

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("coordinate out of bounds: lat {lat}, lon {lon}")]
    CoordinateOutOfBounds { lat: f64, lon: f64 },
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
}

/// A validated WGS84 coordinate.
///
/// Stored as a `geo::Point` with x = longitude and y = latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    point: Point,
}

impl GeoPoint {
    /// Fails unless `-90 <= lat <= 90` and `-180 <= lon <= 180`. NaN is rejected.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !((MIN_LAT..=MAX_LAT).contains(&lat) && (MIN_LON..=MAX_LON).contains(&lon)) {
            return Err(GeoError::CoordinateOutOfBounds { lat, lon });
        }
        Ok(Self {
            point: Point::new(lon, lat),
        })
    }

    pub fn lat(&self) -> f64 {
        self.point.y()
    }

    pub fn lon(&self) -> f64 {
        self.point.x()
    }

    /// Great-circle distance in kilometres.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        Haversine.distance(self.point, other.point) / 1000.0
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat(), self.lon())
    }
}

/// ISO-8601 in UTC, e.g. `2024-03-01T08:15:00Z`.
///
/// Fractional seconds are written with as many digits as they need, so
/// parsing the result gives back the same instant.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an RFC 3339 timestamp with any offset and normalises it to UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A location observed at a point in time.
///
/// Never mutated after construction. Deduplication of timed points is by
/// identity (see [`PointRef`]), so two timed points with equal
/// fields are still distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedPoint {
    location: GeoPoint,
    timestamp: Option<DateTime<Utc>>,
}

impl TimedPoint {
    pub fn new(location: GeoPoint, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            location,
            timestamp,
        }
    }

    pub fn location(&self) -> &GeoPoint {
        &self.location
    }

    pub fn lat(&self) -> f64 {
        self.location.lat()
    }

    pub fn lon(&self) -> f64 {
        self.location.lon()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Observed movement between two timed points.
///
/// The length is computed once at construction. Both endpoints may be the same
/// point, which yields a zero-length edge.
#[derive(Debug, Clone)]
pub struct PathEdge {
    a: PointRef,
    b: PointRef,
    length_km: f64,
}

impl PathEdge {
    pub fn new(a: PointRef, b: PointRef) -> Self {
        let length_km = a.location().distance_to(b.location());
        Self { a, b, length_km }
    }

    pub fn a(&self) -> &PointRef {
        &self.a
    }

    pub fn b(&self) -> &PointRef {
        &self.b
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }
}
