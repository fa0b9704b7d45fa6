use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::Value;

use super::{DetectedFormat, EntryKind, Extraction, TimelineEntry, TimelineFormat};
use crate::geo_point::{GeoPoint, parse_timestamp};

/// Timeline export with a `semanticSegments` array.
///
/// Locations are encoded as `"52.5200439°, 13.4049531°"`. Path points carry
/// their own `time`.
pub struct SemanticSegmentsFormat;

impl TimelineFormat for SemanticSegmentsFormat {
    fn format(&self) -> DetectedFormat {
        DetectedFormat::SemanticSegments
    }

    fn detect(&self, document: &Value) -> bool {
        document
            .get("semanticSegments")
            .is_some_and(Value::is_array)
    }

    fn extract(&self, document: &Value) -> Extraction {
        let Some(segments) = document.get("semanticSegments").and_then(Value::as_array) else {
            return Extraction::default();
        };
        Extraction::from_results(segments.par_iter().map(extract_segment).collect())
    }

    fn name(&self) -> &'static str {
        "Semantic segments"
    }
}

fn lat_lng(value: Option<&Value>) -> Option<GeoPoint> {
    value.and_then(Value::as_str).and_then(parse_degree_pair)
}

fn extract_segment(segment: &Value) -> Option<TimelineEntry> {
    let start_time = segment
        .get("startTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    let end_time = segment
        .get("endTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    let kind = if let Some(path) = segment.get("timelinePath").and_then(Value::as_array) {
        let points: Vec<(GeoPoint, Option<DateTime<Utc>>)> = path
            .iter()
            .filter_map(|p| {
                let location = lat_lng(p.get("point"))?;
                let time = p.get("time").and_then(Value::as_str).and_then(parse_timestamp);
                Some((location, time))
            })
            .collect();
        if points.is_empty() {
            return None;
        }
        EntryKind::Path { points }
    } else if let Some(activity) = segment.get("activity") {
        EntryKind::Activity {
            start: lat_lng(activity.pointer("/start/latLng"))?,
            end: lat_lng(activity.pointer("/end/latLng")),
            mode: activity
                .pointer("/topCandidate/type")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    } else if let Some(visit) = segment.get("visit") {
        EntryKind::Visit {
            location: lat_lng(visit.pointer("/topCandidate/placeLocation/latLng"))?,
        }
    } else {
        return None;
    };

    Some(TimelineEntry {
        start_time,
        end_time,
        kind,
    })
}

/// Parse `"LAT°, LON°"` into a validated point.
pub fn parse_degree_pair(raw: &str) -> Option<GeoPoint> {
    let (lat, lon) = raw.split_once(',')?;
    let latitude: f64 = lat.trim().trim_end_matches('°').trim().parse().ok()?;
    let longitude: f64 = lon.trim().trim_end_matches('°').trim().parse().ok()?;
    GeoPoint::new(latitude, longitude).ok()
}
