use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde_json::Value;

use super::{DetectedFormat, EntryKind, Extraction, TimelineEntry, TimelineFormat};
use crate::geo_point::{GeoPoint, parse_timestamp};

/// On-device timeline export: a top-level array of entries.
///
/// ```json
/// [
///   {"startTime": "...", "endTime": "...",
///    "visit": {"topCandidate": {"placeLocation": "geo:52.520008,13.404954"}}},
///   {"startTime": "...", "endTime": "...",
///    "activity": {"start": "geo:...", "end": "geo:...", "topCandidate": {"type": "walking"}}},
///   {"startTime": "...", "endTime": "...",
///    "timelinePath": [{"point": "geo:...", "durationMinutesOffsetFromStartTime": "3"}]}
/// ]
/// ```
pub struct TimelineArrayFormat;

impl TimelineFormat for TimelineArrayFormat {
    fn format(&self) -> DetectedFormat {
        DetectedFormat::TimelineArray
    }

    fn detect(&self, document: &Value) -> bool {
        let Some(first) = document.as_array().and_then(|entries| entries.first()) else {
            return false;
        };
        let candidates = [
            first.pointer("/visit/topCandidate/placeLocation"),
            first.pointer("/activity/start"),
            first.pointer("/activity/end"),
            first.pointer("/timelinePath/0/point"),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .any(|s| s.trim_start().starts_with("geo:"))
    }

    fn extract(&self, document: &Value) -> Extraction {
        let Some(entries) = document.as_array() else {
            return Extraction::default();
        };
        Extraction::from_results(entries.par_iter().map(extract_entry).collect())
    }

    fn name(&self) -> &'static str {
        "Timeline array"
    }
}

fn extract_entry(entry: &Value) -> Option<TimelineEntry> {
    let start_time = entry
        .get("startTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);
    let end_time = entry
        .get("endTime")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    let kind = if let Some(path) = entry.get("timelinePath").and_then(Value::as_array) {
        let points: Vec<(GeoPoint, Option<DateTime<Utc>>)> = path
            .iter()
            .filter_map(|p| {
                let location = p.get("point").and_then(Value::as_str).and_then(parse_geo_string)?;
                Some((location, offset_time(start_time, p)))
            })
            .collect();
        if points.is_empty() {
            return None;
        }
        EntryKind::Path { points }
    } else if let Some(activity) = entry.get("activity") {
        let start = activity
            .get("start")
            .and_then(Value::as_str)
            .and_then(parse_geo_string)?;
        let end = activity
            .get("end")
            .and_then(Value::as_str)
            .and_then(parse_geo_string);
        let mode = activity
            .pointer("/topCandidate/type")
            .and_then(Value::as_str)
            .map(str::to_string);
        EntryKind::Activity { start, end, mode }
    } else if let Some(visit) = entry.get("visit") {
        let location = visit
            .pointer("/topCandidate/placeLocation")
            .and_then(Value::as_str)
            .and_then(parse_geo_string)?;
        EntryKind::Visit { location }
    } else {
        return None;
    };

    Some(TimelineEntry {
        start_time,
        end_time,
        kind,
    })
}

/// Entry start plus `durationMinutesOffsetFromStartTime`, if both exist.
fn offset_time(start_time: Option<DateTime<Utc>>, point: &Value) -> Option<DateTime<Utc>> {
    let start = start_time?;
    let offset = point.get("durationMinutesOffsetFromStartTime")?;
    let minutes = match offset {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    match minutes.and_then(Duration::try_minutes) {
        Some(delta) => start.checked_add_signed(delta),
        None => Some(start),
    }
}

/// Parse a geo string in the format "geo:latitude,longitude".
/// Returns None if the string is malformed or the coordinates are out of range.
pub fn parse_geo_string(geo_str: &str) -> Option<GeoPoint> {
    let coords = geo_str.trim().strip_prefix("geo:")?;
    let (lat, lon) = coords.split_once(',')?;
    if lon.contains(',') {
        return None;
    }

    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;

    GeoPoint::new(latitude, longitude).ok()
}
