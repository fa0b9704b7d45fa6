pub mod semantic_segments;
pub mod timeline_array;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::geo_point::{GeoPoint, PathEdge, TimedPoint};
use crate::group::PointPathGroup;
use crate::identity::{EdgeRef, PointRef};

use semantic_segments::SemanticSegmentsFormat;
use timeline_array::TimelineArrayFormat;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// Top-level array of entries with `"geo:LAT,LON"` locations.
    TimelineArray,
    /// Object with a `semanticSegments` array and `"LAT°, LON°"` locations.
    SemanticSegments,
    Unknown,
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedFormat::TimelineArray => write!(f, "timeline array"),
            DetectedFormat::SemanticSegments => write!(f, "semantic segments"),
            DetectedFormat::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// Stationary stay at one place.
    Visit { location: GeoPoint },
    /// Movement from `start` to `end`, labelled with a transport mode.
    Activity {
        start: GeoPoint,
        end: Option<GeoPoint>,
        mode: Option<String>,
    },
    /// Dense route; each point may carry its own time.
    Path {
        points: Vec<(GeoPoint, Option<DateTime<Utc>>)>,
    },
}

/// One timeline entry, normalised from either export schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub kind: EntryKind,
}

/// Entries pulled out of a document, plus how many were unusable.
#[derive(Debug, Default)]
pub struct Extraction {
    pub entries: Vec<TimelineEntry>,
    pub skipped: usize,
}

impl Extraction {
    fn from_results(results: Vec<Option<TimelineEntry>>) -> Self {
        let total = results.len();
        let entries: Vec<TimelineEntry> = results.into_iter().flatten().collect();
        Self {
            skipped: total - entries.len(),
            entries,
        }
    }
}

/// A location-history export schema.
pub trait TimelineFormat: Sync {
    fn format(&self) -> DetectedFormat;

    fn detect(&self, document: &Value) -> bool;

    /// Malformed entries are counted as skipped, never fatal.
    fn extract(&self, document: &Value) -> Extraction;

    fn name(&self) -> &'static str;
}

pub fn formats() -> [&'static dyn TimelineFormat; 2] {
    [&TimelineArrayFormat, &SemanticSegmentsFormat]
}

/// Normalised points and edges of one export.
#[derive(Debug, Clone)]
pub struct ParsedTimeline {
    pub format: DetectedFormat,
    pub entries: usize,
    pub skipped_entries: usize,
    pub points: Vec<PointRef>,
    pub edges: Vec<EdgeRef>,
}

impl ParsedTimeline {
    pub fn unknown() -> Self {
        Self {
            format: DetectedFormat::Unknown,
            entries: 0,
            skipped_entries: 0,
            points: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_group(self) -> PointPathGroup {
        PointPathGroup::from_parts(self.points, self.edges)
    }
}

pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedTimeline, ParseError> {
    let document: Value = serde_json::from_slice(bytes)?;
    Ok(parse_document(&document))
}

/// Detects the schema of `document` and converts it to points and edges.
///
/// Unrecognised documents yield an empty result with
/// [`DetectedFormat::Unknown`].
pub fn parse_document(document: &Value) -> ParsedTimeline {
    let Some(format) = formats().into_iter().find(|f| f.detect(document)) else {
        debug!("No timeline format matched document");
        return ParsedTimeline::unknown();
    };

    let extraction = format.extract(document);
    let entries = extraction.entries.len();
    let (points, edges) = build_graph(extraction.entries);

    debug!(
        format = format.name(),
        entries,
        skipped = extraction.skipped,
        points = points.len(),
        edges = edges.len(),
        "Parsed timeline"
    );

    ParsedTimeline {
        format: format.format(),
        entries,
        skipped_entries: extraction.skipped,
        points,
        edges,
    }
}

fn timed(location: GeoPoint, timestamp: Option<DateTime<Utc>>) -> PointRef {
    PointRef::new(TimedPoint::new(location, timestamp))
}

fn edge(a: &PointRef, b: &PointRef) -> EdgeRef {
    EdgeRef::new(PathEdge::new(a.clone(), b.clone()))
}

/// Turns entries into points and edges.
///
/// Entries are ordered by start time (missing times first). Between the end
/// of one entry and the start of the next a gap edge is added when their
/// coordinates differ. No distance cutoff is applied.
pub fn build_graph(mut entries: Vec<TimelineEntry>) -> (Vec<PointRef>, Vec<EdgeRef>) {
    entries.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let mut points = Vec::new();
    let mut edges = Vec::new();
    let mut previous_end: Option<PointRef> = None;

    for entry in entries {
        let (start, end) = match entry.kind {
            EntryKind::Path { points: path } => {
                let refs: Vec<PointRef> = path
                    .into_iter()
                    .map(|(location, time)| timed(location, time.or(entry.start_time)))
                    .collect();
                let (Some(first), Some(last)) = (refs.first().cloned(), refs.last().cloned())
                else {
                    continue;
                };
                edges.extend(refs.windows(2).map(|w| edge(&w[0], &w[1])));
                points.extend(refs);
                (first, last)
            }
            EntryKind::Visit { location } => {
                let point = timed(location, entry.start_time);
                points.push(point.clone());
                (point.clone(), point)
            }
            EntryKind::Activity { start, end, .. } => {
                let start_point = timed(start, entry.start_time);
                points.push(start_point.clone());
                let end_point = match end {
                    Some(location) if location != start => {
                        let p = timed(location, entry.end_time.or(entry.start_time));
                        points.push(p.clone());
                        p
                    }
                    Some(_) => start_point.clone(),
                    None => {
                        previous_end = Some(link_gap(&mut edges, previous_end, &start_point));
                        continue;
                    }
                };
                edges.push(edge(&start_point, &end_point));
                (start_point, end_point)
            }
        };

        link_gap(&mut edges, previous_end.take(), &start);
        previous_end = Some(end);
    }

    (points, edges)
}

fn link_gap(
    edges: &mut Vec<EdgeRef>,
    previous_end: Option<PointRef>,
    start: &PointRef,
) -> PointRef {
    if let Some(previous) = previous_end {
        if previous.location() != start.location() {
            edges.push(edge(&previous, start));
        }
    }
    start.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap())
    }

    fn geo(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn visit(hour: u32, lat: f64, lon: f64) -> TimelineEntry {
        TimelineEntry {
            start_time: at(hour),
            end_time: at(hour),
            kind: EntryKind::Visit {
                location: geo(lat, lon),
            },
        }
    }

    #[test]
    fn test_path_points_and_edges() {
        let path = (0..5).map(|i| (geo(50.0 + i as f64 * 0.01, 8.0), None)).collect();
        let entry = TimelineEntry {
            start_time: at(8),
            end_time: at(9),
            kind: EntryKind::Path { points: path },
        };
        let (points, edges) = build_graph(vec![entry]);
        assert_eq!(points.len(), 5);
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|e| e.length_km() >= 0.0));
        assert!(points.iter().all(|p| p.timestamp() == at(8)));
    }

    #[test]
    fn test_gap_edge_between_differing_entries() {
        let (points, edges) = build_graph(vec![visit(8, 50.0, 8.0), visit(10, 50.5, 8.5)]);
        assert_eq!(points.len(), 2);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].a() == &points[0] && edges[0].b() == &points[1]);
    }

    #[test]
    fn test_no_gap_edge_for_same_location() {
        let (points, edges) = build_graph(vec![visit(8, 50.0, 8.0), visit(10, 50.0, 8.0)]);
        assert_eq!(points.len(), 2);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_activity_edge_plus_gap_edge() {
        let activity = TimelineEntry {
            start_time: at(9),
            end_time: at(10),
            kind: EntryKind::Activity {
                start: geo(50.1, 8.1),
                end: Some(geo(50.2, 8.2)),
                mode: Some("walking".into()),
            },
        };
        let (points, edges) = build_graph(vec![visit(8, 50.0, 8.0), activity]);
        assert_eq!(points.len(), 3);
        // one activity edge, one gap edge
        assert_eq!(edges.len(), 2);
        assert_eq!(points[2].timestamp(), at(10));
    }

    #[test]
    fn test_stationary_activity_emits_single_point() {
        let activity = TimelineEntry {
            start_time: at(9),
            end_time: at(10),
            kind: EntryKind::Activity {
                start: geo(50.1, 8.1),
                end: Some(geo(50.1, 8.1)),
                mode: None,
            },
        };
        let (points, edges) = build_graph(vec![activity]);
        assert_eq!(points.len(), 1);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].length_km(), 0.0);
    }

    #[test]
    fn test_entries_sorted_before_linking() {
        let undated = TimelineEntry {
            start_time: None,
            end_time: None,
            kind: EntryKind::Visit {
                location: geo(1.0, 1.0),
            },
        };
        let (points, edges) = build_graph(vec![visit(12, 3.0, 3.0), visit(9, 2.0, 2.0), undated]);
        let lats: Vec<f64> = points.iter().map(|p| p.lat()).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[1].a().lat(), 2.0);
        assert_eq!(edges[1].b().lat(), 3.0);
    }

    #[test]
    fn test_gap_edges_have_no_distance_cutoff() {
        let (_, edges) = build_graph(vec![visit(8, 52.5, 13.4), visit(20, -33.9, 151.2)]);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].length_km() > 15_000.0);
    }

    #[test]
    fn test_unknown_document() {
        let parsed = parse_document(&serde_json::json!({"hello": "world"}));
        assert_eq!(parsed.format, DetectedFormat::Unknown);
        assert!(parsed.is_empty());
        assert!(parsed.edges.is_empty());

        let parsed = parse_document(&serde_json::json!([]));
        assert_eq!(parsed.format, DetectedFormat::Unknown);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(parse_bytes(b"{not json"), Err(ParseError::Json(_))));
    }
}
