//! Location-history "fog of war" index.
//!
//! Imports personal location-history exports, indexes every point and path
//! segment into a fixed lat/lon grid, answers viewport queries, and persists
//! the whole structure as a flat JSON document.
//!
//! ```
//! use fog_of_war::{GridIndex, ImportSource, Viewport, import_batch};
//!
//! let export = r#"[{"startTime": "2024-01-01T08:00:00Z",
//!     "visit": {"topCandidate": {"placeLocation": "geo:52.52,13.40"}}}]"#;
//!
//! let mut grid = GridIndex::create_empty();
//! let report = import_batch(&mut grid, vec![ImportSource::new("Timeline.json", export)]);
//! assert_eq!(report.processed(), 1);
//!
//! let berlin = Viewport::new(52.0, 53.0, 13.0, 14.0).unwrap();
//! assert_eq!(grid.query_viewport(&berlin).points.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod geo_point;
pub mod grid;
pub mod group;
pub mod identity;
pub mod import;
pub mod logging;
pub mod parsers;
pub mod serialize;
pub mod store;
pub mod viewport;

pub use error::FogError;
pub use geo_point::{GeoError, GeoPoint, PathEdge, TimedPoint};
pub use grid::{
    FileSummary, GridIndex, GridStatistics, ImportedFile, LAT_CELLS, LON_CELLS, ViewportQuery,
    cell_index,
};
pub use group::{GroupStatistics, PointPathGroup};
pub use identity::{EdgeRef, PointRef};
pub use import::{ImportReport, ImportSource, import_batch, import_paths};
pub use parsers::{DetectedFormat, ParsedTimeline, parse_bytes};
pub use serialize::SerializedGrid;
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore, load_grid, persist_grid};
pub use viewport::{Viewport, ViewportBounds};
