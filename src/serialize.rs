//! Flat, index-based wire form of a [`GridIndex`].
//!
//! Every distinct point and edge is written once into a global array; cells
//! and files refer to them by position. Loading resolves those positions back
//! into shared handles, so a point referenced by a file, by two cells and by
//! three edges is again a single object after the round trip.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::geo_point::{GeoPoint, PathEdge, TimedPoint, format_timestamp, parse_timestamp};
use crate::grid::{CELL_COUNT, GridIndex, ImportedFile, LAT_CELLS, LON_CELLS};
use crate::group::PointPathGroup;
use crate::identity::{EdgeRef, PointRef};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedGrid {
    #[serde(default)]
    pub lat_cells: Option<usize>,
    #[serde(default)]
    pub lon_cells: Option<usize>,
    #[serde(default)]
    pub points: Vec<SerializedPoint>,
    #[serde(default)]
    pub edges: Vec<SerializedEdge>,
    #[serde(default)]
    pub cells: Vec<SerializedCell>,
    #[serde(default)]
    pub files: Vec<SerializedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPoint {
    pub lat: f64,
    pub lon: f64,
    /// ISO-8601 in UTC, e.g. `2024-03-01T08:15:00Z`.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEdge {
    #[serde(default)]
    pub a: Option<usize>,
    #[serde(default)]
    pub b: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedCell {
    pub cell_index: usize,
    #[serde(default)]
    pub point_indices: Vec<usize>,
    #[serde(default)]
    pub edge_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub point_indices: Vec<usize>,
    #[serde(default)]
    pub edge_indices: Vec<usize>,
}

/// Assigns positions in first-seen order.
#[derive(Default)]
struct Registry {
    point_positions: HashMap<PointRef, usize>,
    edge_positions: HashMap<EdgeRef, usize>,
    points: Vec<SerializedPoint>,
    edges: Vec<SerializedEdge>,
}

impl Registry {
    fn point(&mut self, point: &PointRef) -> usize {
        if let Some(&position) = self.point_positions.get(point) {
            return position;
        }
        let position = self.points.len();
        self.points.push(SerializedPoint {
            lat: point.lat(),
            lon: point.lon(),
            timestamp: point.timestamp().as_ref().map(format_timestamp),
        });
        self.point_positions.insert(point.clone(), position);
        position
    }

    fn edge(&mut self, edge: &EdgeRef) -> usize {
        if let Some(&position) = self.edge_positions.get(edge) {
            return position;
        }
        let a = self.point(edge.a());
        let b = self.point(edge.b());
        let position = self.edges.len();
        self.edges.push(SerializedEdge {
            a: Some(a),
            b: Some(b),
        });
        self.edge_positions.insert(edge.clone(), position);
        position
    }
}

fn resolve<T: Clone>(table: &[Option<T>], indices: &[usize]) -> Vec<T> {
    indices
        .iter()
        .filter_map(|&i| table.get(i).cloned().flatten())
        .collect()
}

impl GridIndex {
    pub fn to_serializable(&self) -> SerializedGrid {
        let mut registry = Registry::default();

        for group in self.cells() {
            for point in group.points() {
                registry.point(point);
            }
        }

        let mut cells = Vec::new();
        for (cell_index, group) in self.cells().iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let point_indices = group.points().map(|p| registry.point(p)).collect();
            let edge_indices = group.paths().map(|e| registry.edge(e)).collect();
            cells.push(SerializedCell {
                cell_index,
                point_indices,
                edge_indices,
            });
        }

        let files = self
            .files()
            .iter()
            .map(|file| SerializedFile {
                id: Some(file.id().to_string()),
                name: file.name().to_string(),
                point_indices: file.data().points().map(|p| registry.point(p)).collect(),
                edge_indices: file.data().paths().map(|e| registry.edge(e)).collect(),
            })
            .collect();

        debug!(
            points = registry.points.len(),
            edges = registry.edges.len(),
            cells = cells.len(),
            "Serialized grid"
        );

        SerializedGrid {
            lat_cells: Some(self.lat_cells()),
            lon_cells: Some(self.lon_cells()),
            points: registry.points,
            edges: registry.edges,
            cells,
            files,
        }
    }

    /// Rebuilds a grid from its wire form.
    ///
    /// Points with invalid coordinates and edges referencing missing points
    /// are dropped. Cell membership is taken from the stored cells when the
    /// stored dimensions match [`LAT_CELLS`] x [`LON_CELLS`]; otherwise every
    /// file is re-indexed from its coordinates.
    pub fn from_serializable(data: SerializedGrid) -> Self {
        let points: Vec<Option<PointRef>> = data
            .points
            .iter()
            .map(|p| match GeoPoint::new(p.lat, p.lon) {
                Ok(location) => {
                    let timestamp = p.timestamp.as_deref().and_then(parse_timestamp);
                    Some(PointRef::new(TimedPoint::new(location, timestamp)))
                }
                Err(e) => {
                    debug!("Dropping stored point: {}", e);
                    None
                }
            })
            .collect();

        let edges: Vec<Option<EdgeRef>> = data
            .edges
            .iter()
            .map(|e| {
                let a = e.a.and_then(|i| points.get(i).cloned().flatten())?;
                let b = e.b.and_then(|i| points.get(i).cloned().flatten())?;
                Some(EdgeRef::new(PathEdge::new(a, b)))
            })
            .collect();

        let dropped_points = points.iter().filter(|p| p.is_none()).count();
        let dropped_edges = edges.iter().filter(|e| e.is_none()).count();
        if dropped_points + dropped_edges > 0 {
            warn!(
                dropped_points,
                dropped_edges, "Stored grid contained unresolvable entries"
            );
        }

        let files: Vec<ImportedFile> = data
            .files
            .iter()
            .map(|f| {
                let group = PointPathGroup::from_parts(
                    resolve(&points, &f.point_indices),
                    resolve(&edges, &f.edge_indices),
                );
                let id = f.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                ImportedFile::with_id(id, f.name.clone(), group)
            })
            .collect();

        let mut grid = GridIndex::create_empty();
        let same_dimensions =
            data.lat_cells == Some(LAT_CELLS) && data.lon_cells == Some(LON_CELLS);

        if same_dimensions {
            for cell in &data.cells {
                if cell.cell_index >= CELL_COUNT {
                    debug!(cell = cell.cell_index, "Skipping out-of-range cell");
                    continue;
                }
                if let Some(group) = grid.cell_mut(cell.cell_index) {
                    group.add_points(resolve(&points, &cell.point_indices));
                    group.add_paths(resolve(&edges, &cell.edge_indices));
                }
            }
            for file in files {
                grid.push_file_unindexed(file);
            }
        } else {
            info!(
                stored_lat_cells = ?data.lat_cells,
                stored_lon_cells = ?data.lon_cells,
                lat_cells = LAT_CELLS,
                lon_cells = LON_CELLS,
                "Grid dimensions changed, re-indexing stored files"
            );
            for file in files {
                grid.index_group(file.data());
                grid.push_file_unindexed(file);
            }
        }

        let stats = grid.get_statistics();
        info!(
            files = grid.files().len(),
            points = stats.points_count,
            edges = stats.edges_count,
            "Loaded grid"
        );
        grid
    }
}
