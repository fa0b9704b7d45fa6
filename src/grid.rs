//! Fixed-resolution world grid over imported location history.
//!
//! The world is split into `LAT_CELLS` x `LON_CELLS` rectangular cells. Every
//! point is indexed into the cell its coordinates fall in; every edge is
//! indexed into the cells of both its endpoints. Cell assignment is a linear
//! lat/lon mapping with no wraparound at the antimeridian.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::group::{GroupStatistics, PointPathGroup};
use crate::identity::{EdgeRef, PointRef};
use crate::viewport::Viewport;

/// Latitude bands (10 degrees each).
pub const LAT_CELLS: usize = 18;
/// Longitude bands (10 degrees each).
pub const LON_CELLS: usize = 36;
pub const CELL_COUNT: usize = LAT_CELLS * LON_CELLS;

pub(crate) fn row_of(lat: f64, lat_cells: usize) -> usize {
    band((lat + 90.0) / 180.0, lat_cells)
}

pub(crate) fn col_of(lon: f64, lon_cells: usize) -> usize {
    band((lon + 180.0) / 360.0, lon_cells)
}

fn band(fraction: f64, cells: usize) -> usize {
    let raw = (fraction * cells as f64).floor();
    if raw.is_nan() || raw < 0.0 {
        0
    } else {
        (raw as usize).min(cells - 1)
    }
}

/// Index of the cell containing `(lat, lon)`.
///
/// Out-of-range input is clamped to the nearest edge cell; `lat = 90` and
/// `lon = 180` land in the last row and column.
pub fn cell_index(lat: f64, lon: f64) -> usize {
    row_of(lat, LAT_CELLS) * LON_CELLS + col_of(lon, LON_CELLS)
}

fn point_cell(point: &PointRef) -> usize {
    cell_index(point.lat(), point.lon())
}

/// One imported location-history file.
///
/// Identity is the generated `id`; several files may share a `name`.
#[derive(Debug, Clone)]
pub struct ImportedFile {
    id: String,
    name: String,
    data: PointPathGroup,
}

impl ImportedFile {
    pub fn new(name: impl Into<String>, data: PointPathGroup) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, data)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, data: PointPathGroup) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &PointPathGroup {
        &self.data
    }

    pub fn get_statistics(&self) -> GroupStatistics {
        self.data.get_statistics()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStatistics {
    pub points_count: usize,
    pub edges_count: usize,
}

/// Lightweight description of an imported file for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    pub points: usize,
    pub edges: usize,
}

/// Points and edges relevant to a viewport.
#[derive(Debug, Clone, Default)]
pub struct ViewportQuery {
    pub points: Vec<PointRef>,
    pub edges: Vec<EdgeRef>,
}

/// Grid-indexed store of every imported point and edge.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cells: Vec<PointPathGroup>,
    files: Vec<ImportedFile>,
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::create_empty()
    }
}

impl GridIndex {
    pub fn create_empty() -> Self {
        Self {
            cells: vec![PointPathGroup::new(); CELL_COUNT],
            files: Vec::new(),
        }
    }

    pub fn lat_cells(&self) -> usize {
        LAT_CELLS
    }

    pub fn lon_cells(&self) -> usize {
        LON_CELLS
    }

    pub(crate) fn cells(&self) -> &[PointPathGroup] {
        &self.cells
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> Option<&mut PointPathGroup> {
        self.cells.get_mut(index)
    }

    pub(crate) fn push_file_unindexed(&mut self, file: ImportedFile) {
        self.files.push(file);
    }

    /// Adds a file and indexes its points and edges into the grid.
    ///
    /// A file whose id is already present replaces the stored one.
    pub fn add_file(&mut self, file: ImportedFile) {
        if self.files.iter().any(|f| f.id == file.id) {
            debug!(id = %file.id, "Replacing file with the same id");
            self.remove_file_by_id(&file.id);
        }

        self.index_group(&file.data);

        let stats = file.get_statistics();
        info!(
            id = %file.id,
            name = %file.name,
            points = stats.total_points,
            edges = stats.total_paths,
            "Indexed file"
        );
        self.files.push(file);
    }

    pub(crate) fn index_group(&mut self, group: &PointPathGroup) {
        for point in group.points() {
            self.cells[point_cell(point)].add_points([point.clone()]);
        }
        for edge in group.paths() {
            let first = point_cell(edge.a());
            let second = point_cell(edge.b());
            self.cells[first].add_paths([edge.clone()]);
            if second != first {
                self.cells[second].add_paths([edge.clone()]);
            }
        }
    }

    /// Removes the stored file with the same id as `file`.
    pub fn remove_file(&mut self, file: &ImportedFile) -> Option<ImportedFile> {
        self.remove_file_by_id(&file.id)
    }

    /// Removes a file and purges its points and edges from every cell.
    ///
    /// Returns `None` without touching the grid if no file has this id.
    pub fn remove_file_by_id(&mut self, id: &str) -> Option<ImportedFile> {
        let Some(position) = self.files.iter().position(|f| f.id == id) else {
            debug!(id, "Remove requested for unknown file");
            return None;
        };
        let file = self.files.remove(position);

        let mut points_by_cell: HashMap<usize, Vec<PointRef>> = HashMap::new();
        for point in file.data.points() {
            points_by_cell
                .entry(point_cell(point))
                .or_default()
                .push(point.clone());
        }

        let mut edges_by_cell: HashMap<usize, Vec<EdgeRef>> = HashMap::new();
        for edge in file.data.paths() {
            let first = point_cell(edge.a());
            let second = point_cell(edge.b());
            edges_by_cell.entry(first).or_default().push(edge.clone());
            if second != first {
                edges_by_cell.entry(second).or_default().push(edge.clone());
            }
        }

        for (cell, points) in &points_by_cell {
            if let Some(group) = self.cells.get_mut(*cell) {
                group.remove_points(points);
            }
        }
        for (cell, edges) in &edges_by_cell {
            if let Some(group) = self.cells.get_mut(*cell) {
                group.remove_paths(edges);
            }
        }

        info!(id = %file.id, name = %file.name, "Removed file");
        Some(file)
    }

    /// Collects points inside the viewport and edges with at least one
    /// endpoint inside it.
    ///
    /// Only the cells covering the viewport are visited.
    pub fn query_viewport(&self, viewport: &Viewport) -> ViewportQuery {
        let row_start = row_of(viewport.min_lat(), LAT_CELLS);
        let row_end = row_of(viewport.max_lat(), LAT_CELLS);
        let col_start = col_of(viewport.min_lon(), LON_CELLS);
        let col_end = col_of(viewport.max_lon(), LON_CELLS);

        let mut seen_points: HashSet<&PointRef> = HashSet::new();
        let mut seen_edges: HashSet<&EdgeRef> = HashSet::new();
        let mut result = ViewportQuery::default();

        for row in row_start..=row_end {
            for col in col_start..=col_end {
                let cell = &self.cells[row * LON_CELLS + col];
                for point in cell.points() {
                    if viewport.contains(point.location()) && seen_points.insert(point) {
                        result.points.push(point.clone());
                    }
                }
                for edge in cell.paths() {
                    let touches = viewport.contains(edge.a().location())
                        || viewport.contains(edge.b().location());
                    if touches && seen_edges.insert(edge) {
                        result.edges.push(edge.clone());
                    }
                }
            }
        }

        result
    }

    /// Totals summed per file, so items spanning several cells count once.
    pub fn get_statistics(&self) -> GridStatistics {
        self.files
            .iter()
            .map(ImportedFile::get_statistics)
            .fold(GridStatistics::default(), |acc, s| GridStatistics {
                points_count: acc.points_count + s.total_points,
                edges_count: acc.edges_count + s.total_paths,
            })
    }

    pub fn get_all_files(&self) -> Vec<ImportedFile> {
        self.files.clone()
    }

    pub fn files(&self) -> &[ImportedFile] {
        &self.files
    }

    pub fn file_summaries(&self) -> Vec<FileSummary> {
        self.files
            .iter()
            .map(|f| {
                let stats = f.get_statistics();
                FileSummary {
                    id: f.id.clone(),
                    name: f.name.clone(),
                    points: stats.total_points,
                    edges: stats.total_paths,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_point::{GeoPoint, PathEdge, TimedPoint};

    fn point(lat: f64, lon: f64) -> PointRef {
        PointRef::new(TimedPoint::new(GeoPoint::new(lat, lon).unwrap(), None))
    }

    fn edge(a: &PointRef, b: &PointRef) -> EdgeRef {
        EdgeRef::new(PathEdge::new(a.clone(), b.clone()))
    }

    fn file_from(name: &str, coords: &[(f64, f64)]) -> ImportedFile {
        let points: Vec<PointRef> = coords.iter().map(|&(lat, lon)| point(lat, lon)).collect();
        let edges: Vec<EdgeRef> = points.windows(2).map(|w| edge(&w[0], &w[1])).collect();
        ImportedFile::new(name, PointPathGroup::from_parts(points, edges))
    }

    fn cell_totals(grid: &GridIndex) -> (usize, usize) {
        grid.cells().iter().fold((0, 0), |(p, e), c| {
            let s = c.get_statistics();
            (p + s.total_points, e + s.total_paths)
        })
    }

    #[test]
    fn test_cell_index_corners() {
        assert_eq!(cell_index(-90.0, -180.0), 0);
        assert_eq!(cell_index(90.0, 180.0), CELL_COUNT - 1);
        assert_eq!(cell_index(0.0, 0.0), 9 * LON_CELLS + 18);
        assert_eq!(cell_index(-89.9, 179.9), LON_CELLS - 1);
        assert_eq!(cell_index(95.0, -200.0), (LAT_CELLS - 1) * LON_CELLS);
    }

    #[test]
    fn test_empty_grid_has_all_cells() {
        let grid = GridIndex::create_empty();
        assert_eq!(grid.cells().len(), 648);
        assert_eq!(grid.get_statistics(), GridStatistics::default());
    }

    #[test]
    fn test_add_file_statistics_match_file() {
        let mut grid = GridIndex::create_empty();
        let file = file_from("a.json", &[(52.5, 13.4), (48.1, 11.6), (40.7, -74.0)]);
        let expected = file.get_statistics();
        grid.add_file(file);

        assert_eq!(
            grid.get_statistics(),
            GridStatistics {
                points_count: expected.total_points,
                edges_count: expected.total_paths
            }
        );

        let second = file_from("b.json", &[(1.0, 1.0), (2.0, 2.0)]);
        grid.add_file(second);
        assert_eq!(grid.get_statistics().points_count, 5);
        assert_eq!(grid.get_statistics().edges_count, 3);
    }

    #[test]
    fn test_edges_indexed_into_both_endpoint_cells() {
        let mut grid = GridIndex::create_empty();
        let a = point(52.5, 13.4);
        let b = point(40.7, -74.0);
        let c = point(52.6, 13.5);
        let cross = edge(&a, &b);
        let local = edge(&a, &c);
        grid.add_file(ImportedFile::new(
            "x",
            PointPathGroup::from_parts(
                [a.clone(), b.clone(), c.clone()],
                [cross.clone(), local.clone()],
            ),
        ));

        assert!(grid.cells()[point_cell(&a)].contains_path(&cross));
        assert!(grid.cells()[point_cell(&b)].contains_path(&cross));
        assert!(grid.cells()[point_cell(&a)].contains_path(&local));
        // cross in 2 cells, local in 1
        assert_eq!(cell_totals(&grid), (3, 3));
    }

    #[test]
    fn test_remove_restores_statistics_and_cells() {
        let mut grid = GridIndex::create_empty();
        grid.add_file(file_from("keep", &[(10.0, 10.0), (11.0, 11.0)]));
        let before = grid.get_statistics();
        let cells_before = cell_totals(&grid);

        let doomed = file_from("drop", &[(10.5, 10.5), (-33.9, 151.2), (35.7, 139.7)]);
        let id = doomed.id().to_string();
        grid.add_file(doomed);
        assert_ne!(grid.get_statistics(), before);

        let removed = grid.remove_file_by_id(&id);
        assert!(removed.is_some());
        assert_eq!(grid.get_statistics(), before);
        assert_eq!(cell_totals(&grid), cells_before);
        assert_eq!(grid.files().len(), 1);
    }

    #[test]
    fn test_remove_unknown_file_is_noop() {
        let mut grid = GridIndex::create_empty();
        grid.add_file(file_from("a", &[(1.0, 1.0), (2.0, 2.0)]));
        let before = grid.get_statistics();

        let stranger = file_from("a", &[(1.0, 1.0)]);
        assert!(grid.remove_file(&stranger).is_none());
        assert!(grid.remove_file_by_id("missing").is_none());
        assert_eq!(grid.get_statistics(), before);
    }

    #[test]
    fn test_same_name_files_are_independent() {
        let mut grid = GridIndex::create_empty();
        let first = file_from("Timeline.json", &[(50.0, 8.0), (50.1, 8.1)]);
        let second = file_from("Timeline.json", &[(-20.0, -40.0), (-20.1, -40.1)]);
        let first_id = first.id().to_string();
        grid.add_file(first);
        grid.add_file(second.clone());

        let europe = Viewport::new(45.0, 55.0, 0.0, 15.0).unwrap();
        let brazil = Viewport::new(-25.0, -15.0, -45.0, -35.0).unwrap();
        assert_eq!(grid.query_viewport(&europe).points.len(), 2);
        assert_eq!(grid.query_viewport(&brazil).points.len(), 2);

        grid.remove_file_by_id(&first_id);
        assert!(grid.query_viewport(&europe).points.is_empty());
        assert_eq!(grid.query_viewport(&brazil).points.len(), 2);
        assert_eq!(grid.files()[0].id(), second.id());
    }

    #[test]
    fn test_re_adding_same_id_replaces() {
        let mut grid = GridIndex::create_empty();
        let file = file_from("a", &[(1.0, 1.0), (2.0, 2.0)]);
        grid.add_file(file.clone());
        grid.add_file(file);
        assert_eq!(grid.files().len(), 1);
        assert_eq!(grid.get_statistics().points_count, 2);
        assert_eq!(cell_totals(&grid).0, 2);
    }

    #[test]
    fn test_query_world_returns_everything() {
        let mut grid = GridIndex::create_empty();
        grid.add_file(file_from("a", &[(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0)]));
        let all = grid.query_viewport(&Viewport::world());
        assert_eq!(all.points.len(), 3);
        assert_eq!(all.edges.len(), 2);
    }

    #[test]
    fn test_query_disjoint_is_empty() {
        let mut grid = GridIndex::create_empty();
        grid.add_file(file_from("a", &[(52.5, 13.4), (52.6, 13.5)]));
        let far = Viewport::new(-50.0, -40.0, 100.0, 110.0).unwrap();
        let result = grid.query_viewport(&far);
        assert!(result.points.is_empty());
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_query_keeps_edge_with_one_endpoint_inside() {
        let mut grid = GridIndex::create_empty();
        grid.add_file(file_from("a", &[(52.5, 13.4), (40.7, -74.0)]));
        let berlin = Viewport::new(52.0, 53.0, 13.0, 14.0).unwrap();
        let result = grid.query_viewport(&berlin);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn test_query_filters_within_cell() {
        let mut grid = GridIndex::create_empty();
        // same 10 degree cell, only one inside the viewport
        grid.add_file(file_from("a", &[(51.0, 11.0), (58.0, 18.0)]));
        let vp = Viewport::new(50.5, 51.5, 10.5, 11.5).unwrap();
        let result = grid.query_viewport(&vp);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.edges.len(), 1);

        let neither = Viewport::new(53.0, 54.0, 13.0, 14.0).unwrap();
        let result = grid.query_viewport(&neither);
        assert!(result.points.is_empty());
        assert!(result.edges.is_empty());
    }
}
