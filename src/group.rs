use serde::Serialize;
use std::collections::HashSet;

use crate::identity::{EdgeRef, PointRef};

/// Deduplicating set of point and edge handles.
///
/// Used both as the data of an imported file and as a single grid cell.
/// Membership is by identity: adding a handle that is already present is a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct PointPathGroup {
    points: HashSet<PointRef>,
    paths: HashSet<EdgeRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatistics {
    pub total_points: usize,
    pub total_paths: usize,
}

impl PointPathGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts<P, E>(points: P, paths: E) -> Self
    where
        P: IntoIterator<Item = PointRef>,
        E: IntoIterator<Item = EdgeRef>,
    {
        let mut group = Self::new();
        group.add_points(points);
        group.add_paths(paths);
        group
    }

    pub fn add_points<I: IntoIterator<Item = PointRef>>(&mut self, points: I) {
        self.points.extend(points);
    }

    pub fn add_paths<I: IntoIterator<Item = EdgeRef>>(&mut self, paths: I) {
        self.paths.extend(paths);
    }

    /// Removes every listed point in a single pass over the group.
    pub fn remove_points(&mut self, points: &[PointRef]) {
        if points.is_empty() || self.points.is_empty() {
            return;
        }
        let doomed: HashSet<&PointRef> = points.iter().collect();
        self.points.retain(|p| !doomed.contains(p));
    }

    /// Removes every listed edge in a single pass over the group.
    pub fn remove_paths(&mut self, paths: &[EdgeRef]) {
        if paths.is_empty() || self.paths.is_empty() {
            return;
        }
        let doomed: HashSet<&EdgeRef> = paths.iter().collect();
        self.paths.retain(|e| !doomed.contains(e));
    }

    pub fn contains_point(&self, point: &PointRef) -> bool {
        self.points.contains(point)
    }

    pub fn contains_path(&self, path: &EdgeRef) -> bool {
        self.paths.contains(path)
    }

    pub fn points(&self) -> impl Iterator<Item = &PointRef> {
        self.points.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &EdgeRef> {
        self.paths.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.paths.is_empty()
    }

    pub fn get_statistics(&self) -> GroupStatistics {
        GroupStatistics {
            total_points: self.points.len(),
            total_paths: self.paths.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_point::{GeoPoint, PathEdge, TimedPoint};

    fn point(lat: f64, lon: f64) -> PointRef {
        PointRef::new(TimedPoint::new(GeoPoint::new(lat, lon).unwrap(), None))
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut group = PointPathGroup::new();
        let p = point(10.0, 10.0);
        let q = point(11.0, 11.0);
        let e = EdgeRef::new(PathEdge::new(p.clone(), q.clone()));

        group.add_points([p.clone(), q.clone()]);
        group.add_points([p.clone()]);
        group.add_paths([e.clone()]);
        group.add_paths([e.clone(), e]);

        assert_eq!(
            group.get_statistics(),
            GroupStatistics {
                total_points: 2,
                total_paths: 1
            }
        );
    }

    #[test]
    fn test_coordinate_twins_both_kept() {
        let mut group = PointPathGroup::new();
        group.add_points([point(5.0, 5.0), point(5.0, 5.0)]);
        assert_eq!(group.get_statistics().total_points, 2);
    }

    #[test]
    fn test_batched_removal() {
        let points: Vec<PointRef> = (0..10).map(|i| point(i as f64, i as f64)).collect();
        let edges: Vec<EdgeRef> = points
            .windows(2)
            .map(|w| EdgeRef::new(PathEdge::new(w[0].clone(), w[1].clone())))
            .collect();
        let mut group = PointPathGroup::from_parts(points.clone(), edges.clone());

        group.remove_points(&points[..4]);
        group.remove_paths(&edges[..3]);

        let stats = group.get_statistics();
        assert_eq!(stats.total_points, 6);
        assert_eq!(stats.total_paths, 6);
        assert!(!group.contains_point(&points[0]));
        assert!(group.contains_point(&points[4]));
        assert!(!group.contains_path(&edges[2]));
        assert!(group.contains_path(&edges[3]));
    }

    #[test]
    fn test_removing_absent_items_is_noop() {
        let mut group = PointPathGroup::from_parts([point(1.0, 1.0)], Vec::<EdgeRef>::new());
        group.remove_points(&[point(1.0, 1.0)]);
        group.remove_points(&[]);
        assert_eq!(group.get_statistics().total_points, 1);
    }
}
