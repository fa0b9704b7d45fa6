use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::geo_point::{PathEdge, TimedPoint};

/// Shared handle to a [`TimedPoint`] that hashes and compares by identity.
///
/// Clones of a handle are equal to each other. Two handles created from
/// separate `TimedPoint`s are never equal, even if the points hold identical
/// coordinates and timestamps.
#[derive(Debug, Clone)]
pub struct PointRef(Arc<TimedPoint>);

/// Shared handle to a [`PathEdge`] that hashes and compares by identity.
#[derive(Debug, Clone)]
pub struct EdgeRef(Arc<PathEdge>);

macro_rules! identity_handle {
    ($handle:ident, $inner:ty) => {
        impl $handle {
            pub fn new(value: $inner) -> Self {
                Self(Arc::new(value))
            }

            fn addr(&self) -> usize {
                Arc::as_ptr(&self.0) as usize
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $handle {}

        impl Hash for $handle {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.addr().hash(state);
            }
        }

        impl Deref for $handle {
            type Target = $inner;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$inner> for $handle {
            fn from(value: $inner) -> Self {
                Self::new(value)
            }
        }
    };
}

identity_handle!(PointRef, TimedPoint);
identity_handle!(EdgeRef, PathEdge);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_point::GeoPoint;
    use std::collections::HashSet;

    fn timed(lat: f64, lon: f64) -> TimedPoint {
        TimedPoint::new(GeoPoint::new(lat, lon).unwrap(), None)
    }

    #[test]
    fn test_clones_share_identity() {
        let p = PointRef::new(timed(1.0, 2.0));
        assert_eq!(p, p.clone());
    }

    #[test]
    fn test_equal_values_are_distinct() {
        let a = PointRef::new(timed(1.0, 2.0));
        let b = PointRef::new(timed(1.0, 2.0));
        assert_ne!(a, b);

        let set: HashSet<PointRef> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_edge_identity() {
        let a = PointRef::new(timed(1.0, 2.0));
        let b = PointRef::new(timed(3.0, 4.0));
        let e1 = EdgeRef::new(PathEdge::new(a.clone(), b.clone()));
        let e2 = EdgeRef::new(PathEdge::new(a, b));
        assert_ne!(e1, e2);
        assert_eq!(e1, e1.clone());
    }
}
