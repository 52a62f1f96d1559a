use crate::Point;

/// Line-of-sight queries against static obstacles.
///
/// Implementors must be shareable across threads: roadmap construction and
/// waypoint selection may fan queries out over a thread pool.
pub trait VisibilityOracle: Sync {
    /// Returns true when the straight segment `from`-`to` keeps at least
    /// `clearance` away from every obstacle.
    fn query_visibility(&self, from: Point, to: Point, clearance: f64) -> bool;
}

/// Abstract interface for map representation.
pub trait Map: VisibilityOracle + Send {
    /// `Some(true)` if `position` lies inside an obstacle, `None` when the
    /// map knows nothing about that location.
    fn get_occupancy(&self, position: Point) -> Option<bool>;

    /// Closest obstacle point no further than `max_distance` from
    /// `position`. A position inside an obstacle is its own closest point.
    fn nearest_obstacle(&self, position: Point, max_distance: f64) -> Option<Point>;
}
