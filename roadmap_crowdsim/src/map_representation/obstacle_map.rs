use crate::map_representation::map::{Map, VisibilityOracle};
use crate::{Point, Vec2f};

/// A static environment made of closed polygonal obstacles.
///
/// Each obstacle is a vertex loop; the last vertex connects back to the
/// first. Two-vertex obstacles behave as thin walls.
#[derive(Clone, Debug, Default)]
pub struct ObstacleMap {
    obstacles: Vec<Vec<Point>>,
}

fn cross(a: &Vec2f, b: &Vec2f) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Signed area of the triangle (a, b, c), positive when c is left of a->b.
fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    cross(&(b - a), &(c - a))
}

/// Whether `p`, known to be collinear with a-b, lies within its bounding box.
fn within_bounds(a: &Point, b: &Point, p: &Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

pub(crate) fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0f64 && d2 < 0f64) || (d1 < 0f64 && d2 > 0f64))
        && ((d3 > 0f64 && d4 < 0f64) || (d3 < 0f64 && d4 > 0f64))
    {
        return true;
    }

    (d1 == 0f64 && within_bounds(q1, q2, p1))
        || (d2 == 0f64 && within_bounds(q1, q2, p2))
        || (d3 == 0f64 && within_bounds(p1, p2, q1))
        || (d4 == 0f64 && within_bounds(p1, p2, q2))
}

/// Point of the segment a-b closest to `p`.
fn closest_point_on_segment(a: &Point, b: &Point, p: &Point) -> Point {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0f64 {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0f64, 1f64);
    a + ab * t
}

/// Squared distance from `p` to the segment a-b.
pub(crate) fn dist_sq_point_segment(a: &Point, b: &Point, p: &Point) -> f64 {
    (p - closest_point_on_segment(a, b, p)).norm_squared()
}

/// Squared distance between the segments p1-p2 and q1-q2.
pub(crate) fn dist_sq_segment_segment(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> f64 {
    if segments_intersect(p1, p2, q1, q2) {
        return 0f64;
    }
    dist_sq_point_segment(q1, q2, p1)
        .min(dist_sq_point_segment(q1, q2, p2))
        .min(dist_sq_point_segment(p1, p2, q1))
        .min(dist_sq_point_segment(p1, p2, q2))
}

/// Ray-casting point-in-polygon test.
fn point_in_polygon(point: &Point, vertices: &[Point]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (vi, vj) = (vertices[i], vertices[j]);
        if (vi.y > point.y) != (vj.y > point.y) {
            let intersect_x = (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x;
            if point.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

impl ObstacleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an obstacle and returns its index.
    pub fn add_obstacle(&mut self, vertices: Vec<Point>) -> usize {
        self.obstacles.push(vertices);
        self.obstacles.len() - 1
    }

    pub fn obstacles(&self) -> &[Vec<Point>] {
        &self.obstacles
    }

    fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> {
        self.obstacles.iter().flat_map(|vertices| {
            let n = vertices.len();
            (0..n).map(move |i| (&vertices[i], &vertices[(i + 1) % n]))
        })
    }
}

impl VisibilityOracle for ObstacleMap {
    fn query_visibility(&self, from: Point, to: Point, clearance: f64) -> bool {
        if (to - from).norm_squared() == 0f64 {
            return true;
        }
        let clearance_sq = clearance * clearance;
        self.edges().all(|(a, b)| {
            !segments_intersect(&from, &to, a, b)
                && dist_sq_segment_segment(&from, &to, a, b) >= clearance_sq
        })
    }
}

impl Map for ObstacleMap {
    fn get_occupancy(&self, position: Point) -> Option<bool> {
        Some(
            self.obstacles
                .iter()
                .any(|vertices| point_in_polygon(&position, vertices)),
        )
    }

    fn nearest_obstacle(&self, position: Point, max_distance: f64) -> Option<Point> {
        if self.get_occupancy(position) == Some(true) {
            return Some(position);
        }
        self.edges()
            .map(|(a, b)| closest_point_on_segment(a, b, &position))
            .map(|q| ((q - position).norm_squared(), q))
            .filter(|(d, _)| *d <= max_distance * max_distance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, q)| q)
    }
}
