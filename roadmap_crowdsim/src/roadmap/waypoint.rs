use rand::Rng;
use tracing::warn;

use crate::map_representation::map::VisibilityOracle;
use crate::roadmap::roadmap::Roadmap;
use crate::{Point, Vec2f};

/// Default upper bound on the symmetry-breaking perturbation.
pub const PERTURBATION_MAGNITUDE: f64 = 1e-4;

/// The roadmap vertex an agent should head for this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub vertex: usize,
    /// Straight-line distance to the vertex plus its distance to the goal.
    pub cost: f64,
}

/// Picks the visible vertex minimising `|vertex - position| +
/// dist_to_goal[goal]`. Ties keep the lowest index.
///
/// Visibility is only queried for vertices that would improve on the best
/// candidate so far, which skips most oracle calls on large roadmaps.
///
/// # Panics
/// If `goal` is not a goal of `roadmap`. That means goals were assigned
/// against a different roadmap, which is a construction bug.
pub fn select_waypoint<O: VisibilityOracle + ?Sized>(
    roadmap: &Roadmap,
    position: Point,
    radius: f64,
    goal: usize,
    oracle: &O,
) -> Option<Waypoint> {
    assert!(
        goal < roadmap.goal_count(),
        "goal {} out of range for a roadmap with {} goals",
        goal,
        roadmap.goal_count()
    );

    let mut best: Option<Waypoint> = None;
    for (vertex, candidate) in roadmap.vertices().iter().enumerate() {
        let cost = (candidate.position - position).norm() + candidate.dist_to_goal[goal];
        let improves = best.map_or(true, |b| cost < b.cost);
        if improves && oracle.query_visibility(position, candidate.position, radius) {
            best = Some(Waypoint { vertex, cost });
        }
    }
    best
}

/// Unit-speed velocity toward the best waypoint, before perturbation.
///
/// Returns zero when the agent stands on its goal vertex, and also when no
/// vertex is visible at all; the latter is logged since it usually means the
/// agent has been pushed too close to an obstacle.
pub fn base_preferred_velocity<O: VisibilityOracle + ?Sized>(
    roadmap: &Roadmap,
    position: Point,
    radius: f64,
    goal: usize,
    oracle: &O,
) -> Vec2f {
    let waypoint = match select_waypoint(roadmap, position, radius, goal, oracle) {
        Some(waypoint) => waypoint,
        None => {
            warn!(
                x = position.x,
                y = position.y,
                goal,
                "no roadmap vertex visible, stalling agent"
            );
            return Vec2f::zeros();
        }
    };

    let to_vertex = roadmap.vertices()[waypoint.vertex].position - position;
    if to_vertex.norm_squared() != 0f64 {
        return to_vertex.normalize();
    }

    if waypoint.vertex == goal {
        return Vec2f::zeros();
    }

    // Standing on an intermediate vertex: head straight for the goal.
    let to_goal = roadmap.vertices()[goal].position - position;
    if to_goal.norm_squared() == 0f64 {
        return Vec2f::zeros();
    }
    to_goal.normalize()
}

/// Small random offset added to preferred velocities so that perfectly
/// symmetric configurations do not deadlock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perturbation {
    /// Largest offset length.
    pub magnitude: f64,
}

impl Default for Perturbation {
    fn default() -> Self {
        Self {
            magnitude: PERTURBATION_MAGNITUDE,
        }
    }
}

impl Perturbation {
    pub fn new(magnitude: f64) -> Self {
        Self { magnitude }
    }

    /// Offset with length uniform in `[0, magnitude]` and direction uniform
    /// in `[0, 2π)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2f {
        let angle = rng.gen_range(0f64..std::f64::consts::TAU);
        let dist = rng.gen::<f64>() * self.magnitude;
        Vec2f::new(angle.cos(), angle.sin()) * dist
    }
}
