use tracing::{debug, info};

use crate::error::RoadmapError;
use crate::map_representation::map::VisibilityOracle;
use crate::roadmap::dijkstra::distances_from;
use crate::Point;

/// Distance recorded for vertices with no path to a goal.
pub const UNREACHED: f64 = 9e9;

/// A single roadmap vertex
#[derive(Clone, Debug, PartialEq)]
pub struct RoadmapVertex {
    pub position: Point,
    /// Vertices visible from this one, in ascending index order.
    pub neighbors: Vec<usize>,
    /// Shortest-path distance to each goal, [`UNREACHED`] if there is none.
    pub dist_to_goal: Vec<f64>,
}

/// A visibility graph over fixed positions with a precomputed distance
/// field to every goal.
///
/// The first `goal_count` vertices are the goals: vertex `g` is goal `g`.
/// A roadmap is immutable once built and is meant to be shared (e.g. behind
/// an `Arc`) between every agent's planner.
#[derive(Clone, Debug)]
pub struct Roadmap {
    vertices: Vec<RoadmapVertex>,
    goal_count: usize,
}

impl Roadmap {
    /// Connects every pair of mutually visible positions at `clearance` and
    /// computes the distance from every vertex to each of the first
    /// `goal_count` vertices.
    pub fn build<O: VisibilityOracle + ?Sized>(
        positions: Vec<Point>,
        goal_count: usize,
        clearance: f64,
        oracle: &O,
    ) -> Result<Self, RoadmapError> {
        validate_positions(&positions, goal_count)?;
        let neighbors = visibility_rows(&positions, clearance, oracle);
        Self::from_adjacency(positions, neighbors, goal_count)
    }

    /// Builds a roadmap from an explicit adjacency list instead of querying
    /// an oracle. `neighbors[i]` lists the vertices reachable from `i`.
    pub fn from_adjacency(
        positions: Vec<Point>,
        neighbors: Vec<Vec<usize>>,
        goal_count: usize,
    ) -> Result<Self, RoadmapError> {
        validate_positions(&positions, goal_count)?;
        let n = positions.len();
        if neighbors.len() != n {
            return Err(RoadmapError::AdjacencyLength {
                expected: n,
                got: neighbors.len(),
            });
        }
        for (vertex, row) in neighbors.iter().enumerate() {
            if let Some(&neighbor) = row.iter().find(|&&j| j >= n) {
                return Err(RoadmapError::NeighborOutOfRange { vertex, neighbor });
            }
        }

        let mut vertices: Vec<RoadmapVertex> = positions
            .into_iter()
            .zip(neighbors)
            .map(|(position, neighbors)| RoadmapVertex {
                position,
                neighbors,
                dist_to_goal: Vec::with_capacity(goal_count),
            })
            .collect();

        let columns = goal_columns(&vertices, goal_count);
        for (v, vertex) in vertices.iter_mut().enumerate() {
            vertex.dist_to_goal = columns.iter().map(|column| column[v]).collect();
        }

        let roadmap = Self {
            vertices,
            goal_count,
        };
        info!(
            vertices = roadmap.len(),
            edges = roadmap.edge_count(),
            goals = goal_count,
            "roadmap built"
        );
        Ok(roadmap)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn goal_count(&self) -> usize {
        self.goal_count
    }

    pub fn vertices(&self) -> &[RoadmapVertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<&RoadmapVertex> {
        self.vertices.get(index)
    }

    /// Position of goal `goal`, `None` if there is no such goal.
    pub fn goal_position(&self, goal: usize) -> Option<Point> {
        if goal >= self.goal_count {
            return None;
        }
        Some(self.vertices[goal].position)
    }

    /// Shortest-path distance from `vertex` to `goal`.
    ///
    /// # Panics
    /// If either index is out of range.
    pub fn distance_to_goal(&self, vertex: usize, goal: usize) -> f64 {
        self.vertices[vertex].dist_to_goal[goal]
    }

    /// Number of directed edges, self-loops included.
    pub fn edge_count(&self) -> usize {
        self.vertices.iter().map(|v| v.neighbors.len()).sum()
    }

    /// Whether every edge `i -> j` has a matching `j -> i`. The oracle is
    /// expected to be symmetric; a `false` here points at an oracle that is
    /// not.
    pub fn is_symmetric(&self) -> bool {
        self.vertices.iter().enumerate().all(|(i, vertex)| {
            vertex
                .neighbors
                .iter()
                .all(|&j| self.vertices[j].neighbors.contains(&i))
        })
    }
}

fn validate_positions(positions: &[Point], goal_count: usize) -> Result<(), RoadmapError> {
    if goal_count > positions.len() {
        return Err(RoadmapError::NotEnoughVertices {
            goals: goal_count,
            vertices: positions.len(),
        });
    }
    if let Some(index) = positions
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite()))
    {
        return Err(RoadmapError::NonFinitePosition { index });
    }
    Ok(())
}

/// One neighbor list per vertex. Row `i` is written only by iteration `i`,
/// so rows can be filled concurrently without locking.
fn visibility_rows<O: VisibilityOracle + ?Sized>(
    positions: &[Point],
    clearance: f64,
    oracle: &O,
) -> Vec<Vec<usize>> {
    let row = |i: usize| -> Vec<usize> {
        (0..positions.len())
            .filter(|&j| oracle.query_visibility(positions[i], positions[j], clearance))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    {
        (0..positions.len()).map(row).collect()
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..positions.len()).into_par_iter().map(row).collect()
    }
}

/// Distance column for every goal. Each run only reads the graph and owns
/// its own column, so goals can be processed concurrently.
fn goal_columns(vertices: &[RoadmapVertex], goal_count: usize) -> Vec<Vec<f64>> {
    let column = |goal: usize| -> Vec<f64> {
        let dist = distances_from(vertices, goal);
        let reached = dist.iter().filter(|&&d| d < UNREACHED).count();
        debug!(goal, reached, "goal distances computed");
        dist
    };

    #[cfg(not(feature = "parallel"))]
    {
        (0..goal_count).map(column).collect()
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..goal_count).into_par_iter().map(column).collect()
    }
}
