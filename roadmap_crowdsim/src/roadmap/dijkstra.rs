//! Single-source shortest paths over the roadmap's visibility graph.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::roadmap::roadmap::{RoadmapVertex, UNREACHED};

/// Priority queue entry. Ordering is reversed so `BinaryHeap` pops the
/// smallest tentative distance first.
#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    dist: f64,
    vertex: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

/// Distances from `source` to every vertex, following each vertex's
/// neighbor list with Euclidean edge lengths.
///
/// Decrease-key is done lazily: an improved vertex is pushed again and the
/// stale entry is skipped when it surfaces. Vertices that are never reached
/// keep [`UNREACHED`].
pub fn distances_from(vertices: &[RoadmapVertex], source: usize) -> Vec<f64> {
    let mut dist = vec![UNREACHED; vertices.len()];
    if source >= vertices.len() {
        return dist;
    }

    dist[source] = 0f64;
    let mut queue = BinaryHeap::new();
    queue.push(QueueEntry {
        dist: 0f64,
        vertex: source,
    });

    while let Some(QueueEntry { dist: d, vertex: u }) = queue.pop() {
        if d > dist[u] {
            continue;
        }
        for &v in &vertices[u].neighbors {
            let candidate = dist[u] + (vertices[v].position - vertices[u].position).norm();
            if candidate < dist[v] {
                dist[v] = candidate;
                queue.push(QueueEntry {
                    dist: candidate,
                    vertex: v,
                });
            }
        }
    }

    dist
}
