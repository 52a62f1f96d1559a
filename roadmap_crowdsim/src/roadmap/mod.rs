//! Roadmap construction and per-tick waypoint selection.

pub mod dijkstra;
pub mod roadmap;
pub mod waypoint;

pub use roadmap::{Roadmap, RoadmapVertex, UNREACHED};
pub use waypoint::{base_preferred_velocity, select_waypoint, Perturbation, Waypoint};
