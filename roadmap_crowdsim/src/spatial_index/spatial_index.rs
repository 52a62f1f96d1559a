use crate::AgentId;
use crate::Point;

/// Neighbour lookup over agent positions.
pub trait SpatialIndex: Send + Sync {
    fn add_or_update(&mut self, index: AgentId, position: Point);

    /// Agents strictly closer than `radius` to `position`, in no particular order.
    fn get_neighbours_in_radius(&self, radius: f64, position: Point) -> Vec<AgentId>;
}
