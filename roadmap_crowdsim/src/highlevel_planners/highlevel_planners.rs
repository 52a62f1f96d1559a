use crate::map_representation::map::VisibilityOracle;
use crate::AgentId;
use crate::Point;
use crate::Vec2f;

/// Decides where each agent wants to go, one tick at a time.
pub trait HighLevelPlanner: Send + Sync {
    /// Preferred velocity for `agent` standing at `position`. `None` means
    /// the planner has nothing to say about this agent and its current
    /// preferred velocity should be left alone.
    fn get_desired_velocity(
        &self,
        agent: AgentId,
        position: Point,
        radius: f64,
        oracle: &dyn VisibilityOracle,
    ) -> Option<Vec2f>;

    /// Where `agent` is heading, if it has a goal at all.
    fn goal_position(&self, agent: AgentId) -> Option<Point>;
}
