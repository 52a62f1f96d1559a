use super::highlevel_planners::HighLevelPlanner;
use crate::map_representation::map::VisibilityOracle;
use crate::{AgentId, Point, Vec2f};

/// Keeps every agent standing still.
pub struct NoHighLevelPlan;

impl HighLevelPlanner for NoHighLevelPlan {
    fn get_desired_velocity(
        &self,
        _: AgentId,
        _: Point,
        _: f64,
        _: &dyn VisibilityOracle,
    ) -> Option<Vec2f> {
        Some(Vec2f::zeros())
    }

    fn goal_position(&self, _: AgentId) -> Option<Point> {
        None
    }
}
