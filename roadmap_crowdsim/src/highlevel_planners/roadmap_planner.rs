use super::highlevel_planners::HighLevelPlanner;
use crate::error::RoadmapError;
use crate::map_representation::map::VisibilityOracle;
use crate::roadmap::{base_preferred_velocity, Roadmap};
use crate::{AgentId, Point, Vec2f};

use std::collections::HashMap;
use std::sync::Arc;

/// Steers agents along a shared [`Roadmap`] toward their assigned goals.
///
/// Goals are fixed when the planner is built. Agents without a goal get no
/// opinion (`None`) so the engine keeps whatever preferred velocity they
/// already had.
pub struct RoadmapPlanner {
    roadmap: Arc<Roadmap>,
    goals: HashMap<AgentId, usize>,
}

impl RoadmapPlanner {
    /// `goals` maps each agent to a goal index of `roadmap`. Any index past
    /// the roadmap's goals is rejected.
    pub fn new(
        roadmap: Arc<Roadmap>,
        goals: HashMap<AgentId, usize>,
    ) -> Result<Self, RoadmapError> {
        let goal_count = roadmap.goal_count();
        if let Some(&goal) = goals.values().find(|&&goal| goal >= goal_count) {
            return Err(RoadmapError::GoalOutOfRange {
                goal,
                goals: goal_count,
            });
        }
        Ok(Self { roadmap, goals })
    }

    pub fn goal_of(&self, agent: AgentId) -> Option<usize> {
        self.goals.get(&agent).copied()
    }

    pub fn roadmap(&self) -> &Arc<Roadmap> {
        &self.roadmap
    }
}

impl HighLevelPlanner for RoadmapPlanner {
    fn get_desired_velocity(
        &self,
        agent: AgentId,
        position: Point,
        radius: f64,
        oracle: &dyn VisibilityOracle,
    ) -> Option<Vec2f> {
        let goal = self.goal_of(agent)?;
        Some(base_preferred_velocity(
            &self.roadmap,
            position,
            radius,
            goal,
            oracle,
        ))
    }

    fn goal_position(&self, agent: AgentId) -> Option<Point> {
        self.goal_of(agent)
            .and_then(|goal| self.roadmap.goal_position(goal))
    }
}
