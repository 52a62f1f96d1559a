use crate::map_representation::map::Map;
use crate::Agent;
use crate::Vec2f;

/// Turns a preferred velocity into one that avoids nearby agents.
pub trait LocalPlanner<M: Map>: Send + Sync {
    fn get_desired_velocity(
        &self,
        agent: &Agent,
        nearby_agents: &[Agent],
        recommended_velocity: Vec2f,
        map: &M,
    ) -> Vec2f;
}
