use crate::map_representation::map::VisibilityOracle;
use crate::{AgentId, Point, Vec2f};

/// Parameters given to every agent added after
/// [`NavigationEngine::configure_defaults`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentDefaults {
    /// How far an agent looks for neighbours to avoid.
    pub neighbor_distance: f64,
    /// Most neighbours taken into account.
    pub max_neighbors: usize,
    pub time_horizon: f64,
    pub time_horizon_obstacles: f64,
    pub radius: f64,
    pub max_speed: f64,
    /// Initial velocity
    pub velocity: Vec2f,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            neighbor_distance: 5f64,
            max_neighbors: 2,
            time_horizon: 1f64,
            time_horizon_obstacles: 1f64,
            radius: 0.75f64,
            max_speed: 1f64,
            velocity: Vec2f::zeros(),
        }
    }
}

/// The local navigation layer that owns agent kinematics.
///
/// Roadmap navigation only ever writes preferred velocities; how agents
/// avoid each other and move is up to the engine. Agent ids are handed out
/// densely from zero in creation order.
///
/// Accessors panic when given an id the engine never returned from
/// [`add_agent`](NavigationEngine::add_agent).
pub trait NavigationEngine: VisibilityOracle {
    fn configure_defaults(&mut self, defaults: AgentDefaults);

    fn add_agent(&mut self, position: Point) -> AgentId;

    fn agent_position(&self, agent: AgentId) -> Point;

    fn agent_radius(&self, agent: AgentId) -> f64;

    fn set_agent_preferred_velocity(&mut self, agent: AgentId, velocity: Vec2f);

    fn agent_preferred_velocity(&self, agent: AgentId) -> Vec2f;

    /// Advance every agent by one time step.
    fn step(&mut self);

    fn global_time(&self) -> f64;

    fn num_agents(&self) -> usize;
}
