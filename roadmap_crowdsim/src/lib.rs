use std::sync::Arc;
pub extern crate nalgebra as na;
use na::Vector2;
use tracing::{debug, warn};

pub mod driver;
pub mod error;
pub mod highlevel_planners;
pub mod local_planners;
pub mod map_representation;
pub mod navigation_engine;
pub mod roadmap;
pub mod scenario;
pub mod spatial_index;

pub use crate::driver::{DriverConfig, NavigationDriver, NoopObserver, RunObserver, RunSummary};
pub use crate::error::{CrowdSimError, CrowdSimResult, MapError, RoadmapError, ScenarioError};
pub use crate::highlevel_planners::highlevel_planners::HighLevelPlanner;
pub use crate::local_planners::local_planner::LocalPlanner;
pub use crate::map_representation::map::{Map, VisibilityOracle};
pub use crate::navigation_engine::{AgentDefaults, NavigationEngine};
pub use crate::roadmap::Roadmap;
pub use crate::scenario::Scenario;
pub use crate::spatial_index::spatial_index::SpatialIndex;

/// Agent  ID
pub type AgentId = usize;

/// Point
pub type Point = Vector2<f64>;

/// 2-vector
pub type Vec2f = Vector2<f64>;

/// Default simulation step in seconds.
pub const DEFAULT_TIME_STEP: f64 = 0.25;

/// Data representing an individual agent
#[derive(Clone, Copy, Debug)]
pub struct Agent {
    /// Unique Agent ID
    pub agent_id: AgentId,
    /// Position of a point
    pub position: Point,
    /// Velocity of agent
    pub velocity: Vec2f,
    /// Velocity the agent would take without anyone in the way
    pub preferred_vel: Vec2f,
    pub radius: f64,
    pub max_speed: f64,
    /// How far the agent can "see" other agents
    pub neighbor_distance: f64,
    pub max_neighbors: usize,
    pub time_horizon: f64,
    pub time_horizon_obstacles: f64,
}

impl Agent {
    pub fn new(agent_id: AgentId, position: Point, defaults: &AgentDefaults) -> Self {
        Self {
            agent_id,
            position,
            velocity: defaults.velocity,
            preferred_vel: Vec2f::zeros(),
            radius: defaults.radius,
            max_speed: defaults.max_speed,
            neighbor_distance: defaults.neighbor_distance,
            max_neighbors: defaults.max_neighbors,
            time_horizon: defaults.time_horizon,
            time_horizon_obstacles: defaults.time_horizon_obstacles,
        }
    }
}

/// A representation of a simulation session
pub struct Simulation<M: Map, T: SpatialIndex> {
    /// All agents, indexed by id
    pub agents: Vec<Agent>,
    /// Spatial Index. Used internally to find neighbours
    spatial_index: T,
    /// Map ARC
    map: Arc<M>,
    /// Local avoidance strategy
    local_planner: Arc<dyn LocalPlanner<M>>,
    /// Parameters for newly added agents
    defaults: AgentDefaults,
    /// Seconds advanced by each step
    time_step: f64,
    /// Simulation time
    global_time: f64,
}

impl<M: Map, T: SpatialIndex> Simulation<M, T> {
    /// Create a new simulation environment
    pub fn new(map: Arc<M>, spatial_index: T, local_planner: Arc<dyn LocalPlanner<M>>) -> Self {
        Self {
            agents: vec![],
            spatial_index,
            map,
            local_planner,
            defaults: AgentDefaults::default(),
            time_step: DEFAULT_TIME_STEP,
            global_time: 0f64,
        }
    }

    pub fn set_time_step(&mut self, time_step: f64) {
        self.time_step = time_step;
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn map(&self) -> &Arc<M> {
        &self.map
    }

    pub fn agent(&self, agent: AgentId) -> Option<&Agent> {
        self.agents.get(agent)
    }

    pub fn add_agents(&mut self, spawn_positions: &[Point]) -> Vec<AgentId> {
        spawn_positions
            .iter()
            .map(|position| self.add_agent(*position))
            .collect()
    }

    /// Up to `max_neighbors` other agents closer than `neighbor_distance`,
    /// nearest first.
    fn neighbours_of(&self, agent: &Agent) -> Vec<Agent> {
        let mut neighbours: Vec<(f64, Agent)> = self
            .spatial_index
            .get_neighbours_in_radius(agent.neighbor_distance, agent.position)
            .into_iter()
            .filter(|id| *id != agent.agent_id)
            .map(|id| {
                let other = self.agents[id];
                ((other.position - agent.position).norm_squared(), other)
            })
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.agent_id.cmp(&b.1.agent_id)));
        neighbours
            .into_iter()
            .take(agent.max_neighbors)
            .map(|(_, other)| other)
            .collect()
    }

    /// Distance from `position` to the nearest obstacle, `None` when that is
    /// further than `radius`.
    fn obstacle_clearance(&self, position: Point, radius: f64) -> Option<f64> {
        self.map
            .nearest_obstacle(position, radius)
            .map(|nearest| (nearest - position).norm())
    }

    /// Cuts `velocity` back so that the step does not take `agent` closer
    /// than its radius to an obstacle. The part heading into the obstacle is
    /// dropped first; if the move is still blocked the agent waits. An agent
    /// already inside that margin may move as long as it does not get
    /// closer.
    fn keep_clear(&self, agent: &Agent, velocity: Vec2f) -> Vec2f {
        let required = self
            .obstacle_clearance(agent.position, agent.radius)
            .unwrap_or(agent.radius);
        let allowed = |v: &Vec2f| {
            self.obstacle_clearance(agent.position + v * self.time_step, agent.radius)
                .map_or(true, |clearance| clearance >= required)
        };
        if allowed(&velocity) {
            return velocity;
        }

        let target = agent.position + velocity * self.time_step;
        if let Some(nearest) = self.map.nearest_obstacle(target, agent.radius) {
            let away = target - nearest;
            if away.norm_squared() > 0f64 {
                let normal = away.normalize();
                let inward = velocity.dot(&normal);
                if inward < 0f64 {
                    let slide = velocity - normal * inward;
                    if allowed(&slide) {
                        return slide;
                    }
                }
            }
        }
        Vec2f::zeros()
    }

    /// The velocity `agent` takes this step.
    fn new_velocity(&self, agent: &Agent) -> Vec2f {
        let neighbours = self.neighbours_of(agent);
        let velocity = self.local_planner.get_desired_velocity(
            agent,
            &neighbours,
            agent.preferred_vel,
            &self.map,
        );
        let speed = velocity.norm();
        let velocity = if speed > agent.max_speed {
            velocity * (agent.max_speed / speed)
        } else {
            velocity
        };
        self.keep_clear(agent, velocity)
    }
}

impl<M: Map, T: SpatialIndex> VisibilityOracle for Simulation<M, T> {
    fn query_visibility(&self, from: Point, to: Point, clearance: f64) -> bool {
        self.map.query_visibility(from, to, clearance)
    }
}

impl<M: Map, T: SpatialIndex> NavigationEngine for Simulation<M, T> {
    fn configure_defaults(&mut self, defaults: AgentDefaults) {
        self.defaults = defaults;
    }

    fn add_agent(&mut self, position: Point) -> AgentId {
        let agent_id = self.agents.len();
        if self.map.get_occupancy(position) == Some(true) {
            warn!(
                agent_id,
                x = position.x,
                y = position.y,
                "agent spawned inside an obstacle"
            );
        }
        self.agents
            .push(Agent::new(agent_id, position, &self.defaults));
        self.spatial_index.add_or_update(agent_id, position);
        agent_id
    }

    fn agent_position(&self, agent: AgentId) -> Point {
        self.agents[agent].position
    }

    fn agent_radius(&self, agent: AgentId) -> f64 {
        self.agents[agent].radius
    }

    fn set_agent_preferred_velocity(&mut self, agent: AgentId, velocity: Vec2f) {
        self.agents[agent].preferred_vel = velocity;
    }

    fn agent_preferred_velocity(&self, agent: AgentId) -> Vec2f {
        self.agents[agent].preferred_vel
    }

    fn step(&mut self) {
        // Every velocity is computed against the same positions before any
        // agent moves.
        #[cfg(not(feature = "parallel"))]
        let velocities: Vec<Vec2f> = self
            .agents
            .iter()
            .map(|agent| self.new_velocity(agent))
            .collect();

        #[cfg(feature = "parallel")]
        let velocities: Vec<Vec2f> = {
            use rayon::prelude::*;
            self.agents
                .par_iter()
                .map(|agent| self.new_velocity(agent))
                .collect()
        };

        for (agent, velocity) in self.agents.iter_mut().zip(velocities) {
            agent.velocity = velocity;
            agent.position += velocity * self.time_step;
            self.spatial_index
                .add_or_update(agent.agent_id, agent.position);
        }

        self.global_time += self.time_step;
        debug!(
            global_time = self.global_time,
            agents = self.agents.len(),
            "simulation stepped"
        );
    }

    fn global_time(&self) -> f64 {
        self.global_time
    }

    fn num_agents(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;
    use crate::local_planners::no_local_plan::NoLocalPlan;
    use crate::map_representation::obstacle_map::ObstacleMap;
    use crate::spatial_index::location_hash_2d::LocationHash2D;

    struct NoMap {}

    impl VisibilityOracle for NoMap {
        fn query_visibility(&self, _from: Point, _to: Point, _clearance: f64) -> bool {
            true
        }
    }

    impl Map for NoMap {
        fn get_occupancy(&self, _pt: Point) -> Option<bool> {
            Some(false)
        }

        fn nearest_obstacle(&self, _pt: Point, _max_distance: f64) -> Option<Point> {
            None
        }
    }

    /// Records how many neighbours each agent was shown.
    struct CountingPlanner;

    impl LocalPlanner<NoMap> for CountingPlanner {
        fn get_desired_velocity(
            &self,
            _agent: &Agent,
            nearby_agents: &[Agent],
            _recommended_velocity: Vec2f,
            _map: &NoMap,
        ) -> Vec2f {
            Vec2f::new(nearby_agents.len() as f64, 0f64)
        }
    }

    fn simulation() -> Simulation<NoMap, LocationHash2D> {
        Simulation::new(
            Arc::new(NoMap {}),
            LocationHash2D::new(20f64),
            Arc::new(NoLocalPlan {}),
        )
    }

    #[test]
    fn test_step_integration() {
        let velocity = Vec2f::new(1.0f64, 0.0f64);
        let mut crowd_simulation = simulation();
        crowd_simulation.set_time_step(1f64);

        assert_eq!(crowd_simulation.num_agents(), 0);
        let agents = crowd_simulation.add_agents(&[Point::new(0f64, 0f64)]);
        assert_eq!(agents, vec![0]);
        assert_eq!(crowd_simulation.num_agents(), 1);

        crowd_simulation.set_agent_preferred_velocity(0, velocity);
        crowd_simulation.step();
        assert_eq!(crowd_simulation.num_agents(), 1);

        assert!((crowd_simulation.agent_position(0) - velocity).norm() < 1e-5f64);
        assert_eq!(crowd_simulation.global_time(), 1f64);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut crowd_simulation = simulation();
        crowd_simulation.configure_defaults(AgentDefaults {
            max_speed: 0.5f64,
            ..AgentDefaults::default()
        });
        crowd_simulation.add_agent(Point::new(0f64, 0f64));
        crowd_simulation.set_agent_preferred_velocity(0, Vec2f::new(0f64, 2f64));
        crowd_simulation.step();

        assert!((crowd_simulation.agents[0].velocity.norm() - 0.5f64).abs() < 1e-12);
        assert!((crowd_simulation.agent_position(0) - Point::new(0f64, 0.125f64)).norm() < 1e-12);
        assert_eq!(crowd_simulation.global_time(), DEFAULT_TIME_STEP);
    }

    #[test]
    fn test_defaults_apply_to_new_agents() {
        let mut crowd_simulation = simulation();
        crowd_simulation.add_agent(Point::new(0f64, 0f64));
        crowd_simulation.configure_defaults(AgentDefaults {
            radius: 2f64,
            ..AgentDefaults::default()
        });
        crowd_simulation.add_agent(Point::new(5f64, 0f64));

        assert_eq!(crowd_simulation.agent_radius(0), 0.75f64);
        assert_eq!(crowd_simulation.agent_radius(1), 2f64);
        assert_eq!(crowd_simulation.agent_preferred_velocity(1), Vec2f::zeros());
    }

    #[test]
    fn test_neighbours_respect_distance_and_count() {
        let mut crowd_simulation = Simulation::new(
            Arc::new(NoMap {}),
            LocationHash2D::new(5f64),
            Arc::new(CountingPlanner),
        );
        crowd_simulation.set_time_step(1f64);
        // Agent 0 sees 1 and 2 but the default cap is two neighbours and
        // agent 4 is beyond the neighbour distance.
        crowd_simulation.add_agents(&[
            Point::new(0f64, 0f64),
            Point::new(1f64, 0f64),
            Point::new(0f64, 1f64),
            Point::new(-1f64, 0f64),
            Point::new(0f64, 30f64),
        ]);
        assert_eq!(crowd_simulation.neighbours_of(&crowd_simulation.agents[0]).len(), 2);
        assert!(crowd_simulation
            .neighbours_of(&crowd_simulation.agents[4])
            .is_empty());

        crowd_simulation.step();
        // Velocities are capped at max_speed 1.
        assert_eq!(crowd_simulation.agents[0].velocity, Vec2f::new(1f64, 0f64));
        assert_eq!(crowd_simulation.agents[4].velocity, Vec2f::zeros());
    }

    fn walled_simulation() -> Simulation<ObstacleMap, LocationHash2D> {
        let mut map = ObstacleMap::new();
        map.add_obstacle(vec![Point::new(1f64, -5f64), Point::new(1f64, 5f64)]);
        let mut crowd_simulation = Simulation::new(
            Arc::new(map),
            LocationHash2D::new(5f64),
            Arc::new(NoLocalPlan {}),
        );
        crowd_simulation.set_time_step(1f64);
        crowd_simulation.configure_defaults(AgentDefaults {
            radius: 0.5f64,
            ..AgentDefaults::default()
        });
        crowd_simulation
    }

    #[test]
    fn test_agents_keep_their_radius_from_walls() {
        let mut crowd_simulation = walled_simulation();
        crowd_simulation.add_agent(Point::new(0f64, 0f64));

        // Straight at the wall: the agent stops short instead of entering
        // its clearance margin.
        crowd_simulation.set_agent_preferred_velocity(0, Vec2f::new(1f64, 0f64));
        crowd_simulation.step();
        assert_eq!(crowd_simulation.agent_position(0), Point::new(0f64, 0f64));
        assert_eq!(crowd_simulation.agents[0].velocity, Vec2f::zeros());

        // At an angle: the part toward the wall is dropped and it slides.
        let diagonal = Vec2f::new(1f64, 1f64).normalize();
        crowd_simulation.set_agent_preferred_velocity(0, diagonal);
        crowd_simulation.step();
        assert!((crowd_simulation.agent_position(0) - Point::new(0f64, diagonal.y)).norm() < 1e-12);

        // Away from the wall is untouched.
        crowd_simulation.set_agent_preferred_velocity(0, Vec2f::new(-1f64, 0f64));
        crowd_simulation.step();
        assert!((crowd_simulation.agent_position(0) - Point::new(-1f64, diagonal.y)).norm() < 1e-12);
    }

    #[test]
    fn test_agent_inside_margin_may_back_out() {
        let mut crowd_simulation = walled_simulation();
        crowd_simulation.set_time_step(0.1f64);
        crowd_simulation.add_agent(Point::new(0.8f64, 0f64));

        crowd_simulation.set_agent_preferred_velocity(0, Vec2f::new(1f64, 0f64));
        crowd_simulation.step();
        assert_eq!(crowd_simulation.agent_position(0), Point::new(0.8f64, 0f64));

        crowd_simulation.set_agent_preferred_velocity(0, Vec2f::new(-1f64, 0f64));
        crowd_simulation.step();
        assert!((crowd_simulation.agent_position(0) - Point::new(0.7f64, 0f64)).norm() < 1e-12);
    }

    #[test]
    fn test_visibility_delegates_to_map() {
        let mut map = ObstacleMap::new();
        map.add_obstacle(vec![Point::new(1f64, -1f64), Point::new(1f64, 1f64)]);
        let crowd_simulation = Simulation::new(
            Arc::new(map),
            LocationHash2D::new(5f64),
            Arc::new(NoLocalPlan {}),
        );
        assert!(!crowd_simulation.query_visibility(
            Point::new(0f64, 0f64),
            Point::new(2f64, 0f64),
            0f64
        ));
        assert!(crowd_simulation.query_visibility(
            Point::new(0f64, 3f64),
            Point::new(2f64, 3f64),
            0.5f64
        ));
    }
}
