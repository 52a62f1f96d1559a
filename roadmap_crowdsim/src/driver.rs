use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::error::{CrowdSimError, CrowdSimResult};
use crate::highlevel_planners::highlevel_planners::HighLevelPlanner;
use crate::map_representation::map::VisibilityOracle;
use crate::navigation_engine::NavigationEngine;
use crate::roadmap::waypoint::{Perturbation, PERTURBATION_MAGNITUDE};
use crate::{Point, Vec2f};

/// Knobs for a navigation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriverConfig {
    /// An agent counts as arrived once this close to its goal.
    pub goal_radius: f64,
    /// The run fails after this many ticks without everyone arriving.
    pub max_ticks: usize,
    /// Upper bound on the random offset added to preferred velocities.
    pub perturbation: f64,
    /// Seed for the perturbation source, entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            goal_radius: 0.25f64,
            max_ticks: 10_000,
            perturbation: PERTURBATION_MAGNITUDE,
            seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub ticks: usize,
    pub global_time: f64,
}

/// Hooks into a navigation run. Every method defaults to a no-op.
pub trait RunObserver<E: NavigationEngine + ?Sized> {
    /// Called before preferred velocities are set for `tick`.
    fn on_tick_start(&mut self, _tick: usize, _engine: &E) {}

    /// Called once the engine has stepped for `tick`.
    fn on_tick_end(&mut self, _tick: usize, _engine: &E) {}

    /// Called once after every agent reached its goal.
    fn on_run_end(&mut self, _summary: &RunSummary, _engine: &E) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl<E: NavigationEngine + ?Sized> RunObserver<E> for NoopObserver {}

/// Feeds planner output into an engine tick after tick until every agent
/// with a goal has arrived.
pub struct NavigationDriver<P: HighLevelPlanner> {
    planner: P,
    config: DriverConfig,
    perturbation: Perturbation,
    rng: StdRng,
}

impl<P: HighLevelPlanner> NavigationDriver<P> {
    pub fn new(planner: P, config: DriverConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            planner,
            perturbation: Perturbation::new(config.perturbation),
            config,
            rng,
        }
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Sets every agent's preferred velocity for the coming step.
    ///
    /// All agents plan against the same positions. Agents the planner has
    /// no opinion on keep their previous preferred velocity.
    pub fn set_preferred_velocities<E: NavigationEngine>(&mut self, engine: &mut E) {
        let snapshot: Vec<(Point, f64)> = (0..engine.num_agents())
            .map(|agent| (engine.agent_position(agent), engine.agent_radius(agent)))
            .collect();
        let oracle: &dyn VisibilityOracle = &*engine;
        let planner = &self.planner;
        let plan = |(agent, (position, radius)): (usize, &(Point, f64))| -> Option<Vec2f> {
            planner.get_desired_velocity(agent, *position, *radius, oracle)
        };

        // Slot `i` belongs to agent `i` alone.
        #[cfg(not(feature = "parallel"))]
        let velocities: Vec<Option<Vec2f>> = snapshot.iter().enumerate().map(plan).collect();

        #[cfg(feature = "parallel")]
        let velocities: Vec<Option<Vec2f>> = {
            use rayon::prelude::*;
            snapshot.par_iter().enumerate().map(plan).collect()
        };

        // Sampled in agent order so a seeded run replays exactly.
        for (agent, velocity) in velocities.into_iter().enumerate() {
            if let Some(velocity) = velocity {
                let offset = self.perturbation.sample(&mut self.rng);
                engine.set_agent_preferred_velocity(agent, velocity + offset);
            }
        }
    }

    /// Whether every agent with a goal is within `goal_radius` of it.
    pub fn reached_goal<E: NavigationEngine>(&self, engine: &E) -> bool {
        let limit = self.config.goal_radius * self.config.goal_radius;
        (0..engine.num_agents()).all(|agent| match self.planner.goal_position(agent) {
            Some(goal) => (engine.agent_position(agent) - goal).norm_squared() <= limit,
            None => true,
        })
    }

    /// Steps `engine` until [`reached_goal`](Self::reached_goal) holds. At
    /// least one step is always taken.
    pub fn run<E: NavigationEngine, O: RunObserver<E>>(
        &mut self,
        engine: &mut E,
        observer: &mut O,
    ) -> CrowdSimResult<RunSummary> {
        info!(agents = engine.num_agents(), "navigation run started");

        let mut tick = 0usize;
        loop {
            if tick >= self.config.max_ticks {
                warn!(ticks = tick, "agents did not reach their goals");
                return Err(CrowdSimError::TickLimitExceeded { ticks: tick });
            }

            observer.on_tick_start(tick, engine);
            self.set_preferred_velocities(engine);
            engine.step();
            observer.on_tick_end(tick, engine);
            tick += 1;
            debug!(tick, global_time = engine.global_time(), "tick finished");

            if self.reached_goal(engine) {
                break;
            }
        }

        let summary = RunSummary {
            ticks: tick,
            global_time: engine.global_time(),
        };
        observer.on_run_end(&summary, engine);
        info!(
            ticks = summary.ticks,
            global_time = summary.global_time,
            "all agents reached their goals"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlevel_planners::no_highlevel_plan::NoHighLevelPlan;
    use crate::highlevel_planners::roadmap_planner::RoadmapPlanner;
    use crate::local_planners::no_local_plan::NoLocalPlan;
    use crate::map_representation::obstacle_map::ObstacleMap;
    use crate::roadmap::Roadmap;
    use crate::spatial_index::location_hash_2d::LocationHash2D;
    use crate::Simulation;
    use std::sync::Arc;

    type Engine = Simulation<ObstacleMap, LocationHash2D>;

    fn engine(starts: &[Point]) -> Engine {
        let mut engine = Simulation::new(
            Arc::new(ObstacleMap::new()),
            LocationHash2D::new(5f64),
            Arc::new(NoLocalPlan {}),
        );
        engine.add_agents(starts);
        engine
    }

    /// Single goal at the origin, every agent assigned to it.
    fn origin_driver(agents: usize, config: DriverConfig) -> NavigationDriver<RoadmapPlanner> {
        let roadmap =
            Roadmap::build(vec![Point::new(0f64, 0f64)], 1, 0.75f64, &ObstacleMap::new()).unwrap();
        let goals = (0..agents).map(|agent| (agent, 0)).collect();
        let planner = RoadmapPlanner::new(Arc::new(roadmap), goals).unwrap();
        NavigationDriver::new(planner, config)
    }

    fn seeded() -> DriverConfig {
        DriverConfig {
            seed: Some(42),
            ..DriverConfig::default()
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        started: usize,
        ended: usize,
        summary: Option<RunSummary>,
    }

    impl RunObserver<Engine> for CountingObserver {
        fn on_tick_start(&mut self, tick: usize, _engine: &Engine) {
            assert_eq!(tick, self.started);
            self.started += 1;
        }

        fn on_tick_end(&mut self, _tick: usize, _engine: &Engine) {
            self.ended += 1;
        }

        fn on_run_end(&mut self, summary: &RunSummary, _engine: &Engine) {
            self.summary = Some(*summary);
        }
    }

    #[test]
    fn test_goal_radius_is_inclusive() {
        let driver = origin_driver(1, seeded());
        assert!(driver.reached_goal(&engine(&[Point::new(0.25f64, 0f64)])));
        assert!(!driver.reached_goal(&engine(&[Point::new(0.26f64, 0f64)])));
    }

    #[test]
    fn test_agents_without_goal_do_not_block_termination() {
        let driver = origin_driver(1, seeded());
        let engine = engine(&[Point::new(0f64, 0.1f64), Point::new(50f64, 50f64)]);
        assert!(driver.reached_goal(&engine));

        let idle = NavigationDriver::new(NoHighLevelPlan, seeded());
        assert!(idle.reached_goal(&engine));
    }

    #[test]
    fn test_straight_walk_to_goal() {
        let mut driver = origin_driver(1, seeded());
        let mut engine = engine(&[Point::new(5.1f64, 0f64)]);
        let mut observer = CountingObserver::default();

        let summary = driver.run(&mut engine, &mut observer).unwrap();
        assert_eq!(summary.ticks, 20);
        assert_eq!(summary.global_time, 5f64);
        assert_eq!(observer.started, 20);
        assert_eq!(observer.ended, 20);
        assert_eq!(observer.summary, Some(summary));
        assert!(engine.agent_position(0).norm() <= 0.25f64);
    }

    #[test]
    fn test_tick_limit() {
        let mut driver = origin_driver(
            1,
            DriverConfig {
                max_ticks: 3,
                ..seeded()
            },
        );
        let mut engine = engine(&[Point::new(100f64, 0f64)]);
        let err = driver.run(&mut engine, &mut NoopObserver).unwrap_err();
        assert!(matches!(err, CrowdSimError::TickLimitExceeded { ticks: 3 }));
        assert_eq!(engine.global_time(), 0.75f64);
    }

    #[test]
    fn test_seeded_runs_replay_exactly() {
        let starts = [Point::new(3f64, 4f64), Point::new(-6f64, 1f64)];
        let mut first = engine(&starts);
        let mut second = engine(&starts);
        origin_driver(2, seeded())
            .run(&mut first, &mut NoopObserver)
            .unwrap();
        origin_driver(2, seeded())
            .run(&mut second, &mut NoopObserver)
            .unwrap();
        for agent in 0..2 {
            assert_eq!(first.agent_position(agent), second.agent_position(agent));
        }
    }

    #[test]
    fn test_planner_without_opinion_keeps_preferred_velocity() {
        let mut driver = origin_driver(1, seeded());
        let mut engine = engine(&[Point::new(3f64, 0f64), Point::new(0f64, 3f64)]);
        engine.set_agent_preferred_velocity(1, Vec2f::new(0.5f64, 0f64));

        driver.set_preferred_velocities(&mut engine);
        assert_eq!(engine.agent_preferred_velocity(1), Vec2f::new(0.5f64, 0f64));
        let heading = engine.agent_preferred_velocity(0);
        assert!((heading - Vec2f::new(-1f64, 0f64)).norm() <= PERTURBATION_MAGNITUDE + 1e-12);
    }
}
