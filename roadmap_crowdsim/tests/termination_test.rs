use roadmap_crowdsim::local_planners::no_local_plan::NoLocalPlan;
use roadmap_crowdsim::local_planners::zanlungo::Zanlungo;
use roadmap_crowdsim::map_representation::obstacle_map::ObstacleMap;
use roadmap_crowdsim::spatial_index::location_hash_2d::LocationHash2D;
use roadmap_crowdsim::*;
use rstest::{fixture, rstest};
use std::sync::Arc;

type Engine = Simulation<ObstacleMap, LocationHash2D>;

#[fixture]
fn scenario() -> Scenario {
    Scenario::open(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/scenarios/two_obstacles.yaml"
    ))
    .unwrap()
}

/// The same blocks with only the waypoints above them, so both agents
/// share one detour and have to pass each other on it.
#[fixture]
fn single_detour(scenario: Scenario) -> Scenario {
    let mut scenario = scenario;
    scenario.waypoints.retain(|waypoint| waypoint.y > 0f64);
    scenario
}

/// Fails the run if any agent gets closer to an obstacle than its radius,
/// and records how close the agents came to each other.
struct StaysOutside {
    ticks: usize,
    closest_approach: f64,
}

impl StaysOutside {
    fn new() -> Self {
        Self {
            ticks: 0,
            closest_approach: f64::INFINITY,
        }
    }
}

impl RunObserver<Engine> for StaysOutside {
    fn on_tick_end(&mut self, tick: usize, engine: &Engine) {
        self.ticks = tick + 1;
        for agent in 0..engine.num_agents() {
            let position = engine.agent_position(agent);
            let radius = engine.agent_radius(agent);
            assert_eq!(
                engine.map().get_occupancy(position),
                Some(false),
                "agent {} entered an obstacle at tick {}",
                agent,
                tick
            );
            if let Some(nearest) = engine.map().nearest_obstacle(position, radius) {
                assert!(
                    (nearest - position).norm() >= radius - 1e-9,
                    "agent {} is within its radius of an obstacle at tick {}",
                    agent,
                    tick
                );
            }
            for other in agent + 1..engine.num_agents() {
                let separation = (engine.agent_position(other) - position).norm();
                self.closest_approach = self.closest_approach.min(separation);
            }
        }
    }
}

/// Runs `scenario` to completion and checks every agent ended on its goal.
fn run_to_goals(
    scenario: &Scenario,
    local_planner: Arc<dyn LocalPlanner<ObstacleMap>>,
    seed: u64,
) -> (RunSummary, StaysOutside) {
    let mut engine = scenario.simulation(local_planner);
    let roadmap = Arc::new(scenario.build_roadmap(&engine).unwrap());
    let planner = scenario.planner(roadmap.clone()).unwrap();
    let mut driver = NavigationDriver::new(
        planner,
        DriverConfig {
            max_ticks: 2000,
            seed: Some(seed),
            ..DriverConfig::default()
        },
    );

    let mut observer = StaysOutside::new();
    let summary = driver.run(&mut engine, &mut observer).unwrap();
    assert!(summary.ticks <= 2000);
    assert_eq!(observer.ticks, summary.ticks);
    assert_eq!(summary.global_time, summary.ticks as f64 * 0.25f64);

    // Agent 0 walks to goal 0 and agent 1 to goal 1.
    for agent in 0..2 {
        let goal = roadmap.goal_position(agent).unwrap();
        assert!((engine.agent_position(agent) - goal).norm_squared() <= 0.0625f64);
    }
    (summary, observer)
}

fn avoidance() -> Arc<dyn LocalPlanner<ObstacleMap>> {
    Arc::new(Zanlungo::new(1f64, 1f64, 1f64, 1f64))
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(2024)]
fn reciprocal_goals_terminate(scenario: Scenario, #[case] seed: u64) {
    run_to_goals(&scenario, Arc::new(NoLocalPlan {}), seed);
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(2024)]
fn reciprocal_goals_terminate_with_avoidance(scenario: Scenario, #[case] seed: u64) {
    run_to_goals(&scenario, avoidance(), seed);
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(2024)]
fn agents_pass_each_other_on_a_shared_detour(single_detour: Scenario, #[case] seed: u64) {
    let (_, observer) = run_to_goals(&single_detour, avoidance(), seed);
    // Well inside the neighbour distance, so avoidance was in play.
    assert!(observer.closest_approach < 2f64);
    assert!(observer.closest_approach < single_detour.agent_defaults.neighbor_distance);
}

#[rstest]
fn agents_detour_around_the_gap(scenario: Scenario) {
    let mut engine = scenario.simulation(Arc::new(NoLocalPlan {}));
    let roadmap = Arc::new(scenario.build_roadmap(&engine).unwrap());

    // The gap between the blocks is narrower than an agent.
    assert!(!engine.query_visibility(
        Point::new(-6f64, 0f64),
        Point::new(6f64, 0f64),
        scenario.clearance()
    ));

    let mut driver = NavigationDriver::new(
        scenario.planner(roadmap).unwrap(),
        DriverConfig {
            seed: Some(3),
            ..DriverConfig::default()
        },
    );
    // Thirty ticks in, both agents are well off the x axis.
    for _ in 0..30 {
        driver.set_preferred_velocities(&mut engine);
        engine.step();
    }
    for agent in 0..2 {
        assert!(engine.agent_position(agent).y.abs() > 2f64);
    }
}

#[test]
fn idle_agents_finish_immediately() {
    let mut engine = Simulation::new(
        Arc::new(ObstacleMap::new()),
        LocationHash2D::new(5f64),
        Arc::new(NoLocalPlan {}),
    );
    engine.add_agents(&[Point::new(1f64, 1f64), Point::new(-4f64, 2f64)]);
    let mut driver = NavigationDriver::new(
        highlevel_planners::no_highlevel_plan::NoHighLevelPlan,
        DriverConfig::default(),
    );

    let summary = driver.run(&mut engine, &mut NoopObserver).unwrap();
    assert_eq!(summary.ticks, 1);
    // Only the perturbation moves them.
    assert!((engine.agent_position(0) - Point::new(1f64, 1f64)).norm() < 1e-3f64);
}
