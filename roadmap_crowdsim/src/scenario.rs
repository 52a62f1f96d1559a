use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use yaml_rust::{Yaml, YamlLoader};

use crate::error::{MapError, RoadmapError, ScenarioError};
use crate::highlevel_planners::roadmap_planner::RoadmapPlanner;
use crate::local_planners::local_planner::LocalPlanner;
use crate::map_representation::map::{Map, VisibilityOracle};
use crate::map_representation::obstacle_map::ObstacleMap;
use crate::map_representation::occupancy_grid::OccupancyGrid;
use crate::navigation_engine::{AgentDefaults, NavigationEngine};
use crate::roadmap::Roadmap;
use crate::spatial_index::location_hash_2d::LocationHash2D;
use crate::{AgentId, Point, Simulation, DEFAULT_TIME_STEP};

/// Cell size used when obstacles are rasterised without an explicit one.
pub const DEFAULT_GRID_RESOLUTION: f64 = 0.1;

/// Gray level below which an image pixel counts as occupied.
pub const DEFAULT_OCCUPIED_BELOW: u8 = 128;

/// How to build an [`OccupancyGrid`] for a scenario: from a map image when
/// `image` is set, otherwise by rasterising the polygon obstacles.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec {
    pub resolution: f64,
    pub image: Option<PathBuf>,
    /// World position of the image's lower-left corner.
    pub origin: Point,
    pub occupied_below: u8,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_GRID_RESOLUTION,
            image: None,
            origin: Point::zeros(),
            occupied_below: DEFAULT_OCCUPIED_BELOW,
        }
    }
}

/// An agent to spawn, and the goal index it should walk to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSpec {
    pub start: Point,
    pub goal: Option<usize>,
}

/// Everything needed to set up a roadmap navigation run.
///
/// ```yaml
/// time_step: 0.25
/// agent_defaults:
///   radius: 0.75
///   max_speed: 1.0
/// obstacles:
///   - [[-1, 0.5], [1, 0.5], [1, 4], [-1, 4]]
/// roadmap:
///   clearance: 0.75
///   goals: [[6, 0], [-6, 0]]
///   waypoints: [[0, 5]]
/// agents:
///   - start: [-6, 0]
///     goal: 0
/// occupancy_grid:
///   resolution: 0.1
///   image: map.png
///   origin: [-10, -10]
///   occupied_below: 128
/// ```
///
/// Every section is optional. Missing agent defaults fall back to
/// [`AgentDefaults::default`] and the roadmap clearance to the agent radius.
/// A relative `image` path is taken from the scenario file's directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    pub time_step: f64,
    pub agent_defaults: AgentDefaults,
    pub obstacles: Vec<Vec<Point>>,
    pub goals: Vec<Point>,
    pub waypoints: Vec<Point>,
    pub roadmap_clearance: Option<f64>,
    pub agents: Vec<AgentSpec>,
    pub grid: Option<GridSpec>,
}

fn field(name: &str) -> ScenarioError {
    ScenarioError::Field(name.to_string())
}

/// yaml-rust keeps `1` and `1.0` apart; both are accepted as numbers.
fn number(yaml: &Yaml, name: &str) -> Result<f64, ScenarioError> {
    match yaml {
        Yaml::Real(_) => yaml.as_f64().ok_or_else(|| field(name)),
        Yaml::Integer(value) => Ok(*value as f64),
        _ => Err(field(name)),
    }
}

fn optional_number(yaml: &Yaml, name: &str, default: f64) -> Result<f64, ScenarioError> {
    if yaml.is_badvalue() {
        return Ok(default);
    }
    number(yaml, name)
}

fn point(yaml: &Yaml, name: &str) -> Result<Point, ScenarioError> {
    match yaml.as_vec() {
        Some(coords) if coords.len() == 2 => {
            Ok(Point::new(number(&coords[0], name)?, number(&coords[1], name)?))
        }
        _ => Err(field(name)),
    }
}

/// A missing list is empty; anything else must be a sequence.
fn list<'a>(yaml: &'a Yaml, name: &str) -> Result<&'a [Yaml], ScenarioError> {
    if yaml.is_badvalue() {
        return Ok(&[]);
    }
    yaml.as_vec().map(|v| v.as_slice()).ok_or_else(|| field(name))
}

fn points(yaml: &Yaml, name: &str) -> Result<Vec<Point>, ScenarioError> {
    list(yaml, name)?.iter().map(|p| point(p, name)).collect()
}

fn index(yaml: &Yaml, name: &str) -> Result<usize, ScenarioError> {
    yaml.as_i64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| field(name))
}

fn agent_defaults(yaml: &Yaml) -> Result<AgentDefaults, ScenarioError> {
    let base = AgentDefaults::default();
    let max_neighbors = if yaml["max_neighbors"].is_badvalue() {
        base.max_neighbors
    } else {
        index(&yaml["max_neighbors"], "agent_defaults.max_neighbors")?
    };
    let velocity = if yaml["velocity"].is_badvalue() {
        base.velocity
    } else {
        point(&yaml["velocity"], "agent_defaults.velocity")?
    };
    Ok(AgentDefaults {
        neighbor_distance: optional_number(
            &yaml["neighbor_distance"],
            "agent_defaults.neighbor_distance",
            base.neighbor_distance,
        )?,
        max_neighbors,
        time_horizon: optional_number(
            &yaml["time_horizon"],
            "agent_defaults.time_horizon",
            base.time_horizon,
        )?,
        time_horizon_obstacles: optional_number(
            &yaml["time_horizon_obstacles"],
            "agent_defaults.time_horizon_obstacles",
            base.time_horizon_obstacles,
        )?,
        radius: optional_number(&yaml["radius"], "agent_defaults.radius", base.radius)?,
        max_speed: optional_number(&yaml["max_speed"], "agent_defaults.max_speed", base.max_speed)?,
        velocity,
    })
}

fn grid_spec(yaml: &Yaml) -> Result<GridSpec, ScenarioError> {
    let base = GridSpec::default();
    let image = if yaml["image"].is_badvalue() {
        base.image
    } else {
        let image = yaml["image"]
            .as_str()
            .ok_or_else(|| field("occupancy_grid.image"))?;
        Some(PathBuf::from(image))
    };
    let origin = if yaml["origin"].is_badvalue() {
        base.origin
    } else {
        point(&yaml["origin"], "occupancy_grid.origin")?
    };
    let occupied_below = if yaml["occupied_below"].is_badvalue() {
        base.occupied_below
    } else {
        let level = index(&yaml["occupied_below"], "occupancy_grid.occupied_below")?;
        u8::try_from(level).map_err(|_| field("occupancy_grid.occupied_below"))?
    };
    Ok(GridSpec {
        resolution: optional_number(
            &yaml["resolution"],
            "occupancy_grid.resolution",
            base.resolution,
        )?,
        image,
        origin,
        occupied_below,
    })
}

impl Scenario {
    pub fn from_yaml(yaml_str: &str) -> Result<Self, ScenarioError> {
        let docs = YamlLoader::load_from_str(yaml_str)?;
        let doc = docs.first().ok_or(ScenarioError::Empty)?;

        let obstacles = list(&doc["obstacles"], "obstacles")?
            .iter()
            .map(|obstacle| points(obstacle, "obstacles"))
            .collect::<Result<Vec<_>, _>>()?;

        let roadmap = &doc["roadmap"];
        let roadmap_clearance = if roadmap["clearance"].is_badvalue() {
            None
        } else {
            Some(number(&roadmap["clearance"], "roadmap.clearance")?)
        };

        let grid = if doc["occupancy_grid"].is_badvalue() {
            None
        } else {
            Some(grid_spec(&doc["occupancy_grid"])?)
        };

        let agents = list(&doc["agents"], "agents")?
            .iter()
            .map(|agent| {
                let goal = if agent["goal"].is_badvalue() {
                    None
                } else {
                    Some(index(&agent["goal"], "agents.goal")?)
                };
                Ok(AgentSpec {
                    start: point(&agent["start"], "agents.start")?,
                    goal,
                })
            })
            .collect::<Result<Vec<_>, ScenarioError>>()?;

        Ok(Self {
            time_step: optional_number(&doc["time_step"], "time_step", DEFAULT_TIME_STEP)?,
            agent_defaults: agent_defaults(&doc["agent_defaults"])?,
            obstacles,
            goals: points(&roadmap["goals"], "roadmap.goals")?,
            waypoints: points(&roadmap["waypoints"], "roadmap.waypoints")?,
            roadmap_clearance,
            agents,
            grid,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_yaml(&contents)?;
        if let Some(image) = scenario.grid.as_mut().and_then(|grid| grid.image.as_mut()) {
            if let Some(dir) = path.parent().filter(|_| image.is_relative()) {
                *image = dir.join(&*image);
            }
        }
        Ok(scenario)
    }

    pub fn obstacle_map(&self) -> ObstacleMap {
        let mut map = ObstacleMap::new();
        for obstacle in &self.obstacles {
            map.add_obstacle(obstacle.clone());
        }
        map
    }

    /// The scenario's obstacles as a grid. A map image from the
    /// `occupancy_grid` section wins; otherwise every polygon is filled
    /// and its outline drawn, over the obstacles' bounding box plus one
    /// free cell on each side.
    pub fn occupancy_grid(&self) -> Result<OccupancyGrid, MapError> {
        let spec = self.grid.clone().unwrap_or_default();
        if let Some(image) = &spec.image {
            return OccupancyGrid::open(image, spec.resolution, spec.origin, spec.occupied_below);
        }

        let resolution = spec.resolution;
        if !(resolution > 0f64) {
            return Err(MapError::Resolution(resolution));
        }
        let corners = self.obstacles.iter().flatten();
        let (min, max) = match corners.clone().next() {
            Some(first) => corners.fold((*first, *first), |(min, max), p| {
                (min.inf(p), max.sup(p))
            }),
            None => return OccupancyGrid::new(0, 0, resolution, spec.origin),
        };

        let origin = min - Point::new(resolution, resolution);
        let width = ((max.x - min.x) / resolution).ceil() as usize + 2;
        let height = ((max.y - min.y) / resolution).ceil() as usize + 2;
        let mut grid = OccupancyGrid::new(width, height, resolution, origin)?;

        let map = self.obstacle_map();
        for x in 0..width {
            for y in 0..height {
                let centre = origin + Point::new(x as f64 + 0.5f64, y as f64 + 0.5f64) * resolution;
                if map.get_occupancy(centre) == Some(true) {
                    grid.set_occupied(centre, true);
                }
            }
        }
        for obstacle in &self.obstacles {
            for (i, start) in obstacle.iter().enumerate() {
                grid.add_wall(*start, obstacle[(i + 1) % obstacle.len()]);
            }
        }
        info!(width, height, resolution, "obstacles rasterised");
        Ok(grid)
    }

    /// Goals first, so goal `g` is roadmap vertex `g`, then waypoints.
    pub fn roadmap_positions(&self) -> Vec<Point> {
        self.goals
            .iter()
            .chain(self.waypoints.iter())
            .copied()
            .collect()
    }

    pub fn clearance(&self) -> f64 {
        self.roadmap_clearance
            .unwrap_or(self.agent_defaults.radius)
    }

    pub fn build_roadmap<O: VisibilityOracle + ?Sized>(
        &self,
        oracle: &O,
    ) -> Result<Roadmap, RoadmapError> {
        Roadmap::build(
            self.roadmap_positions(),
            self.goals.len(),
            self.clearance(),
            oracle,
        )
    }

    /// Configures the engine's defaults and adds every agent in order.
    pub fn populate<E: NavigationEngine>(&self, engine: &mut E) -> Vec<AgentId> {
        engine.configure_defaults(self.agent_defaults);
        let ids: Vec<AgentId> = self
            .agents
            .iter()
            .map(|agent| engine.add_agent(agent.start))
            .collect();
        info!(agents = ids.len(), "scenario populated");
        ids
    }

    /// Goal assignments for agents added by [`populate`](Self::populate)
    /// into an empty engine, so that agent `i` is the `i`-th entry.
    pub fn planner(&self, roadmap: Arc<Roadmap>) -> Result<RoadmapPlanner, RoadmapError> {
        let goals = self
            .agents
            .iter()
            .enumerate()
            .filter_map(|(agent, spec)| spec.goal.map(|goal| (agent, goal)))
            .collect();
        RoadmapPlanner::new(roadmap, goals)
    }

    /// A populated reference engine over this scenario's obstacles.
    pub fn simulation(
        &self,
        local_planner: Arc<dyn LocalPlanner<ObstacleMap>>,
    ) -> Simulation<ObstacleMap, LocationHash2D> {
        self.simulation_with(Arc::new(self.obstacle_map()), local_planner)
    }

    /// A populated reference engine over any map, such as the one from
    /// [`occupancy_grid`](Self::occupancy_grid).
    pub fn simulation_with<M: Map>(
        &self,
        map: Arc<M>,
        local_planner: Arc<dyn LocalPlanner<M>>,
    ) -> Simulation<M, LocationHash2D> {
        let mut simulation = Simulation::new(
            map,
            LocationHash2D::new(self.agent_defaults.neighbor_distance),
            local_planner,
        );
        simulation.set_time_step(self.time_step);
        self.populate(&mut simulation);
        simulation
    }
}
