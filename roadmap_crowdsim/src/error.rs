use thiserror::Error;

/// Problems detected while building a [`Roadmap`](crate::roadmap::Roadmap).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoadmapError {
    #[error("roadmap has {vertices} vertices but {goals} goals were requested")]
    NotEnoughVertices { goals: usize, vertices: usize },

    #[error("roadmap vertex {index} has a non-finite position")]
    NonFinitePosition { index: usize },

    #[error("adjacency list has {got} rows for {expected} vertices")]
    AdjacencyLength { expected: usize, got: usize },

    #[error("vertex {vertex} lists neighbor {neighbor}, which does not exist")]
    NeighborOutOfRange { vertex: usize, neighbor: usize },

    #[error("goal {goal} is out of range for a roadmap with {goals} goals")]
    GoalOutOfRange { goal: usize, goals: usize },
}

/// Problems raised while reading a scenario description.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("could not read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse scenario yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),

    #[error("scenario yaml is empty")]
    Empty,

    #[error("missing or malformed field `{0}`")]
    Field(String),
}

/// Problems raised while loading an occupancy map.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("could not load map image: {0}")]
    Image(#[from] image::ImageError),

    #[error("map resolution must be positive, got {0}")]
    Resolution(f64),
}

#[derive(Debug, Error)]
pub enum CrowdSimError {
    #[error(transparent)]
    Roadmap(#[from] RoadmapError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("agents did not reach their goals within {ticks} ticks")]
    TickLimitExceeded { ticks: usize },
}

pub type CrowdSimResult<T> = Result<T, CrowdSimError>;
