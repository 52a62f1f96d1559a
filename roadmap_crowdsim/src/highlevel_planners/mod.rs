pub mod highlevel_planners;
pub mod no_highlevel_plan;
pub mod roadmap_planner;
