pub mod local_planner;
pub mod no_local_plan;
pub mod zanlungo;
