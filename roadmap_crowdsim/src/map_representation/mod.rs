pub mod map;
pub mod obstacle_map;
pub mod occupancy_grid;
