use crate::spatial_index::spatial_index::SpatialIndex;
use crate::{AgentId, Point};

use std::collections::HashMap;

type Cell = (i64, i64);

/// A sparse uniform grid with the list of agents in each occupied cell.
///
/// Updates are O(1) and a radius search touches O((r / cell_size)^2) cells.
/// It degrades when every agent crowds into one cell, which the density of a
/// real crowd rules out. Unlike a dense grid it has no bounds, so agents may
/// wander anywhere.
pub struct LocationHash2D {
    cells: HashMap<Cell, Vec<AgentId>>,
    locations: HashMap<AgentId, Point>,
    /// Edge length of each cell
    cell_size: f64,
}

impl LocationHash2D {
    /// Creates an empty index whose cells are `cell_size` x `cell_size`.
    /// A good choice is the typical neighbour distance of the agents.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            locations: HashMap::new(),
            cell_size,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn cell_of(&self, point: Point) -> Cell {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
        )
    }

    fn detach(&mut self, id: AgentId, cell: Cell) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.retain(|member| *member != id);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }
}

impl SpatialIndex for LocationHash2D {
    fn add_or_update(&mut self, id: AgentId, position: Point) {
        let new_cell = self.cell_of(position);
        if let Some(old_position) = self.locations.insert(id, position) {
            let old_cell = self.cell_of(old_position);
            if old_cell == new_cell {
                return;
            }
            self.detach(id, old_cell);
        }
        self.cells.entry(new_cell).or_default().push(id);
    }

    fn get_neighbours_in_radius(&self, radius: f64, position: Point) -> Vec<AgentId> {
        let (min_x, min_y) = self.cell_of(Point::new(position.x - radius, position.y - radius));
        let (max_x, max_y) = self.cell_of(Point::new(position.x + radius, position.y + radius));

        let mut agents = vec![];
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                if let Some(members) = self.cells.get(&(x, y)) {
                    agents.extend(
                        members
                            .iter()
                            .filter(|id| (self.locations[*id] - position).norm() < radius),
                    );
                }
            }
        }
        agents
    }
}
