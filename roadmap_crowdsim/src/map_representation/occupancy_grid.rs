use std::path::Path;

use image::GrayImage;
use line_drawing::Bresenham;

use crate::error::MapError;
use crate::map_representation::map::{Map, VisibilityOracle};
use crate::Point;

/// A dense boolean occupancy grid.
///
/// Cell `(0, 0)` has its lower-left corner at `origin`; cells outside the
/// grid are treated as free space.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    cells: Vec<bool>,
    width: usize,
    height: usize,
    /// Edge length of a cell
    resolution: f64,
    origin: Point,
}

impl OccupancyGrid {
    /// Creates an empty grid of `width` x `height` cells.
    pub fn new(width: usize, height: usize, resolution: f64, origin: Point) -> Result<Self, MapError> {
        if !(resolution > 0f64) {
            return Err(MapError::Resolution(resolution));
        }
        Ok(Self {
            cells: vec![false; width * height],
            width,
            height,
            resolution,
            origin,
        })
    }

    /// Builds a grid from a grayscale image. Pixels darker than
    /// `occupied_below` are obstacles; the top image row is the highest `y`.
    pub fn from_image(
        image: &GrayImage,
        resolution: f64,
        origin: Point,
        occupied_below: u8,
    ) -> Result<Self, MapError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut grid = Self::new(width, height, resolution, origin)?;
        for (col, row, pixel) in image.enumerate_pixels() {
            if pixel.0[0] < occupied_below {
                let y = height - 1 - row as usize;
                grid.cells[y * width + col as usize] = true;
            }
        }
        Ok(grid)
    }

    /// Loads a map image from disk, see [`OccupancyGrid::from_image`].
    pub fn open<P: AsRef<Path>>(
        path: P,
        resolution: f64,
        origin: Point,
        occupied_below: u8,
    ) -> Result<Self, MapError> {
        let image = image::open(path)?.to_luma8();
        Self::from_image(&image, resolution, origin, occupied_below)
    }

    /// Rasterises a wall segment into the grid.
    pub fn add_wall(&mut self, start: Point, end: Point) {
        for (x, y) in Bresenham::new(self.cell_of(&start), self.cell_of(&end)) {
            if let Some(idx) = self.index(x, y) {
                self.cells[idx] = true;
            }
        }
    }

    pub fn set_occupied(&mut self, point: Point, occupied: bool) {
        let (x, y) = self.cell_of(&point);
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = occupied;
        }
    }

    fn cell_of(&self, point: &Point) -> (i64, i64) {
        let local = point - self.origin;
        (
            (local.x / self.resolution).floor() as i64,
            (local.y / self.resolution).floor() as i64,
        )
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    fn is_occupied(&self, x: i64, y: i64) -> bool {
        self.index(x, y).map_or(false, |idx| self.cells[idx])
    }

    /// Cell offsets whose centres lie within `clearance` of the origin cell.
    fn clearance_offsets(&self, clearance: f64) -> Vec<(i64, i64)> {
        let reach = (clearance / self.resolution).ceil() as i64;
        let limit = (clearance / self.resolution).powi(2);
        let mut offsets = vec![];
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if ((dx * dx + dy * dy) as f64) <= limit {
                    offsets.push((dx, dy));
                }
            }
        }
        offsets
    }
}

impl VisibilityOracle for OccupancyGrid {
    fn query_visibility(&self, from: Point, to: Point, clearance: f64) -> bool {
        if (to - from).norm_squared() == 0f64 {
            return true;
        }
        let offsets = self.clearance_offsets(clearance.max(0f64));
        Bresenham::new(self.cell_of(&from), self.cell_of(&to)).all(|(x, y)| {
            offsets
                .iter()
                .all(|(dx, dy)| !self.is_occupied(x + dx, y + dy))
        })
    }
}

impl Map for OccupancyGrid {
    fn get_occupancy(&self, position: Point) -> Option<bool> {
        let (x, y) = self.cell_of(&position);
        self.index(x, y).map(|idx| self.cells[idx])
    }

    fn nearest_obstacle(&self, position: Point, max_distance: f64) -> Option<Point> {
        let (cx, cy) = self.cell_of(&position);
        let reach = (max_distance.max(0f64) / self.resolution).ceil() as i64 + 1;
        let mut nearest: Option<(f64, Point)> = None;
        for x in (cx - reach)..=(cx + reach) {
            for y in (cy - reach)..=(cy + reach) {
                if !self.is_occupied(x, y) {
                    continue;
                }
                // Closest point of the cell's square.
                let min = self.origin + Point::new(x as f64, y as f64) * self.resolution;
                let q = Point::new(
                    position.x.clamp(min.x, min.x + self.resolution),
                    position.y.clamp(min.y, min.y + self.resolution),
                );
                let d = (q - position).norm_squared();
                if d <= max_distance * max_distance && nearest.map_or(true, |(best, _)| d < best) {
                    nearest = Some((d, q));
                }
            }
        }
        nearest.map(|(_, q)| q)
    }
}
