//! Rectangular cell grid shared by the tile collision map and the broad phase.
//!
//! Cell `(x, y)` covers world space `[x * cell_size, (x + 1) * cell_size)` on
//! each axis, so the grid origin is the world origin and Y grows upward.

use serde::{Deserialize, Serialize};

use crate::math::{Aabb, Vec2};

/// A cell address in grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Convert a world position to the coordinate of the cell containing it.
pub fn world_to_cell(world_pos: Vec2, cell_size: f32) -> GridCoord {
    GridCoord {
        x: (world_pos.x / cell_size).floor() as i32,
        y: (world_pos.y / cell_size).floor() as i32,
    }
}

/// Inclusive range of cells touched by a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub min: GridCoord,
    pub max: GridCoord,
}

impl CellRange {
    pub fn from_aabb(aabb: &Aabb, cell_size: f32) -> Self {
        Self {
            min: world_to_cell(aabb.min, cell_size),
            max: world_to_cell(aabb.max, cell_size),
        }
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= self.min.x && coord.x <= self.max.x && coord.y >= self.min.y && coord.y <= self.max.y
    }

    /// Number of cells covered, zero for an inverted range.
    pub fn cell_count(&self) -> u64 {
        let w = (i64::from(self.max.x) - i64::from(self.min.x) + 1).max(0) as u64;
        let h = (i64::from(self.max.y) - i64::from(self.min.y) + 1).max(0) as u64;
        w.saturating_mul(h)
    }

    /// Iterate row by row, X fastest.
    pub fn iter(&self) -> impl Iterator<Item = GridCoord> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| GridCoord::new(x, y)))
    }
}

/// Fixed-size grid storing one value per cell.
#[derive(Clone, Debug)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cell_size: f32,
    cells: Vec<T>, // Row-major: [y * width + x]
}

impl<T: Clone> Grid<T> {
    /// Create a new grid with every cell set to `default`.
    pub fn new(width: usize, height: usize, cell_size: f32, default: T) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![default; width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Build a grid from row-major cell data. Returns `None` if the length
    /// does not match `width * height`.
    pub fn from_cells(width: usize, height: usize, cell_size: f32, cells: Vec<T>) -> Option<Self> {
        if cells.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            cell_size,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn world_to_grid(&self, world_pos: Vec2) -> GridCoord {
        world_to_cell(world_pos, self.cell_size)
    }

    /// World position of a cell's center.
    pub fn grid_to_world(&self, coord: GridCoord) -> Vec2 {
        Vec2::new(
            (coord.x as f32 + 0.5) * self.cell_size,
            (coord.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// World-space bounds of a cell.
    pub fn cell_bounds(&self, coord: GridCoord) -> Aabb {
        let min = Vec2::new(coord.x as f32 * self.cell_size, coord.y as f32 * self.cell_size);
        Aabb::new(min, min + Vec2::splat(self.cell_size))
    }

    pub fn is_valid(&self, coord: &GridCoord) -> bool {
        coord.x >= 0
            && coord.x < self.width as i32
            && coord.y >= 0
            && coord.y < self.height as i32
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        if !self.is_valid(&coord) {
            return None;
        }
        Some((coord.y as usize) * self.width + (coord.x as usize))
    }

    /// Returns `None` if the coordinate is out of bounds.
    pub fn get(&self, coord: GridCoord) -> Option<&T> {
        self.index(coord).and_then(|i| self.cells.get(i))
    }

    pub fn get_mut(&mut self, coord: GridCoord) -> Option<&mut T> {
        self.index(coord).and_then(move |i| self.cells.get_mut(i))
    }

    /// Returns `false` if the coordinate is out of bounds.
    pub fn set(&mut self, coord: GridCoord, value: T) -> bool {
        if let Some(cell) = self.get_mut(coord) {
            *cell = value;
            true
        } else {
            false
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_grid_floors_negative_positions() {
        let grid: Grid<i32> = Grid::new(4, 4, 2.0, 0);
        assert_eq!(grid.world_to_grid(Vec2::new(-0.5, 3.9)), GridCoord::new(-1, 1));
        assert_eq!(grid.grid_to_world(GridCoord::new(1, 1)), Vec2::new(3.0, 3.0));
    }

    #[test]
    fn out_of_bounds_access_is_none() {
        let mut grid: Grid<i32> = Grid::new(2, 2, 1.0, 0);
        assert!(grid.get(GridCoord::new(2, 0)).is_none());
        assert!(!grid.set(GridCoord::new(-1, 0), 5));
        assert!(grid.set(GridCoord::new(1, 1), 5));
        assert_eq!(grid.get(GridCoord::new(1, 1)), Some(&5));
    }

    #[test]
    fn cell_range_covers_box_footprint() {
        let aabb = Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(2.0, 1.5));
        let range = CellRange::from_aabb(&aabb, 1.0);
        let cells: Vec<_> = range.iter().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(range.cell_count(), 6);
        assert!(range.contains(GridCoord::new(2, 1)));
    }

    #[test]
    fn cell_count_does_not_overflow_on_huge_boxes() {
        let aabb = Aabb::new(Vec2::splat(-f32::MAX), Vec2::splat(f32::MAX));
        let range = CellRange::from_aabb(&aabb, 1.0);
        assert!(range.cell_count() > u64::from(u32::MAX));
    }
}
