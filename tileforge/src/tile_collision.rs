//! Tile collision layer: per-cell collision codes plus grid ray marching.
//!
//! Code `0` is empty, codes `> 0` are solid tiles. Negative codes never block
//! movement on their own but are still reported to object tile hooks.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridCoord};
use crate::math::{sign, Vec2};

fn default_cell_size() -> f32 {
    1.0
}

/// External level description: dimensions plus row-major collision codes
/// (row 0 is the bottom row).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileLevel {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    pub codes: Vec<i32>,
}

impl TileLevel {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse tile level")
    }
}

/// Collision codes for a rectangular tile grid.
#[derive(Clone, Debug)]
pub struct TileCollisionMap {
    grid: Grid<i32>,
}

impl TileCollisionMap {
    /// Create an empty map.
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            grid: Grid::new(width, height, cell_size, 0),
        }
    }

    /// Materialize a loaded level.
    pub fn from_level(level: TileLevel) -> Result<Self> {
        if !(level.cell_size > 0.0) {
            return Err(anyhow!("Tile level cell_size must be positive, got {}", level.cell_size));
        }
        let expected = level.width * level.height;
        let found = level.codes.len();
        let grid = Grid::from_cells(level.width, level.height, level.cell_size, level.codes)
            .ok_or_else(|| {
                log::warn!("Rejected tile level: expected {expected} codes, found {found}");
                anyhow!(
                    "Tile level is {}x{} but has {} codes",
                    level.width,
                    level.height,
                    found
                )
            })?;
        Ok(Self { grid })
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size()
    }

    pub fn grid(&self) -> &Grid<i32> {
        &self.grid
    }

    /// Collision code at a world position; `0` for empty or out of bounds.
    pub fn collision_data_at(&self, world_pos: Vec2) -> i32 {
        self.collision_data_at_cell(self.grid.world_to_grid(world_pos))
    }

    pub fn collision_data_at_cell(&self, coord: GridCoord) -> i32 {
        self.grid.get(coord).copied().unwrap_or(0)
    }

    /// Returns `false` when the position is outside the map.
    pub fn set_collision_data(&mut self, world_pos: Vec2, code: i32) -> bool {
        let coord = self.grid.world_to_grid(world_pos);
        self.grid.set(coord, code)
    }

    /// Clear the tile under `world_pos`. Returns whether a tile was removed.
    pub fn destroy_tile(&mut self, world_pos: Vec2) -> bool {
        let coord = self.grid.world_to_grid(world_pos);
        match self.grid.get_mut(coord) {
            Some(code) if *code != 0 => {
                log::debug!("Destroyed tile {:?} (code {})", coord, *code);
                *code = 0;
                true
            }
            _ => false,
        }
    }

    /// March from `from` to `to` and return the point where the segment first
    /// enters a solid cell, or `None` when the path is clear.
    ///
    /// A segment that starts inside a solid cell hits at `from`.
    pub fn raycast(&self, from: Vec2, to: Vec2) -> Option<Vec2> {
        self.raycast_filtered(from, to, |code, _| code > 0)
    }

    /// Like [`raycast`](Self::raycast), with the caller deciding which
    /// non-zero codes block the ray.
    ///
    /// Cells are visited in the order the segment crosses them. When the
    /// segment passes exactly through a cell corner, the axis with the larger
    /// travel is stepped first (X on equal travel).
    pub fn raycast_filtered<F>(&self, from: Vec2, to: Vec2, mut blocks: F) -> Option<Vec2>
    where
        F: FnMut(i32, GridCoord) -> bool,
    {
        let cs = self.cell_size();
        let mut cell = self.grid.world_to_grid(from);
        let code = self.collision_data_at_cell(cell);
        if code != 0 && blocks(code, cell) {
            return Some(from);
        }

        let delta = to - from;
        let end = self.grid.world_to_grid(to);
        let step_x = sign(delta.x) as i32;
        let step_y = sign(delta.y) as i32;

        let t_delta_x = if delta.x != 0.0 { cs / delta.x.abs() } else { f32::INFINITY };
        let t_delta_y = if delta.y != 0.0 { cs / delta.y.abs() } else { f32::INFINITY };
        let mut t_max_x = first_crossing(from.x, delta.x, cell.x, cs);
        let mut t_max_y = first_crossing(from.y, delta.y, cell.y, cs);
        let prefer_x = delta.x.abs() >= delta.y.abs();

        let steps = (end.x - cell.x).abs() + (end.y - cell.y).abs();
        for _ in 0..steps {
            let along_x = if t_max_x < t_max_y {
                true
            } else if t_max_y < t_max_x {
                false
            } else {
                prefer_x
            };

            let t = if along_x { t_max_x } else { t_max_y };
            if t > 1.0 {
                return None;
            }
            if along_x {
                cell.x += step_x;
                t_max_x += t_delta_x;
            } else {
                cell.y += step_y;
                t_max_y += t_delta_y;
            }

            let code = self.collision_data_at_cell(cell);
            if code != 0 && blocks(code, cell) {
                let mut hit = from + delta * t;
                // Snap the crossed coordinate onto the boundary exactly.
                if along_x {
                    hit.x = near_boundary(cell.x, step_x, cs);
                } else {
                    hit.y = near_boundary(cell.y, step_y, cs);
                }
                return Some(hit);
            }
        }
        None
    }
}

fn first_crossing(origin: f32, delta: f32, cell: i32, cs: f32) -> f32 {
    if delta > 0.0 {
        ((cell + 1) as f32 * cs - origin) / delta
    } else if delta < 0.0 {
        (cell as f32 * cs - origin) / delta
    } else {
        f32::INFINITY
    }
}

/// Boundary of `cell` facing a ray travelling in direction `step`.
fn near_boundary(cell: i32, step: i32, cs: f32) -> f32 {
    if step > 0 {
        cell as f32 * cs
    } else {
        (cell + 1) as f32 * cs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(cells: &[(i32, i32, i32)]) -> TileCollisionMap {
        let mut map = TileCollisionMap::new(10, 10, 1.0);
        for &(x, y, code) in cells {
            map.set_collision_data(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), code);
        }
        map
    }

    #[test]
    fn out_of_bounds_reads_empty() {
        let map = map_with(&[(0, 0, 3)]);
        assert_eq!(map.collision_data_at(Vec2::new(0.5, 0.5)), 3);
        assert_eq!(map.collision_data_at(Vec2::new(-4.0, 0.5)), 0);
        assert_eq!(map.collision_data_at(Vec2::new(0.5, 400.0)), 0);
    }

    #[test]
    fn destroy_tile_is_idempotent() {
        let mut map = map_with(&[(2, 2, 1)]);
        assert!(map.destroy_tile(Vec2::new(2.5, 2.5)));
        assert!(!map.destroy_tile(Vec2::new(2.5, 2.5)));
        assert_eq!(map.collision_data_at(Vec2::new(2.5, 2.5)), 0);
        assert!(!map.destroy_tile(Vec2::new(-1.0, -1.0)));
    }

    #[test]
    fn ray_stops_on_near_face_going_left() {
        let map = map_with(&[(2, 5, 1)]);
        let hit = map.raycast(Vec2::new(8.5, 5.5), Vec2::new(0.5, 5.5)).unwrap();
        assert_eq!(hit.x, 3.0);
        assert!((hit.y - 5.5).abs() < 1e-5);
    }

    #[test]
    fn ray_stops_on_near_face_going_down() {
        let map = map_with(&[(4, 1, 2)]);
        let hit = map.raycast(Vec2::new(4.25, 8.0), Vec2::new(4.25, 0.2)).unwrap();
        assert_eq!(hit.y, 2.0);
        assert!((hit.x - 4.25).abs() < 1e-5);
    }

    #[test]
    fn ray_ending_before_tile_misses() {
        let map = map_with(&[(6, 0, 1)]);
        assert!(map.raycast(Vec2::new(0.5, 0.5), Vec2::new(5.9, 0.5)).is_none());
    }

    #[test]
    fn ray_starting_inside_solid_hits_immediately() {
        let map = map_with(&[(1, 1, 1)]);
        let from = Vec2::new(1.5, 1.5);
        assert_eq!(map.raycast(from, Vec2::new(7.0, 7.0)), Some(from));
    }

    #[test]
    fn corner_graze_steps_major_axis_first() {
        // Segment passes exactly through the corner at (2, 1). X travel is
        // larger, so the ray enters (2, 0) rather than (1, 1).
        let map = map_with(&[(2, 0, 5), (1, 1, 6)]);
        let mut hit_code = 0;
        let hit = map
            .raycast_filtered(Vec2::new(0.0, 0.0), Vec2::new(4.0, 2.0), |code, _| {
                hit_code = code;
                true
            })
            .unwrap();
        assert_eq!(hit_code, 5);
        assert_eq!(hit.x, 2.0);

        let map = map_with(&[(2, 1, 1)]);
        let from = Vec2::new(1.5, 1.5);
        let hit = map.raycast(from, Vec2::new(2.5, 2.5)).unwrap();
        assert_eq!(hit, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn filter_can_ignore_codes() {
        let map = map_with(&[(3, 0, 7), (5, 0, 1)]);
        let hit = map
            .raycast_filtered(Vec2::new(0.5, 0.5), Vec2::new(9.5, 0.5), |code, _| code != 7)
            .unwrap();
        assert_eq!(hit.x, 5.0);
    }

    #[test]
    fn level_dimensions_are_checked() {
        let bad = TileLevel {
            width: 2,
            height: 2,
            cell_size: 1.0,
            codes: vec![0, 1, 0],
        };
        assert!(TileCollisionMap::from_level(bad).is_err());

        let level = TileLevel::from_json(r#"{ "width": 2, "height": 1, "codes": [0, 4] }"#).unwrap();
        let map = TileCollisionMap::from_level(level).unwrap();
        assert_eq!(map.collision_data_at(Vec2::new(1.5, 0.5)), 4);
    }
}
