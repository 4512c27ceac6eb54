//! Broad-phase uniform grid.
//!
//! Each object is registered in every cell its AABB touches. Queries return
//! candidates from the covered cells; callers filter with an exact overlap
//! test. The index never misses an object whose box intersects the query.
//!
//! Objects covering more than [`MAX_FOOTPRINT_CELLS`] cells are kept in a
//! separate list and returned by every query instead of being spread over
//! the grid.

use std::collections::{HashMap, HashSet};

use crate::grid::{CellRange, GridCoord};
use crate::math::Aabb;
use crate::object::ObjectId;

/// Largest footprint registered cell by cell.
pub const MAX_FOOTPRINT_CELLS: u64 = 4096;

#[derive(Clone, Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<GridCoord, Vec<ObjectId>>,
    footprints: HashMap<ObjectId, CellRange>,
    oversized: HashSet<ObjectId>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            footprints: HashMap::new(),
            oversized: HashSet::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.footprints.contains_key(&id)
    }

    /// Register an object. Re-inserting an existing object moves it.
    pub fn insert(&mut self, id: ObjectId, aabb: Aabb) {
        if self.footprints.contains_key(&id) {
            self.update(id, aabb);
            return;
        }
        let range = CellRange::from_aabb(&aabb, self.cell_size);
        self.add_to_cells(id, range);
        self.footprints.insert(id, range);
    }

    /// Returns whether the object was registered.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.footprints.remove(&id) {
            Some(range) => {
                self.remove_from_cells(id, range);
                true
            }
            None => false,
        }
    }

    /// Move an object to a new box. Cheap when the footprint is unchanged.
    pub fn update(&mut self, id: ObjectId, aabb: Aabb) {
        let range = CellRange::from_aabb(&aabb, self.cell_size);
        match self.footprints.get(&id).copied() {
            Some(old) if old == range => {}
            Some(old) => {
                self.remove_from_cells(id, old);
                self.add_to_cells(id, range);
                self.footprints.insert(id, range);
            }
            None => {
                self.add_to_cells(id, range);
                self.footprints.insert(id, range);
            }
        }
    }

    /// Every object registered in a cell the query box touches, each once,
    /// in ascending id order. Oversized objects are always included.
    pub fn query(&self, aabb: &Aabb) -> Vec<ObjectId> {
        let range = CellRange::from_aabb(aabb, self.cell_size);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut visit = |bucket: &[ObjectId]| {
            for &id in bucket {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        };
        // Walk whichever is smaller: the covered cells or the occupied ones.
        if range.cell_count() > self.cells.len() as u64 {
            for (coord, bucket) in &self.cells {
                if range.contains(*coord) {
                    visit(bucket);
                }
            }
        } else {
            for coord in range.iter() {
                if let Some(bucket) = self.cells.get(&coord) {
                    visit(bucket);
                }
            }
        }
        out.extend(self.oversized.iter().copied());
        out.sort_unstable();
        out
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.footprints.clear();
        self.oversized.clear();
    }

    fn add_to_cells(&mut self, id: ObjectId, range: CellRange) {
        if range.cell_count() > MAX_FOOTPRINT_CELLS {
            self.oversized.insert(id);
            return;
        }
        for coord in range.iter() {
            self.cells.entry(coord).or_default().push(id);
        }
    }

    fn remove_from_cells(&mut self, id: ObjectId, range: CellRange) {
        if self.oversized.remove(&id) {
            return;
        }
        for coord in range.iter() {
            if let Some(bucket) = self.cells.get_mut(&coord) {
                if let Some(pos) = bucket.iter().position(|&other| other == id) {
                    bucket.swap_remove(pos);
                }
                if bucket.is_empty() {
                    self.cells.remove(&coord);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn boxed(x: f32, y: f32, size: f32) -> Aabb {
        Aabb::from_center_size(Vec2::new(x, y), Vec2::splat(size))
    }

    #[test]
    fn query_finds_objects_spanning_many_cells_once() {
        let mut index = SpatialIndex::new(1.0);
        let big = ObjectId::from_raw(1);
        index.insert(big, boxed(2.0, 2.0, 3.0));
        let found = index.query(&boxed(2.0, 2.0, 4.0));
        assert_eq!(found, vec![big]);
    }

    #[test]
    fn update_moves_object_between_cells() {
        let mut index = SpatialIndex::new(1.0);
        let id = ObjectId::from_raw(3);
        index.insert(id, boxed(0.5, 0.5, 0.5));
        index.update(id, boxed(10.5, 0.5, 0.5));
        assert!(index.query(&boxed(0.5, 0.5, 0.5)).is_empty());
        assert_eq!(index.query(&boxed(10.5, 0.5, 0.5)), vec![id]);
    }

    #[test]
    fn removed_objects_are_not_returned() {
        let mut index = SpatialIndex::new(2.0);
        let a = ObjectId::from_raw(1);
        let b = ObjectId::from_raw(2);
        index.insert(a, boxed(1.0, 1.0, 1.0));
        index.insert(b, boxed(1.2, 1.0, 1.0));
        assert!(index.remove(a));
        assert!(!index.remove(a));
        assert_eq!(index.query(&boxed(1.0, 1.0, 1.0)), vec![b]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn point_objects_are_indexed() {
        let mut index = SpatialIndex::new(1.0);
        let p = ObjectId::from_raw(9);
        index.insert(p, boxed(3.0, 3.0, 0.0));
        assert_eq!(index.query(&boxed(3.0, 3.0, 0.0)), vec![p]);
    }

    #[test]
    fn huge_footprints_do_not_fill_the_grid() {
        let mut index = SpatialIndex::new(1.0);
        let huge = ObjectId::from_raw(1);
        let small = ObjectId::from_raw(2);
        index.insert(huge, boxed(0.0, 0.0, f32::MAX));
        index.insert(small, boxed(5.5, 5.5, 0.5));
        assert!(index.cells.len() <= 1);
        assert_eq!(index.query(&boxed(-100.0, 40.0, 1.0)), vec![huge]);
        assert_eq!(index.query(&boxed(5.5, 5.5, 1.0)), vec![huge, small]);

        index.update(huge, boxed(0.5, 0.5, 0.5));
        assert!(index.oversized.is_empty());
        assert_eq!(index.query(&boxed(-100.0, 40.0, 1.0)), Vec::<ObjectId>::new());
        assert!(index.remove(huge));
    }

    #[test]
    fn huge_query_scans_occupied_cells() {
        let mut index = SpatialIndex::new(1.0);
        let a = ObjectId::from_raw(4);
        index.insert(a, boxed(-3.5, 7.5, 0.5));
        let everything = Aabb::new(Vec2::splat(-1e30), Vec2::splat(1e30));
        assert_eq!(index.query(&everything), vec![a]);
    }
}
