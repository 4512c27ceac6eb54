//! Debug recording and inspection.
//!
//! Nothing here draws. [`DebugDraw`] collects timed primitives that a
//! renderer may show; the overlay and pick queries only read world state.

use std::ops::ControlFlow;

use crate::color::Color;
use crate::grid::GridCoord;
use crate::math::{Aabb, Vec2};
use crate::object::{Ground, ObjectId};
use crate::world::World;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DebugShape {
    Rect {
        center: Vec2,
        size: Vec2,
        angle: f32,
        fill: bool,
    },
    Circle {
        center: Vec2,
        radius: f32,
        fill: bool,
    },
    Line {
        from: Vec2,
        to: Vec2,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugPrimitive {
    pub shape: DebugShape,
    pub color: Color,
    /// Simulation time after which the primitive is dropped.
    pub expires: f64,
}

/// Timed list of debug primitives. Primitives with a zero duration last
/// until the next tick.
#[derive(Clone, Debug, Default)]
pub struct DebugDraw {
    primitives: Vec<DebugPrimitive>,
}

impl DebugDraw {
    pub fn primitives(&self) -> &[DebugPrimitive] {
        &self.primitives
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    /// Drop everything that expired before `now`.
    pub fn prune(&mut self, now: f64) {
        self.primitives.retain(|p| p.expires >= now);
    }

    fn push(&mut self, now: f64, duration: f64, shape: DebugShape, color: Color) {
        self.primitives.push(DebugPrimitive {
            shape,
            color,
            expires: now + duration.max(0.0),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rect(
        &mut self,
        now: f64,
        center: Vec2,
        size: Vec2,
        angle: f32,
        color: Color,
        fill: bool,
        duration: f64,
    ) {
        let shape = DebugShape::Rect {
            center,
            size,
            angle,
            fill,
        };
        self.push(now, duration, shape, color);
    }

    pub fn circle(&mut self, now: f64, center: Vec2, radius: f32, color: Color, fill: bool, duration: f64) {
        let shape = DebugShape::Circle {
            center,
            radius,
            fill,
        };
        self.push(now, duration, shape, color);
    }

    pub fn point(&mut self, now: f64, center: Vec2, color: Color, duration: f64) {
        self.rect(now, center, Vec2::ZERO, 0.0, color, false, duration);
    }

    pub fn line(&mut self, now: f64, from: Vec2, to: Vec2, color: Color, duration: f64) {
        self.push(now, duration, DebugShape::Line { from, to }, color);
    }

    pub fn aabb(&mut self, now: f64, aabb: Aabb, color: Color) {
        self.rect(now, aabb.center(), aabb.size(), 0.0, color, false, 0.0);
    }

    /// A ray, red up to its hit (marked by a point) or green if it missed.
    pub(crate) fn raycast(&mut self, now: f64, from: Vec2, to: Vec2, hit: Option<Vec2>) {
        match hit {
            Some(hit) => {
                let red = Color::rgb(1.0, 0.0, 0.0);
                self.line(now, from, hit, red, 0.0);
                self.point(now, hit, red, 0.0);
            }
            None => self.line(now, from, to, Color::rgb(0.0, 1.0, 0.0), 0.0),
        }
    }
}

/// Collision-relevant state of one live object.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugOverlayEntry {
    pub id: ObjectId,
    pub position: Vec2,
    pub size: Vec2,
    pub velocity: Vec2,
    pub collides_with_tiles: bool,
    pub collides_with_solid_objects: bool,
    pub is_solid: bool,
    pub parent: Option<ObjectId>,
    pub children: usize,
    pub ground: Option<Ground>,
}

/// Result of [`World::pick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickInfo {
    /// Live object whose centre is nearest the point, if any is in range.
    pub object: Option<ObjectId>,
    pub distance: f32,
    /// First solid tile between the picked object and the point.
    pub raycast_hit: Option<Vec2>,
    pub tile: GridCoord,
    pub tile_code: i32,
}

impl World {
    /// Read-only view of the primitives recorded this tick.
    pub fn debug_draw(&self) -> &DebugDraw {
        &self.debug_draw
    }

    pub fn debug_draw_mut(&mut self) -> &mut DebugDraw {
        &mut self.debug_draw
    }

    /// One entry per live object, in update order.
    pub fn debug_overlay(&self) -> Vec<DebugOverlayEntry> {
        self.object_ids()
            .into_iter()
            .filter_map(|id| {
                let o = self.get(id)?;
                Some(DebugOverlayEntry {
                    id,
                    position: o.position,
                    size: o.size,
                    velocity: o.velocity,
                    collides_with_tiles: o.collides_with_tiles,
                    collides_with_solid_objects: o.collides_with_solid_objects,
                    is_solid: o.is_solid,
                    parent: o.parent(),
                    children: o.children().len(),
                    ground: self.ground_object(id),
                })
            })
            .collect()
    }

    /// Inspect the world around `point`: the nearest object within `radius`,
    /// the tile underneath, and a ray from that object to the point.
    pub fn pick(&self, point: Vec2, radius: f32) -> PickInfo {
        let mut best: Option<(ObjectId, f32, Vec2)> = None;
        self.for_each_in_region(point, Vec2::splat(radius), |o| {
            let d = o.position.distance(point);
            if d <= radius && best.map_or(true, |(_, bd, _)| d < bd) {
                best = Some((o.id(), d, o.position));
            }
            ControlFlow::Continue(())
        });

        let tiles = self.tile_map();
        PickInfo {
            object: best.map(|(id, _, _)| id),
            distance: best.map_or(f32::INFINITY, |(_, d, _)| d),
            raycast_hit: best.and_then(|(_, _, from)| tiles.raycast(from, point)),
            tile: tiles.grid().world_to_grid(point),
            tile_code: tiles.collision_data_at(point),
        }
    }
}
