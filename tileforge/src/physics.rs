//! Per-object integration and collision response.
//!
//! Order per object and tick:
//! 1. gravity, damping, speed clamp
//! 2. swept tile collision, Y axis then X axis
//! 3. object/object separation against solid neighbours
//!
//! Every contact goes through the object's [`Behavior`](crate::Behavior)
//! hooks first. A hook may destroy anything, including the object being
//! integrated; integration stops as soon as that happens.

use crate::behavior::{default_tile_response, CollisionResponse};
use crate::color::Color;
use crate::grid::GridCoord;
use crate::math::{sign, Vec2};
use crate::object::{Ground, ObjectId};
use crate::world::World;

/// Skin used to keep resting contacts from registering as penetration.
pub const CONTACT_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn of(self, v: Vec2) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }

    fn set(self, v: &mut Vec2, value: f32) {
        match self {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
        }
    }

    fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    fn cell(self, along: i32, across: i32) -> GridCoord {
        match self {
            Axis::X => GridCoord::new(along, across),
            Axis::Y => GridCoord::new(across, along),
        }
    }

    fn unit(self, s: f32) -> Vec2 {
        match self {
            Axis::X => Vec2::new(s, 0.0),
            Axis::Y => Vec2::new(0.0, s),
        }
    }
}

/// Advance one unparented object by `dt`.
pub(crate) fn integrate(world: &mut World, id: ObjectId, dt: f32) {
    let gravity = world.config.gravity;
    let max_speed = world.config.max_speed;

    let Some(object) = world.objects.get_mut(&id) else {
        return;
    };
    object.ground = None;

    if object.gravity_scale != 0.0 {
        object.velocity.y -= object.gravity_scale * gravity * dt;
    }
    object.velocity *= object.damping;
    object.angle_velocity *= object.angle_damping;
    object.velocity = object.velocity.clamp_components(max_speed);
    object.angle += object.angle_velocity * dt;

    let solid_size = !object.is_zero_size();
    let sweep_tiles = object.collides_with_tiles && solid_size;
    let resolve_objects =
        (object.collides_with_solid_objects || object.is_solid) && solid_size;

    if sweep_tiles {
        for axis in [Axis::Y, Axis::X] {
            if !sweep_axis(world, id, axis, dt) {
                return;
            }
        }
    } else {
        let step = object.velocity * dt;
        object.position += step;
    }

    if resolve_objects {
        world.refresh_spatial(id);
        resolve_object_contacts(world, id);
    }
}

/// Move along one axis, stopping at the first tile row whose hooks ask for
/// resolution. Returns `false` if the object was destroyed by a hook.
fn sweep_axis(world: &mut World, id: ObjectId, axis: Axis, dt: f32) -> bool {
    let cell_size = world.tiles.cell_size();
    let Some(object) = world.objects.get(&id) else {
        return false;
    };

    let travel = axis.of(object.velocity) * dt;
    if travel == 0.0 {
        return true;
    }
    let across = axis.other();
    let half = axis.of(object.size) * 0.5;
    let across_half = across.of(object.size) * 0.5;
    let center = axis.of(object.position);
    let across_center = across.of(object.position);

    let dir = sign(travel);
    let lead = center + dir * half;
    let target = lead + travel;

    let skin = CONTACT_EPSILON * cell_size;
    // A thin object must still cover the cell its centre sits in.
    let across_skin = skin.min(across_half * 0.5);
    let (along_cells, across_cells) = match axis {
        Axis::X => (world.tiles.width(), world.tiles.height()),
        Axis::Y => (world.tiles.height(), world.tiles.width()),
    };
    let across_lo = ((across_center - across_half + across_skin) / cell_size).floor() as i32;
    let across_hi = ((across_center + across_half - across_skin) / cell_size).floor() as i32;
    let (across_lo, across_hi) = if across_lo > across_hi {
        let cell = (across_center / cell_size).floor() as i32;
        (cell, cell)
    } else {
        (across_lo, across_hi)
    };
    // Cells outside the map are empty.
    let across_lo = across_lo.max(0);
    let across_hi = across_hi.min(across_cells as i32 - 1);

    // Rows whose near boundary the leading edge reaches this step, near to far.
    let rows: Vec<i32> = if dir > 0.0 {
        let first = ((lead - skin) / cell_size).ceil() as i32;
        let last = (target / cell_size).ceil() as i32 - 1;
        (first.max(0)..=last.min(along_cells as i32 - 1)).collect()
    } else {
        let first = ((lead + skin) / cell_size).floor() as i32 - 1;
        let last = (target / cell_size).floor() as i32;
        (last.max(0)..=first.min(along_cells as i32 - 1)).rev().collect()
    };

    let mut blocked_row = None;
    for row in rows {
        for col in across_lo..=across_hi {
            let coord = axis.cell(row, col);
            let code = world.tiles.collision_data_at_cell(coord);
            if code == 0 {
                continue;
            }
            let response = world
                .with_behavior(id, |behavior, world| {
                    behavior.collide_with_tile(id, code, coord, world)
                })
                .unwrap_or_else(|| default_tile_response(code));
            if !world.is_alive(id) {
                return false;
            }
            log::trace!("{:?} touched tile {} at {:?}: {:?}", id, code, coord, response);
            if response == CollisionResponse::Resolve {
                blocked_row = Some(row);
            }
        }
        if blocked_row.is_some() {
            break;
        }
    }

    let Some(object) = world.objects.get_mut(&id) else {
        return false;
    };
    let new_lead = match blocked_row {
        Some(row) => {
            let boundary = if dir > 0.0 {
                row as f32 * cell_size
            } else {
                (row + 1) as f32 * cell_size
            };
            let overshoot = (target - boundary).abs();
            let elasticity = object.elasticity;

            let v = axis.of(object.velocity);
            axis.set(&mut object.velocity, v - v * (1.0 + elasticity));
            let v_across = across.of(object.velocity);
            across.set(&mut object.velocity, v_across * object.friction);
            if axis == Axis::Y && dir < 0.0 {
                object.ground = Some(Ground::World);
            }
            // Spend the rest of the step travelling back out.
            boundary - dir * elasticity * overshoot
        }
        None => target,
    };
    axis.set(&mut object.position, new_lead - dir * half);
    true
}

fn can_contact(world: &World, a: ObjectId, b: ObjectId) -> bool {
    let (Some(oa), Some(ob)) = (world.get(a), world.get(b)) else {
        return false;
    };
    // Zero-size objects are still valid targets.
    if a == b || ob.parent.is_some() {
        return false;
    }
    (oa.collides_with_solid_objects && ob.is_solid) || (oa.is_solid && ob.collides_with_solid_objects)
}

/// Inverse mass used for separation; `0` for objects that never get pushed.
fn inverse_mass(world: &World, id: ObjectId) -> f32 {
    match world.get(id) {
        Some(o) if o.mass > 0.0 && o.parent.is_none() && o.collides_with_solid_objects => {
            1.0 / o.mass
        }
        _ => 0.0,
    }
}

fn resolve_object_contacts(world: &mut World, id: ObjectId) {
    let Some(aabb) = world.get(id).map(|o| o.aabb()) else {
        return;
    };
    for other in world.spatial.query(&aabb) {
        if !world.is_alive(id) {
            return;
        }
        if !can_contact(world, id, other) {
            continue;
        }
        let (Some(a), Some(b)) = (world.get(id), world.get(other)) else {
            continue;
        };
        if !a.aabb().overlaps(&b.aabb()) {
            continue;
        }
        let pair = (id.min(other), id.max(other));
        if world.contact_pairs.contains(&pair) {
            continue;
        }

        // Both parties are always asked.
        let mine = world
            .with_behavior(id, |behavior, world| behavior.collide_with_object(id, other, world))
            .unwrap_or(CollisionResponse::Resolve);
        let theirs = world
            .with_behavior(other, |behavior, world| behavior.collide_with_object(other, id, world))
            .unwrap_or(CollisionResponse::Resolve);
        log::trace!("{:?} touched {:?}: {:?}/{:?}", id, other, mine, theirs);

        if mine == CollisionResponse::Handled || theirs == CollisionResponse::Handled {
            world.contact_pairs.insert(pair);
            continue;
        }
        if !world.is_alive(id) || !world.is_alive(other) {
            continue;
        }
        // Neither side can move, so the other side's turn would change nothing.
        if inverse_mass(world, id) + inverse_mass(world, other) <= 0.0 {
            world.contact_pairs.insert(pair);
            continue;
        }
        separate(world, id, other);
    }
}

/// Push `a` and `b` apart along the axis of least penetration (X on ties)
/// and exchange normal velocity with restitution.
fn separate(world: &mut World, a_id: ObjectId, b_id: ObjectId) {
    let inv_a = inverse_mass(world, a_id);
    let inv_b = inverse_mass(world, b_id);
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return;
    }

    let (Some(a), Some(b)) = (world.get(a_id), world.get(b_id)) else {
        return;
    };
    let (box_a, box_b) = (a.aabb(), b.aabb());
    // Distance needed to push `a` clear on each axis.
    let pen_x = (box_a.max.x - box_b.min.x).min(box_b.max.x - box_a.min.x);
    let pen_y = (box_a.max.y - box_b.min.y).min(box_b.max.y - box_a.min.y);
    let delta = a.position - b.position;

    let (axis, penetration) = if pen_x <= pen_y {
        (Axis::X, pen_x)
    } else {
        (Axis::Y, pen_y)
    };
    let side = match sign(axis.of(delta)) {
        s if s == 0.0 => 1.0,
        s => s,
    };
    let normal = axis.unit(side);
    let tangent = axis.other().unit(1.0);

    let elasticity = a.elasticity.max(b.elasticity);
    let friction = a.friction.min(b.friction);
    let relative = a.velocity - b.velocity;
    let approach = relative.dot(normal);

    let mut dv_a = Vec2::ZERO;
    let mut dv_b = Vec2::ZERO;
    if approach < 0.0 {
        let j = -(1.0 + elasticity) * approach / inv_sum;
        let slide = relative.dot(tangent) * (1.0 - friction) / inv_sum;
        dv_a = normal * (j * inv_a) - tangent * (slide * inv_a);
        dv_b = normal * (-j * inv_b) + tangent * (slide * inv_b);
    }

    let push_a = normal * (penetration * inv_a / inv_sum);
    let push_b = normal * (-penetration * inv_b / inv_sum);
    let record = world.config.debug.physics;
    let now = world.time();

    if let Some(a) = world.objects.get_mut(&a_id) {
        a.position += push_a;
        a.velocity += dv_a;
        if axis == Axis::Y && side > 0.0 && inv_a > 0.0 {
            a.ground = Some(Ground::Object(b_id));
        }
    }
    if let Some(b) = world.objects.get_mut(&b_id) {
        b.position += push_b;
        b.velocity += dv_b;
        if axis == Axis::Y && side < 0.0 && inv_b > 0.0 {
            b.ground = Some(Ground::Object(a_id));
        }
    }
    world.refresh_spatial(a_id);
    world.refresh_spatial(b_id);

    if record {
        world.debug_draw.aabb(now, box_a, Color::new(1.0, 0.0, 0.0, 0.5));
        world.debug_draw.aabb(now, box_b, Color::new(0.0, 1.0, 0.0, 0.5));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::behavior::Behavior;
    use crate::config::SimulationConfig;
    use crate::object::ObjectDesc;
    use crate::tile_collision::TileCollisionMap;

    fn floor_world(gravity: f32) -> World {
        let mut tiles = TileCollisionMap::new(20, 20, 1.0);
        for x in 0..20 {
            tiles.set_collision_data(Vec2::new(x as f32 + 0.5, 0.5), 1);
        }
        World::new(SimulationConfig::default().with_gravity(gravity), tiles)
    }

    fn body(position: Vec2) -> ObjectDesc {
        ObjectDesc::new(position, Vec2::ONE)
            .with_damping(1.0)
            .with_collision(true, true, false)
    }

    #[test]
    fn gravity_then_damping_then_move() {
        let mut world = World::new(
            SimulationConfig::default().with_gravity(10.0),
            TileCollisionMap::new(1, 1, 1.0),
        );
        let id = world.spawn(ObjectDesc::new(Vec2::new(0.0, 50.0), Vec2::ONE).with_damping(0.5));
        world.step(0.05);
        let o = world.get(id).unwrap();
        // (0 - 10 * 0.05) * 0.5
        assert!((o.velocity.y + 0.25).abs() < 1e-6);
        assert!((o.position.y - (50.0 - 0.25 * 0.05)).abs() < 1e-5);
    }

    #[test]
    fn falling_body_lands_on_floor() {
        let mut world = floor_world(10.0);
        let id = world.spawn(body(Vec2::new(5.0, 4.0)));
        for _ in 0..100 {
            world.step(1.0 / 60.0);
        }
        let o = world.get(id).unwrap();
        assert!((o.position.y - 1.5).abs() < 1e-4, "y = {}", o.position.y);
        assert_eq!(o.velocity.y, 0.0);
        assert_eq!(world.ground_object(id), Some(Ground::World));
    }

    #[test]
    fn wall_blocks_horizontal_motion_and_keeps_friction_axis() {
        let mut tiles = TileCollisionMap::new(10, 10, 1.0);
        tiles.set_collision_data(Vec2::new(6.5, 3.5), 1);
        let mut world = World::new(SimulationConfig::default().with_gravity(0.0), tiles);
        let id = world.spawn(
            body(Vec2::new(4.0, 3.5))
                .with_velocity(Vec2::new(40.0, 2.0))
                .with_friction(0.5),
        );
        world.step(0.05);
        let o = world.get(id).unwrap();
        assert!((o.position.x - 5.5).abs() < 1e-5);
        assert!((o.position.y - 3.6).abs() < 1e-5);
        assert_eq!(o.velocity.x, 0.0);
        // Sliding along the wall keeps `friction` of the vertical speed.
        assert_eq!(o.velocity.y, 2.0 * 0.5);
    }

    #[test]
    fn negative_codes_do_not_block_by_default() {
        let mut tiles = TileCollisionMap::new(10, 10, 1.0);
        tiles.set_collision_data(Vec2::new(5.5, 3.5), -1);
        let mut world = World::new(SimulationConfig::default().with_gravity(0.0), tiles);
        let id = world.spawn(body(Vec2::new(4.0, 3.5)).with_velocity(Vec2::new(40.0, 0.0)));
        world.step(0.05);
        assert!((world.get(id).unwrap().position.x - 6.0).abs() < 1e-5);
    }

    #[test]
    fn zero_size_objects_ignore_tiles() {
        let mut world = floor_world(10.0);
        let id = world.spawn(
            ObjectDesc::new(Vec2::new(5.0, 1.2), Vec2::ZERO)
                .with_damping(1.0)
                .with_collision(true, true, false),
        );
        for _ in 0..10 {
            world.step(0.05);
        }
        assert!(world.get(id).unwrap().position.y < 1.0);
    }

    #[test]
    fn body_rests_on_immovable_platform() {
        let mut world = World::new(
            SimulationConfig::default().with_gravity(10.0),
            TileCollisionMap::new(1, 1, 1.0),
        );
        let platform = world.spawn(
            ObjectDesc::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 1.0))
                .with_gravity_scale(0.0)
                .with_mass(0.0)
                .with_collision(false, false, true),
        );
        let crate_id = world.spawn(
            ObjectDesc::new(Vec2::new(0.0, 2.0), Vec2::ONE)
                .with_damping(1.0)
                .with_collision(false, true, true),
        );
        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        let c = world.get(crate_id).unwrap();
        assert!((c.position.y - 1.0).abs() < 0.05, "y = {}", c.position.y);
        assert_eq!(world.ground_object(crate_id), Some(Ground::Object(platform)));
        assert_eq!(world.get(platform).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn equal_masses_split_the_separation() {
        let mut world = World::new(
            SimulationConfig::default().with_gravity(0.0),
            TileCollisionMap::new(1, 1, 1.0),
        );
        let a = world.spawn(
            ObjectDesc::new(Vec2::new(0.0, 0.0), Vec2::ONE)
                .with_damping(1.0)
                .with_collision(false, true, true),
        );
        let b = world.spawn(
            ObjectDesc::new(Vec2::new(0.5, 0.0), Vec2::ONE)
                .with_damping(1.0)
                .with_collision(false, true, true),
        );
        world.step(0.0);
        let (pa, pb) = (world.get(a).unwrap().position, world.get(b).unwrap().position);
        assert!((pa.x + 0.25).abs() < 1e-5);
        assert!((pb.x - 0.75).abs() < 1e-5);
    }

    struct Touches(Rc<Cell<usize>>);

    impl Behavior for Touches {
        fn collide_with_object(
            &mut self,
            _id: ObjectId,
            _other: ObjectId,
            _world: &mut World,
        ) -> CollisionResponse {
            self.0.set(self.0.get() + 1);
            CollisionResponse::Resolve
        }
    }

    fn no_gravity() -> World {
        World::new(
            SimulationConfig::default().with_gravity(0.0),
            TileCollisionMap::new(1, 1, 1.0),
        )
    }

    #[test]
    fn contact_slide_keeps_friction_of_tangential_speed() {
        let mut world = no_gravity();
        let platform = world.spawn(
            ObjectDesc::new(Vec2::ZERO, Vec2::new(10.0, 1.0))
                .with_mass(0.0)
                .with_friction(0.5)
                .with_collision(false, false, true),
        );
        let id = world.spawn(
            ObjectDesc::new(Vec2::new(0.0, 1.01), Vec2::ONE)
                .with_damping(1.0)
                .with_friction(0.5)
                .with_velocity(Vec2::new(4.0, -2.0))
                .with_collision(false, true, false),
        );
        world.step(0.01);
        let o = world.get(id).unwrap();
        assert!((o.velocity.x - 2.0).abs() < 1e-5, "vx = {}", o.velocity.x);
        assert!(o.velocity.y.abs() < 1e-5);
        assert!((o.position.y - 1.0).abs() < 1e-5);
        assert_eq!(world.ground_object(id), Some(Ground::Object(platform)));
    }

    #[test]
    fn zero_size_solid_is_hit_by_overlapping_box() {
        let mut world = no_gravity();
        let touches = Rc::new(Cell::new(0));
        world.spawn_with(
            ObjectDesc::new(Vec2::new(0.3, 0.2), Vec2::ZERO)
                .with_gravity_scale(0.0)
                .with_collision(false, false, true),
            Touches(touches.clone()),
        );
        let boxed = world.spawn(
            ObjectDesc::new(Vec2::ZERO, Vec2::splat(2.0))
                .with_damping(1.0)
                .with_collision(false, true, false),
        );
        world.step(0.01);
        assert_eq!(touches.get(), 1);
        // Pushed clear along X, the shallower way out.
        assert!((world.get(boxed).unwrap().position.x + 0.7).abs() < 1e-5);
    }

    #[test]
    fn immovable_pair_hooks_run_once_per_tick() {
        let mut world = no_gravity();
        let (a_hits, b_hits) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let fixed = |x: f32| {
            ObjectDesc::new(Vec2::new(x, 0.0), Vec2::ONE)
                .with_mass(0.0)
                .with_collision(false, true, true)
        };
        world.spawn_with(fixed(0.0), Touches(a_hits.clone()));
        world.spawn_with(fixed(0.5), Touches(b_hits.clone()));
        world.step(0.01);
        assert_eq!((a_hits.get(), b_hits.get()), (1, 1));
        world.step(0.01);
        assert_eq!((a_hits.get(), b_hits.get()), (2, 2));
    }
}
