//! The simulated object record and the description used to spawn it.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::math::{Aabb, Vec2};

/// Handle to an object in a [`World`](crate::World).
///
/// Handles are never reused, so a stale handle resolves to nothing rather
/// than to a different object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

/// What an object is resting on this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ground {
    /// A solid tile of the collision map.
    World,
    /// Another solid object. Resolve through `World::ground_object`, which
    /// drops references to destroyed objects.
    Object(ObjectId),
}

/// Sprite-sheet tile used by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    pub index: u32,
    pub size: Vec2,
}

/// Render-only state. The simulation carries it without interpreting it,
/// except for particles, which rewrite `color` as they age.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Visual {
    pub color: Color,
    pub additive_color: Color,
    pub tile: Option<TileInfo>,
    pub additive_blend: bool,
    /// Fraction of a particle's life spent fading in and out.
    pub fade_rate: f32,
    /// Overrides `size` when drawing.
    pub draw_size: Option<Vec2>,
    /// Overrides `angle` when drawing.
    pub draw_angle: Option<f32>,
    /// Added to `position` when drawing.
    pub draw_offset: Vec2,
}

impl Default for Visual {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            additive_color: Color::CLEAR,
            tile: None,
            additive_blend: false,
            fade_rate: 0.0,
            draw_size: None,
            draw_angle: None,
            draw_offset: Vec2::ZERO,
        }
    }
}

/// A live simulated entity. Owned by the world; reach it through its
/// [`ObjectId`].
#[derive(Clone, Debug)]
pub struct Object {
    pub(crate) id: ObjectId,
    pub position: Vec2,
    /// Radians, counter-clockwise.
    pub angle: f32,
    pub mirror: bool,
    pub velocity: Vec2,
    pub angle_velocity: f32,
    /// Velocity multiplier applied every tick, in `[0, 1]`.
    pub damping: f32,
    pub angle_damping: f32,
    pub gravity_scale: f32,
    /// Restitution in `[0, 1]`.
    pub elasticity: f32,
    /// Tangential velocity kept on contact, in `[0, 1]`.
    pub friction: f32,
    /// `0` makes the object immovable in object/object contacts.
    pub mass: f32,
    pub size: Vec2,
    pub collides_with_tiles: bool,
    pub collides_with_solid_objects: bool,
    pub is_solid: bool,
    pub render_order: i32,
    pub visual: Visual,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) local_offset: Vec2,
    pub(crate) local_angle: f32,
    pub(crate) children: Vec<ObjectId>,
    pub(crate) destroyed: bool,
    pub(crate) ground: Option<Ground>,
    pub(crate) spawn_time: f64,
}

impl Object {
    pub(crate) fn from_desc(id: ObjectId, desc: ObjectDesc, now: f64) -> Self {
        Self {
            id,
            position: desc.position,
            angle: desc.angle,
            mirror: desc.mirror,
            velocity: desc.velocity,
            angle_velocity: desc.angle_velocity,
            damping: desc.damping,
            angle_damping: desc.angle_damping,
            gravity_scale: desc.gravity_scale,
            elasticity: desc.elasticity,
            friction: desc.friction,
            mass: desc.mass,
            size: desc.size,
            collides_with_tiles: desc.collides_with_tiles,
            collides_with_solid_objects: desc.collides_with_solid_objects,
            is_solid: desc.is_solid,
            render_order: desc.render_order,
            visual: desc.visual,
            parent: None,
            local_offset: Vec2::ZERO,
            local_angle: 0.0,
            children: Vec::new(),
            destroyed: false,
            ground: None,
            spawn_time: now,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Children in attachment order, which is also their update order.
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn local_offset(&self) -> Vec2 {
        self.local_offset
    }

    pub fn local_angle(&self) -> f32 {
        self.local_angle
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Raw ground contact from the last tick. Prefer `World::ground_object`,
    /// which checks that a referenced object still exists.
    pub fn ground(&self) -> Option<Ground> {
        self.ground
    }

    pub fn spawn_time(&self) -> f64 {
        self.spawn_time
    }

    /// Seconds since spawn.
    pub fn alive_time(&self, now: f64) -> f64 {
        now - self.spawn_time
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }

    /// Zero-size objects never resolve collisions themselves.
    pub fn is_zero_size(&self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    pub fn mirror_sign(&self) -> f32 {
        if self.mirror {
            -1.0
        } else {
            1.0
        }
    }

    /// Add an instantaneous velocity change scaled by inverse mass.
    /// Immovable objects ignore it.
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        if self.mass > 0.0 {
            self.velocity += impulse / self.mass;
        }
    }
}

/// Everything needed to spawn an object. Values are checked at spawn time;
/// see [`ObjectDesc::sanitized`].
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDesc {
    pub position: Vec2,
    pub size: Vec2,
    pub angle: f32,
    pub mirror: bool,
    pub velocity: Vec2,
    pub angle_velocity: f32,
    pub damping: f32,
    pub angle_damping: f32,
    pub gravity_scale: f32,
    pub elasticity: f32,
    pub friction: f32,
    pub mass: f32,
    pub collides_with_tiles: bool,
    pub collides_with_solid_objects: bool,
    pub is_solid: bool,
    pub render_order: i32,
    pub visual: Visual,
}

impl Default for ObjectDesc {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::ONE,
            angle: 0.0,
            mirror: false,
            velocity: Vec2::ZERO,
            angle_velocity: 0.0,
            damping: 0.99,
            angle_damping: 0.99,
            gravity_scale: 1.0,
            elasticity: 0.0,
            friction: 0.8,
            mass: 1.0,
            collides_with_tiles: false,
            collides_with_solid_objects: false,
            is_solid: false,
            render_order: 0,
            visual: Visual::default(),
        }
    }
}

impl ObjectDesc {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    #[must_use]
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    #[must_use]
    pub fn with_angle_velocity(mut self, angle_velocity: f32) -> Self {
        self.angle_velocity = angle_velocity;
        self
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    #[must_use]
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    #[must_use]
    pub fn with_angle_damping(mut self, angle_damping: f32) -> Self {
        self.angle_damping = angle_damping;
        self
    }

    #[must_use]
    pub fn with_gravity_scale(mut self, gravity_scale: f32) -> Self {
        self.gravity_scale = gravity_scale;
        self
    }

    #[must_use]
    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity;
        self
    }

    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    #[must_use]
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set the three collision flags at once.
    #[must_use]
    pub fn with_collision(mut self, tiles: bool, solid_objects: bool, is_solid: bool) -> Self {
        self.collides_with_tiles = tiles;
        self.collides_with_solid_objects = solid_objects;
        self.is_solid = is_solid;
        self
    }

    #[must_use]
    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.visual.color = color;
        self
    }

    #[must_use]
    pub fn with_tile(mut self, index: u32, size: Vec2) -> Self {
        self.visual.tile = Some(TileInfo { index, size });
        self
    }

    /// Clamp every parameter into its valid range.
    ///
    /// Unit-range parameters (damping, angle damping, elasticity, friction)
    /// are clamped to `[0, 1]`, negative size components and mass to `0`.
    /// NaN or infinite values fall back to the field default. Returns the
    /// cleaned description and the names of the fields that changed.
    pub fn sanitized(mut self) -> (Self, Vec<&'static str>) {
        let defaults = Self::default();
        let mut fixed = Vec::new();

        clamp_field(&mut self.damping, defaults.damping, 0.0, 1.0, "damping", &mut fixed);
        clamp_field(
            &mut self.angle_damping,
            defaults.angle_damping,
            0.0,
            1.0,
            "angle_damping",
            &mut fixed,
        );
        clamp_field(&mut self.elasticity, defaults.elasticity, 0.0, 1.0, "elasticity", &mut fixed);
        clamp_field(&mut self.friction, defaults.friction, 0.0, 1.0, "friction", &mut fixed);
        clamp_field(&mut self.mass, defaults.mass, 0.0, f32::MAX, "mass", &mut fixed);
        clamp_field(&mut self.size.x, 0.0, 0.0, f32::MAX, "size.x", &mut fixed);
        clamp_field(&mut self.size.y, 0.0, 0.0, f32::MAX, "size.y", &mut fixed);
        finite_field(&mut self.gravity_scale, defaults.gravity_scale, "gravity_scale", &mut fixed);
        finite_field(&mut self.angle, 0.0, "angle", &mut fixed);
        finite_field(&mut self.angle_velocity, 0.0, "angle_velocity", &mut fixed);
        if !self.position.is_finite() {
            self.position = Vec2::ZERO;
            fixed.push("position");
        }
        if !self.velocity.is_finite() {
            self.velocity = Vec2::ZERO;
            fixed.push("velocity");
        }

        (self, fixed)
    }
}

fn clamp_field(
    value: &mut f32,
    default: f32,
    lo: f32,
    hi: f32,
    name: &'static str,
    fixed: &mut Vec<&'static str>,
) {
    if value.is_nan() {
        *value = default;
        fixed.push(name);
    } else if *value < lo || *value > hi {
        *value = value.clamp(lo, hi);
        fixed.push(name);
    }
}

fn finite_field(value: &mut f32, default: f32, name: &'static str, fixed: &mut Vec<&'static str>) {
    if !value.is_finite() {
        *value = default;
        fixed.push(name);
    }
}
