//! Particle emitters and the particles they spawn.
//!
//! Both are ordinary objects driven by a [`Behavior`]. An emitter spawns
//! particles from its own position on a fixed rate while active; each
//! particle interpolates its colour and draw size over its lifetime and
//! destroys itself when the lifetime runs out.

use std::f32::consts::PI;
use std::fmt;
use std::rc::Rc;

use crate::behavior::{default_tile_response, Behavior, CollisionResponse};
use crate::color::Color;
use crate::grid::GridCoord;
use crate::math::{lerp, Vec2};
use crate::object::{Object, ObjectDesc, ObjectId, TileInfo};
use crate::timer::Timer;
use crate::world::World;

/// Area particles are spawned in, centred on the emitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EmitShape {
    /// Rectangle of the given size, rotated with the emitter.
    Box(Vec2),
    /// Disc of the given diameter.
    Circle(f32),
}

/// What a particle does when it hits a solid tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParticleImpact {
    /// Collide like any other object, using the emitter's elasticity and friction.
    #[default]
    Bounce,
    /// Disappear on first contact.
    Destroy,
}

/// Called with a particle's final state when it is destroyed, for example
/// to leave a spent shell behind.
#[derive(Clone)]
pub struct ParticleDestroyHook(Rc<dyn Fn(&Object, &mut World)>);

impl ParticleDestroyHook {
    pub fn new(hook: impl Fn(&Object, &mut World) + 'static) -> Self {
        Self(Rc::new(hook))
    }

    pub fn call(&self, particle: &Object, world: &mut World) {
        (self.0)(particle, world)
    }
}

impl fmt::Debug for ParticleDestroyHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParticleDestroyHook(..)")
    }
}

impl PartialEq for ParticleDestroyHook {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Emitter settings and the per-particle template.
///
/// Every `*_a` / `*_b` colour pair is blended with a fresh random weight per
/// particle; start and end colours are then interpolated over the
/// particle's lifetime. Speeds are in units (or radians) per second.
#[derive(Clone, Debug, PartialEq)]
pub struct EmitterDesc {
    pub emit_shape: EmitShape,
    /// Seconds of emission; `0` emits until the emitter is destroyed.
    pub emit_time: f32,
    /// Particles per second.
    pub emit_rate: f32,
    /// Half-angle of the spread of launch directions around the emitter angle.
    pub emit_cone_angle: f32,
    pub tile: Option<TileInfo>,
    pub color_start_a: Color,
    pub color_start_b: Color,
    pub color_end_a: Color,
    pub color_end_b: Color,
    /// Blend colour pairs with one weight (`true`) or one weight per channel.
    pub random_color_linear: bool,
    /// Particle lifetime in seconds.
    pub particle_time: f32,
    pub size_start: f32,
    pub size_end: f32,
    pub speed: f32,
    pub angle_speed: f32,
    pub damping: f32,
    pub angle_damping: f32,
    pub gravity_scale: f32,
    /// Half-angle of the spread of each particle's initial rotation.
    pub particle_cone_angle: f32,
    pub fade_rate: f32,
    /// Stretch each particle along its velocity by `speed * trail_scale` when
    /// drawn; `0` disables trails.
    pub trail_scale: f32,
    /// Relative jitter applied to lifetime, sizes, speed and angle speed.
    pub randomness: f32,
    pub collide_tiles: bool,
    pub impact: ParticleImpact,
    pub elasticity: f32,
    pub friction: f32,
    pub additive: bool,
    pub random_mirror: bool,
    pub render_order: i32,
    pub on_particle_destroy: Option<ParticleDestroyHook>,
}

impl Default for EmitterDesc {
    fn default() -> Self {
        Self {
            emit_shape: EmitShape::Box(Vec2::ZERO),
            emit_time: 0.0,
            emit_rate: 100.0,
            emit_cone_angle: PI,
            tile: None,
            color_start_a: Color::WHITE,
            color_start_b: Color::WHITE,
            color_end_a: Color::WHITE.with_alpha(0.0),
            color_end_b: Color::WHITE.with_alpha(0.0),
            random_color_linear: true,
            particle_time: 0.5,
            size_start: 0.1,
            size_end: 1.0,
            speed: 6.0,
            angle_speed: 3.0,
            damping: 1.0,
            angle_damping: 1.0,
            gravity_scale: 0.0,
            particle_cone_angle: PI,
            fade_rate: 0.1,
            trail_scale: 0.0,
            randomness: 0.2,
            collide_tiles: false,
            impact: ParticleImpact::Bounce,
            elasticity: 0.0,
            friction: 0.8,
            additive: false,
            random_mirror: true,
            render_order: 0,
            on_particle_destroy: None,
        }
    }
}

impl EmitterDesc {
    #[must_use]
    pub fn with_emission(mut self, emit_time: f32, emit_rate: f32) -> Self {
        self.emit_time = emit_time;
        self.emit_rate = emit_rate;
        self
    }

    #[must_use]
    pub fn with_shape(mut self, shape: EmitShape) -> Self {
        self.emit_shape = shape;
        self
    }

    #[must_use]
    pub fn with_cone(mut self, emit_cone_angle: f32) -> Self {
        self.emit_cone_angle = emit_cone_angle;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, start: (Color, Color), end: (Color, Color)) -> Self {
        self.color_start_a = start.0;
        self.color_start_b = start.1;
        self.color_end_a = end.0;
        self.color_end_b = end.1;
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, particle_time: f32) -> Self {
        self.particle_time = particle_time;
        self
    }

    #[must_use]
    pub fn with_sizes(mut self, size_start: f32, size_end: f32) -> Self {
        self.size_start = size_start;
        self.size_end = size_end;
        self
    }

    #[must_use]
    pub fn with_speeds(mut self, speed: f32, angle_speed: f32) -> Self {
        self.speed = speed;
        self.angle_speed = angle_speed;
        self
    }

    #[must_use]
    pub fn with_damping(mut self, damping: f32, angle_damping: f32) -> Self {
        self.damping = damping;
        self.angle_damping = angle_damping;
        self
    }

    #[must_use]
    pub fn with_gravity_scale(mut self, gravity_scale: f32) -> Self {
        self.gravity_scale = gravity_scale;
        self
    }

    #[must_use]
    pub fn with_randomness(mut self, randomness: f32) -> Self {
        self.randomness = randomness;
        self
    }

    /// Enable tile collision for particles with the given impact policy.
    #[must_use]
    pub fn with_tile_collision(mut self, impact: ParticleImpact, elasticity: f32, friction: f32) -> Self {
        self.collide_tiles = true;
        self.impact = impact;
        self.elasticity = elasticity;
        self.friction = friction;
        self
    }

    #[must_use]
    pub fn with_additive(mut self, additive: bool) -> Self {
        self.additive = additive;
        self
    }

    #[must_use]
    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }

    #[must_use]
    pub fn with_trail(mut self, trail_scale: f32) -> Self {
        self.trail_scale = trail_scale;
        self
    }

    /// Run `hook` whenever one of this emitter's particles is destroyed.
    #[must_use]
    pub fn with_particle_destroy(mut self, hook: impl Fn(&Object, &mut World) + 'static) -> Self {
        self.on_particle_destroy = Some(ParticleDestroyHook::new(hook));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitterState {
    /// Emitting, either inside `emit_time` or forever.
    Active,
    /// Emission window closed; waiting for live particles to expire.
    Draining,
    /// The emitter object has been destroyed.
    Destroyed,
}

/// Behavior of an emitter object.
#[derive(Debug)]
pub struct ParticleEmitter {
    desc: EmitterDesc,
    state: EmitterState,
    elapsed: f32,
    emit_accumulator: f32,
    particles: Vec<ObjectId>,
    emitted: usize,
}

impl ParticleEmitter {
    pub fn new(desc: EmitterDesc) -> Self {
        Self {
            desc,
            state: EmitterState::Active,
            elapsed: 0.0,
            emit_accumulator: 0.0,
            particles: Vec::new(),
            emitted: 0,
        }
    }

    /// Spawn an emitter object at `position`, launching particles around
    /// `angle`. The emitter itself is a point that ignores collisions and
    /// gravity; attach it to another object to carry it around.
    pub fn spawn(world: &mut World, position: Vec2, angle: f32, desc: EmitterDesc) -> ObjectId {
        let object = ObjectDesc::new(position, Vec2::ZERO)
            .with_angle(angle)
            .with_damping(1.0)
            .with_angle_damping(1.0)
            .with_gravity_scale(0.0)
            .with_render_order(desc.render_order);
        world.spawn_with(object, Self::new(desc))
    }

    /// Emit one particle from the emitter `id` right now, regardless of its
    /// rate or state.
    pub fn emit(world: &mut World, id: ObjectId) -> Option<ObjectId> {
        world
            .with_behavior_as::<ParticleEmitter, _>(id, |emitter, world| {
                emitter.emit_particle(id, world)
            })
            .flatten()
    }

    pub fn desc(&self) -> &EmitterDesc {
        &self.desc
    }

    pub fn desc_mut(&mut self) -> &mut EmitterDesc {
        &mut self.desc
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Total particles spawned so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Particles spawned by this emitter that were still alive at its last update.
    pub fn live_particles(&self) -> &[ObjectId] {
        &self.particles
    }

    /// Spawn one particle from the emitter object `id`.
    pub fn emit_particle(&mut self, id: ObjectId, world: &mut World) -> Option<ObjectId> {
        let (origin, emitter_angle) = {
            let object = world.get(id)?;
            (object.position, object.angle)
        };
        let d = &self.desc;
        let now = world.time();
        let rng = world.rng_mut();
        let mut rand_range = |lo: f32, hi: f32| lo + (hi - lo) * rng.f32();

        let offset = match d.emit_shape {
            EmitShape::Box(size) => Vec2::new(rand_range(-0.5, 0.5), rand_range(-0.5, 0.5))
                .mul_components(size)
                .rotate(emitter_angle),
            EmitShape::Circle(diameter) => {
                let radius = diameter * 0.5 * rand_range(0.0, 1.0).sqrt();
                Vec2::from_angle(rand_range(0.0, 2.0 * PI)) * radius
            }
        };
        let angle = emitter_angle + rand_range(-d.particle_cone_angle, d.particle_cone_angle);

        let r = d.randomness;
        let mut randomize = |v: f32| v + v * rand_range(-r, r);
        let lifetime = randomize(d.particle_time).max(0.0);
        let size_start = randomize(d.size_start).max(0.0);
        let size_end = randomize(d.size_end).max(0.0);
        let speed = randomize(d.speed);
        let angle_speed = randomize(d.angle_speed);

        let rng = world.rng_mut();
        let spin_sign = if rng.bool() { 1.0 } else { -1.0 };
        let color_start = random_color(rng, d.color_start_a, d.color_start_b, d.random_color_linear);
        let color_end = random_color(rng, d.color_end_a, d.color_end_b, d.random_color_linear);
        let cone = d.emit_cone_angle * (rng.f32() * 2.0 - 1.0);
        let mirror = d.random_mirror && rng.bool();

        let collision_size = if d.collide_tiles {
            Vec2::splat(size_start)
        } else {
            Vec2::ZERO
        };
        let mut object = ObjectDesc::new(origin + offset, collision_size)
            .with_angle(angle)
            .with_mirror(mirror)
            .with_velocity(Vec2::from_angle(emitter_angle + cone) * speed)
            .with_angle_velocity(angle_speed * spin_sign)
            .with_damping(d.damping)
            .with_angle_damping(d.angle_damping)
            .with_gravity_scale(d.gravity_scale)
            .with_elasticity(d.elasticity)
            .with_friction(d.friction)
            .with_collision(d.collide_tiles, false, false)
            .with_render_order(d.render_order)
            .with_color(color_start);
        object.visual.tile = d.tile;
        object.visual.additive_blend = d.additive;
        object.visual.fade_rate = d.fade_rate;
        object.visual.draw_size = Some(Vec2::splat(size_start));

        let particle = Particle {
            lifetime: Timer::new(now, f64::from(lifetime)),
            color_start,
            color_end,
            size_start,
            size_end,
            trail_scale: d.trail_scale,
            impact: d.impact,
            destroy_hook: d.on_particle_destroy.clone(),
        };
        let particle_id = world.spawn_with(object, particle);
        self.particles.push(particle_id);
        self.emitted += 1;
        Some(particle_id)
    }

    fn set_state(&mut self, id: ObjectId, state: EmitterState) {
        if self.state != state {
            log::debug!("Emitter {:?}: {:?} -> {:?}", id, self.state, state);
            self.state = state;
        }
    }
}

impl Behavior for ParticleEmitter {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let dt = world.delta_time();
        self.particles.retain(|&p| world.is_alive(p));

        if self.state == EmitterState::Active {
            let window = if self.desc.emit_time > 0.0 {
                (self.desc.emit_time - self.elapsed).clamp(0.0, dt)
            } else {
                dt
            };
            self.elapsed += dt;
            if self.desc.emit_rate > 0.0 {
                self.emit_accumulator += self.desc.emit_rate * window;
                // Tolerate float drift so whole particles are not lost.
                while self.emit_accumulator >= 1.0 - 1e-3 {
                    self.emit_accumulator -= 1.0;
                    if self.emit_particle(id, world).is_none() {
                        break;
                    }
                }
            }
            if self.desc.emit_time > 0.0 && self.elapsed + 1e-6 >= self.desc.emit_time {
                self.set_state(id, EmitterState::Draining);
            }
        }

        if self.state == EmitterState::Draining && self.particles.is_empty() {
            self.set_state(id, EmitterState::Destroyed);
            world.destroy(id);
            return;
        }

        if world.config().debug.particles {
            if let Some(object) = world.get(id) {
                let (center, color) = (object.position, Color::new(1.0, 0.5, 0.0, 0.5));
                let now = world.time();
                world.debug_draw.circle(now, center, 0.1, color, false, 0.0);
            }
        }
    }

    fn on_destroy(&mut self, object: &Object, _world: &mut World) {
        if self.state != EmitterState::Destroyed {
            self.set_state(object.id(), EmitterState::Destroyed);
        }
    }
}

/// Behavior of a single particle.
#[derive(Clone, Debug)]
pub struct Particle {
    lifetime: Timer,
    color_start: Color,
    color_end: Color,
    size_start: f32,
    size_end: f32,
    trail_scale: f32,
    impact: ParticleImpact,
    destroy_hook: Option<ParticleDestroyHook>,
}

impl Particle {
    pub fn lifetime(&self) -> &Timer {
        &self.lifetime
    }

    pub fn colors(&self) -> (Color, Color) {
        (self.color_start, self.color_end)
    }

    pub fn sizes(&self) -> (f32, f32) {
        (self.size_start, self.size_end)
    }
}

impl Behavior for Particle {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let now = world.time();
        let p = self.lifetime.percent(now);
        let color = self.color_start.lerp(self.color_end, p);
        let size = lerp(self.size_start, self.size_end, p).max(0.0);
        if let Some(object) = world.get_mut(id) {
            object.visual.color = color;
            let mut draw_size = Vec2::splat(size);
            let speed = object.velocity.length();
            if self.trail_scale > 0.0 && speed > 0.0 {
                // Head stays on the particle, the trail streams out behind it.
                let direction = object.velocity / speed;
                let trail = speed * self.trail_scale;
                draw_size.x = size.max(trail);
                object.visual.draw_angle = Some(direction.angle());
                object.visual.draw_offset = direction * (-0.5 * trail);
            } else {
                object.visual.draw_angle = None;
                object.visual.draw_offset = Vec2::ZERO;
            }
            object.visual.draw_size = Some(draw_size);
        }
        if self.lifetime.elapsed(now) {
            world.destroy(id);
        }
    }

    fn collide_with_tile(
        &mut self,
        id: ObjectId,
        code: i32,
        _coord: GridCoord,
        world: &mut World,
    ) -> CollisionResponse {
        if code > 0 && self.impact == ParticleImpact::Destroy {
            world.destroy(id);
            return CollisionResponse::Handled;
        }
        default_tile_response(code)
    }

    fn on_destroy(&mut self, object: &Object, world: &mut World) {
        if let Some(hook) = &self.destroy_hook {
            hook.call(object, world);
        }
    }
}

fn random_color(rng: &mut fastrand::Rng, a: Color, b: Color, linear: bool) -> Color {
    if linear {
        a.lerp(b, rng.f32())
    } else {
        a.lerp_channels(b, [rng.f32(), rng.f32(), rng.f32(), rng.f32()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::tile_collision::TileCollisionMap;

    fn world() -> World {
        let config = SimulationConfig::default().with_gravity(0.0).with_seed(42);
        World::new(config, TileCollisionMap::new(8, 8, 1.0))
    }

    #[test]
    fn perpetual_emitter_stays_active() {
        let mut w = world();
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.0, 4.0),
            0.0,
            EmitterDesc::default().with_emission(0.0, 20.0).with_lifetime(0.1),
        );
        for _ in 0..40 {
            w.step(0.05);
        }
        let emitter = w.behavior::<ParticleEmitter>(id).unwrap();
        assert_eq!(emitter.state(), EmitterState::Active);
        assert!((emitter.emitted() as i32 - 40).abs() <= 1);
    }

    #[test]
    fn particles_interpolate_color_and_size() {
        let mut w = world();
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.0, 4.0),
            0.0,
            EmitterDesc::default()
                .with_emission(0.0, 0.0)
                .with_lifetime(1.0)
                .with_sizes(1.0, 3.0)
                .with_randomness(0.0)
                .with_colors(
                    (Color::BLACK, Color::BLACK),
                    (Color::WHITE, Color::WHITE),
                ),
        );
        let p = ParticleEmitter::emit(&mut w, id).unwrap();
        for _ in 0..10 {
            w.step(0.05);
        }
        let object = w.get(p).unwrap();
        assert!((object.visual.draw_size.unwrap().x - 2.0).abs() < 1e-3);
        assert!((object.visual.color.r - 0.5).abs() < 1e-3);
        assert_eq!(object.size, Vec2::ZERO);
    }

    #[test]
    fn zero_randomness_launches_along_cone() {
        let mut w = world();
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.0, 4.0),
            0.0,
            EmitterDesc::default()
                .with_emission(0.0, 0.0)
                .with_cone(0.0)
                .with_speeds(2.0, 0.0)
                .with_randomness(0.0),
        );
        let p = ParticleEmitter::emit(&mut w, id).unwrap();
        assert_eq!(w.get(p).unwrap().velocity, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn destroy_on_impact_removes_particle() {
        let mut tiles = TileCollisionMap::new(8, 8, 1.0);
        tiles.set_collision_data(Vec2::new(5.5, 4.5), 1);
        let mut w = World::new(SimulationConfig::default().with_gravity(0.0).with_seed(3), tiles);
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.5, 4.5),
            0.0,
            EmitterDesc::default()
                .with_emission(0.0, 0.0)
                .with_cone(0.0)
                .with_speeds(10.0, 0.0)
                .with_lifetime(5.0)
                .with_randomness(0.0)
                .with_tile_collision(ParticleImpact::Destroy, 0.0, 0.0),
        );
        let p = ParticleEmitter::emit(&mut w, id).unwrap();
        for _ in 0..5 {
            w.step(0.05);
        }
        assert!(w.is_destroyed(p));
    }

    #[test]
    fn same_seed_same_particles() {
        let run = || {
            let mut w = world();
            let id = ParticleEmitter::spawn(&mut w, Vec2::new(4.0, 4.0), 0.0, EmitterDesc::default());
            w.step(0.05);
            let emitter = w.behavior::<ParticleEmitter>(id).unwrap();
            emitter
                .live_particles()
                .iter()
                .map(|&p| w.get(p).unwrap().velocity)
                .collect::<Vec<_>>()
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }

    #[test]
    fn trails_stretch_along_velocity() {
        let mut w = world();
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.0, 4.0),
            0.0,
            EmitterDesc::default()
                .with_emission(0.0, 0.0)
                .with_cone(0.0)
                .with_speeds(4.0, 0.0)
                .with_sizes(0.1, 0.1)
                .with_randomness(0.0)
                .with_trail(0.5),
        );
        let p = ParticleEmitter::emit(&mut w, id).unwrap();
        w.step(0.05);
        let object = w.get(p).unwrap();
        let draw_size = object.visual.draw_size.unwrap();
        assert!((draw_size.x - 2.0).abs() < 1e-5);
        assert!((draw_size.y - 0.1).abs() < 1e-6);
        assert_eq!(object.visual.draw_angle, Some(0.0));
        assert!((object.visual.draw_offset.x + 1.0).abs() < 1e-5);

        let item = w.render_items().into_iter().find(|i| i.id == p).unwrap();
        assert!((item.position.x - (object.position.x - 1.0)).abs() < 1e-5);
    }

    #[test]
    fn destroy_hook_sees_each_particle_once() {
        use std::cell::RefCell;

        let mut w = world();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let id = ParticleEmitter::spawn(
            &mut w,
            Vec2::new(4.0, 4.0),
            0.0,
            EmitterDesc::default()
                .with_emission(0.0, 0.0)
                .with_lifetime(0.2)
                .with_randomness(0.0)
                .with_particle_destroy(move |particle, world| {
                    log.borrow_mut().push(particle.id());
                    // Leave a marker where the particle died.
                    world.spawn(ObjectDesc::new(particle.position, Vec2::ZERO).with_gravity_scale(0.0));
                }),
        );
        let p = ParticleEmitter::emit(&mut w, id).unwrap();
        let before = w.len();
        for _ in 0..10 {
            w.step(0.05);
        }
        assert!(w.is_destroyed(p));
        assert_eq!(*seen.borrow(), vec![p]);
        // Particle gone, marker added.
        assert_eq!(w.len(), before);
    }
}
