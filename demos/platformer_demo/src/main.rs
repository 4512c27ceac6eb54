//! Headless platformer scene: a player with a weapon shoots at crates,
//! enemies and breakable tiles, then throws a grenade. Prints what happened.

use std::cell::Cell;
use std::f32::consts::PI;
use std::ops::ControlFlow;
use std::rc::Rc;

use anyhow::Result;
use tileforge::{
    Aabb, Behavior, Color, EmitShape, EmitterDesc, GridCoord, Object, ObjectDesc, ObjectId,
    ParticleEmitter, ParticleImpact, SimulationConfig, TileCollisionMap, TileLevel, Timer, Vec2,
    World,
};

const LEVEL_WIDTH: usize = 48;
const LEVEL_HEIGHT: usize = 16;
const SOLID: i32 = 1;
const BREAKABLE: i32 = 2;
const DECORATION: i32 = -1;

#[derive(Default)]
struct Stats {
    bullets: usize,
    crates_destroyed: usize,
    tiles_destroyed: usize,
}

/// Anything bullets and explosions can hurt.
struct Health {
    hp: f32,
    damage_timer: Timer,
}

impl Health {
    fn new(hp: f32) -> Self {
        Self {
            hp,
            damage_timer: Timer::default(),
        }
    }

    /// Returns true when this hit was fatal.
    fn take(&mut self, amount: f32, now: f64) -> bool {
        if self.hp <= 0.0 {
            return false;
        }
        self.damage_timer.set(now, 0.15);
        self.hp = (self.hp - amount).max(0.0);
        self.hp <= 0.0
    }
}

struct CrateBox {
    health: Health,
}

impl Behavior for CrateBox {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let now = world.time();
        let flash = if self.health.damage_timer.active(now) { 0.5 } else { 0.0 };
        let fell_out = match world.get_mut(id) {
            Some(o) => {
                o.visual.additive_color = Color::new(flash, flash, flash, 0.0);
                o.position.y < -9.0
            }
            None => false,
        };
        if fell_out {
            world.destroy(id);
        }
    }

    fn on_destroy(&mut self, object: &Object, world: &mut World) {
        make_debris(world, object, 100.0);
    }
}

fn make_debris(world: &mut World, object: &Object, amount: f32) {
    let debris = EmitterDesc::default()
        .with_emission(0.1, amount)
        .with_shape(EmitShape::Box(object.size))
        .with_colors(
            (object.visual.color, object.visual.color),
            (object.visual.color.with_alpha(0.0), object.visual.color.with_alpha(0.0)),
        )
        .with_lifetime(1.0)
        .with_sizes(0.1, 0.0)
        .with_speeds(12.0, 3.0)
        .with_gravity_scale(1.0)
        .with_tile_collision(ParticleImpact::Bounce, 0.3, 0.9);
    ParticleEmitter::spawn(world, object.position, 0.0, debris);
}

struct Player {
    health: Health,
}

impl Behavior for Player {}

/// Hops around near the player and hurts it on contact.
struct Enemy {
    health: Health,
    player: ObjectId,
}

impl Behavior for Enemy {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let Some(me) = world.get(id).map(|o| Aabb::from_center_size(o.position, o.size)) else {
            return;
        };
        let Some(player) = world
            .get(self.player)
            .map(|o| Aabb::from_center_size(o.position, o.size))
        else {
            return;
        };

        let dt = world.delta_time();
        let near = me.center().distance(player.center()) < 20.0;
        if world.ground_object(id).is_some() && near && world.rng_mut().f32() < 0.6 * dt {
            let rng = world.rng_mut();
            let jump = Vec2::new(rng.f32() * 12.0 - 6.0, 12.0 + rng.f32() * 12.0);
            if let Some(o) = world.get_mut(id) {
                o.velocity = jump;
            }
        }

        if me.overlaps(&player) {
            let now = world.time();
            world.with_behavior_as::<Player, _>(self.player, |p, _| {
                if !p.health.damage_timer.active(now) {
                    p.health.take(1.0, now);
                }
            });
        }
    }

    fn on_destroy(&mut self, object: &Object, world: &mut World) {
        make_debris(world, object, 300.0);
    }
}

/// Damage whatever kind `id` is. Returns true if it died and was destroyed.
fn hurt(world: &mut World, id: ObjectId, amount: f32) -> bool {
    let now = world.time();
    let fatal = world
        .with_behavior_as::<CrateBox, _>(id, |c, _| c.health.take(amount, now))
        .or_else(|| world.with_behavior_as::<Enemy, _>(id, |e, _| e.health.take(amount, now)))
        .unwrap_or(false);
    if fatal {
        world.destroy(id);
    }
    fatal
}

struct Bullet {
    attacker: ObjectId,
    damage: f32,
    range: f32,
}

impl Bullet {
    fn kill(&self, id: ObjectId, world: &mut World) {
        let Some(o) = world.get(id) else {
            return;
        };
        let (position, heading) = (o.position, o.velocity.angle());
        world.destroy(id);

        let sparks = EmitterDesc::default()
            .with_emission(0.1, 100.0)
            .with_cone(0.5)
            .with_colors(
                (Color::rgb(1.0, 1.0, 0.0), Color::rgb(1.0, 0.0, 0.0)),
                (Color::rgb(1.0, 1.0, 0.0), Color::rgb(1.0, 0.0, 0.0)),
            )
            .with_lifetime(0.2)
            .with_sizes(0.2, 0.0)
            .with_speeds(6.0, 6.0)
            .with_gravity_scale(0.5)
            .with_randomness(0.5)
            .with_tile_collision(ParticleImpact::Bounce, 0.3, 0.8)
            .with_trail(1.0)
            .with_additive(true);
        ParticleEmitter::spawn(world, position, heading + PI, sparks);
    }
}

impl Behavior for Bullet {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let dt = world.delta_time();
        let Some((position, velocity)) = world.get(id).map(|o| (o.position, o.velocity)) else {
            return;
        };

        // Bullets are points, so tiles are found by marching the last step.
        let previous = position - velocity * dt;
        if let Some(hit) = world.raycast_traced(previous, position) {
            let inside = hit + velocity.normalized() * 1e-3;
            if world.collision_data_at(inside) == BREAKABLE && world.destroy_tile(inside) {
                log::debug!("Bullet {:?} broke a tile", id);
            }
            self.kill(id, world);
            return;
        }

        let mut victims = Vec::new();
        world.for_each_in_region(position, Vec2::splat(0.05), |o| {
            if o.id() != self.attacker && o.id() != id && o.is_solid {
                victims.push(o.id());
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        if let Some(&victim) = victims.first() {
            if let Some(o) = world.get_mut(victim) {
                o.apply_impulse(velocity * 0.1);
            }
            hurt(world, victim, self.damage);
            self.kill(id, world);
            return;
        }

        if let Some(o) = world.get_mut(id) {
            o.angle = velocity.angle();
        }
        self.range -= velocity.length() * dt;
        if self.range < 0.0 {
            self.kill(id, world);
        }
    }
}

struct Weapon {
    fire_rate: f32,
    bullet_speed: f32,
    bullet_spread: f32,
    fire_time_buffer: f32,
    recoil: Timer,
    trigger: bool,
    shell_emitter: ObjectId,
    fired: usize,
}

impl Behavior for Weapon {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let now = world.time();
        let dt = world.delta_time();
        let Some(weapon) = world.get(id) else {
            return;
        };
        let Some(owner) = weapon.parent() else {
            return;
        };
        let (position, local_offset, mut local_angle) =
            (weapon.position, weapon.local_offset(), weapon.local_angle());
        let mirror = world.get(owner).map_or(false, |o| o.mirror);

        if self.recoil.active(now) {
            local_angle *= 1.0 - self.recoil.percent(now);
        }

        self.fire_time_buffer += dt;
        if self.trigger {
            while self.fire_time_buffer > 0.0 {
                self.fire_time_buffer -= 1.0 / self.fire_rate;
                local_angle = 0.15 + world.rng_mut().f32() * 0.05;
                self.recoil.set(now, 0.4);

                let facing = if mirror { -1.0 } else { 1.0 };
                let spread = (world.rng_mut().f32() * 2.0 - 1.0) * self.bullet_spread;
                let velocity = Vec2::new(facing * self.bullet_speed, 0.0).rotate(spread);
                world.spawn_with(
                    ObjectDesc::new(position, Vec2::ZERO)
                        .with_velocity(velocity)
                        .with_damping(1.0)
                        .with_gravity_scale(0.0)
                        .with_render_order(100)
                        .with_color(Color::rgb(1.0, 1.0, 0.0)),
                    Bullet {
                        attacker: owner,
                        damage: 1.0,
                        range: 20.0,
                    },
                );
                self.fired += 1;

                world.set_local_transform(self.shell_emitter, Vec2::ZERO, 0.8);
                ParticleEmitter::emit(world, self.shell_emitter);
            }
        } else {
            self.fire_time_buffer = self.fire_time_buffer.min(0.0);
        }

        if let Some(o) = world.get_mut(id) {
            o.mirror = mirror;
        }
        world.set_local_transform(id, local_offset, local_angle);
    }
}

struct Grenade {
    beep: Timer,
}

impl Behavior for Grenade {
    fn update(&mut self, id: ObjectId, world: &mut World) {
        let now = world.time();
        let Some(alive) = world.get(id).map(|o| o.alive_time(now)) else {
            return;
        };
        if alive > 3.0 {
            explode(world, id);
        } else if self.beep.elapsed(now) {
            log::debug!("Grenade {:?} beep", id);
            self.beep.set(now, 1.0);
        }
    }
}

fn explode(world: &mut World, grenade: ObjectId) {
    let Some(center) = world.get(grenade).map(|o| o.position) else {
        return;
    };
    world.destroy(grenade);

    let radius = 3.0;
    let mut cells = Vec::new();
    let cs = world.tile_map().cell_size();
    let lo = world.tile_map().grid().world_to_grid(center - Vec2::splat(radius));
    let hi = world.tile_map().grid().world_to_grid(center + Vec2::splat(radius));
    for y in lo.y..=hi.y {
        for x in lo.x..=hi.x {
            let cell_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) * cs;
            if cell_center.distance(center) <= radius
                && world.tile_map().collision_data_at_cell(GridCoord::new(x, y)) == BREAKABLE
            {
                cells.push(cell_center);
            }
        }
    }
    for cell in cells {
        world.destroy_tile(cell);
    }

    for id in world.objects_in_region(center, Vec2::splat(radius)) {
        let Some(o) = world.get_mut(id) else {
            continue;
        };
        let away = o.position - center;
        let distance = away.length();
        if distance > radius {
            continue;
        }
        let strength = 1.0 - distance / radius;
        o.velocity += away.normalized() * (20.0 * strength);
        hurt(world, id, 10.0 * strength);
    }

    let flash = EmitterDesc::default()
        .with_emission(0.1, 200.0)
        .with_shape(EmitShape::Circle(radius))
        .with_colors(
            (Color::rgb(1.0, 0.5, 0.1), Color::rgb(1.0, 0.1, 0.1)),
            (Color::new(1.0, 0.5, 0.1, 0.0), Color::new(1.0, 0.1, 0.1, 0.0)),
        )
        .with_lifetime(0.5)
        .with_sizes(1.0, 2.0)
        .with_speeds(1.0, 3.0)
        .with_additive(true);
    ParticleEmitter::spawn(world, center, 0.0, flash);
}

fn build_level() -> Result<TileCollisionMap> {
    let mut codes = vec![0; LEVEL_WIDTH * LEVEL_HEIGHT];
    let mut put = |x: usize, y: usize, code: i32| codes[y * LEVEL_WIDTH + x] = code;
    for x in 0..LEVEL_WIDTH {
        put(x, 0, SOLID);
        put(x, 1, SOLID);
    }
    for y in 2..8 {
        put(30, y, BREAKABLE);
        put(LEVEL_WIDTH - 1, y, SOLID);
    }
    for x in 10..14 {
        put(x, 5, BREAKABLE);
    }
    put(6, 2, DECORATION);

    // Round-trip through the on-disk format.
    let level = TileLevel {
        width: LEVEL_WIDTH,
        height: LEVEL_HEIGHT,
        cell_size: 1.0,
        codes,
    };
    let json = serde_json::to_string(&level)?;
    TileCollisionMap::from_level(TileLevel::from_json(&json)?)
}

fn main() -> Result<()> {
    let config = SimulationConfig::from_json(r#"{ "gravity": 20.0, "seed": 1234 }"#)?;
    let mut world = World::new(config, build_level()?);
    let mut stats = Stats::default();

    let player = world.spawn_with(
        ObjectDesc::new(Vec2::new(4.0, 3.0), Vec2::new(0.8, 1.8))
            .with_collision(true, true, true)
            .with_render_order(10),
        Player {
            health: Health::new(10.0),
        },
    );

    // Spent shells stay behind as inert casings.
    let casings = Rc::new(Cell::new(0usize));
    let casing_count = casings.clone();

    let shells = EmitterDesc::default()
        .with_emission(0.0, 0.0)
        .with_cone(0.1)
        .with_colors(
            (Color::rgb(1.0, 0.8, 0.5), Color::rgb(0.9, 0.7, 0.5)),
            (Color::rgb(1.0, 0.8, 0.5), Color::rgb(0.9, 0.7, 0.5)),
        )
        .with_lifetime(3.0)
        .with_sizes(0.1, 0.1)
        .with_speeds(9.0, 6.0)
        .with_damping(1.0, 0.95)
        .with_gravity_scale(1.0)
        .with_randomness(0.1)
        .with_tile_collision(ParticleImpact::Bounce, 0.5, 0.9)
        .with_particle_destroy(move |shell, world| {
            let mut casing = ObjectDesc::new(shell.position, Vec2::ZERO)
                .with_angle(shell.angle)
                .with_gravity_scale(0.0)
                .with_collision(false, false, false)
                .with_render_order(shell.render_order)
                .with_color(shell.visual.color);
            casing.visual.draw_size = shell.visual.draw_size;
            world.spawn(casing);
            casing_count.set(casing_count.get() + 1);
        });
    let weapon_position = world.get(player).map_or(Vec2::ZERO, |o| o.position);
    let shell_emitter = ParticleEmitter::spawn(&mut world, weapon_position, 0.0, shells);
    let weapon = world.spawn(
        ObjectDesc::new(weapon_position, Vec2::splat(0.6)).with_render_order(11),
    );
    world.set_behavior(
        weapon,
        Box::new(Weapon {
            fire_rate: 8.0,
            bullet_speed: 30.0,
            bullet_spread: 0.1,
            fire_time_buffer: 0.0,
            recoil: Timer::default(),
            trigger: false,
            shell_emitter,
            fired: 0,
        }),
    )?;
    world.add_child(player, weapon, Vec2::new(0.6, 0.0))?;
    world.add_child(weapon, shell_emitter, Vec2::ZERO)?;

    for i in 0..5 {
        world.spawn_with(
            ObjectDesc::new(Vec2::new(18.0 + i as f32 * 2.0, 3.0 + (i % 2) as f32), Vec2::ONE)
                .with_angle((i % 4) as f32 * PI / 2.0)
                .with_collision(true, true, true)
                .with_color(Color::rgb(0.4 + 0.1 * i as f32, 0.8, 0.6)),
            CrateBox {
                health: Health::new(5.0),
            },
        );
    }

    let mut enemies = Vec::new();
    for (i, x) in [24.0, 27.0, 36.0].into_iter().enumerate() {
        let hue = 0.3 * i as f32;
        enemies.push(world.spawn_with(
            ObjectDesc::new(Vec2::new(x, 3.0), Vec2::splat(0.9))
                .with_collision(true, true, true)
                .with_color(Color::rgb(1.0 - hue, 0.7, 0.4 + hue)),
            Enemy {
                health: Health::new(5.0),
                player,
            },
        ));
    }

    let dt = 1.0 / 60.0;
    let mut grenade = None;
    for frame in 0..(60 * 8) {
        let trigger = (60..300).contains(&frame);
        world.with_behavior_as::<Weapon, _>(weapon, |w, _| w.trigger = trigger);

        if frame == 320 {
            let from = world.get(player).map_or(Vec2::ZERO, |o| o.position);
            grenade = Some(world.spawn_with(
                ObjectDesc::new(from + Vec2::new(0.5, 0.5), Vec2::splat(0.2))
                    .with_velocity(Vec2::new(9.0, 6.0))
                    .with_elasticity(0.3)
                    .with_friction(0.9)
                    .with_angle_damping(0.96)
                    .with_render_order(1_000)
                    .with_collision(true, true, false),
                Grenade {
                    beep: Timer::new(world.time(), 1.0),
                },
            ));
        }

        let crates_before = count_crates(&world);
        let tiles_before = count_breakable(&world);
        world.step(dt);
        stats.crates_destroyed += crates_before.saturating_sub(count_crates(&world));
        stats.tiles_destroyed += tiles_before.saturating_sub(count_breakable(&world));
    }

    stats.bullets = world
        .behavior::<Weapon>(weapon)
        .map_or(0, |w| w.fired);
    let grenade_exploded = grenade.map_or(false, |g| world.is_destroyed(g));
    let enemies_killed = enemies.iter().filter(|&&e| world.is_destroyed(e)).count();
    let player_hp = world
        .behavior::<Player>(player)
        .map_or(0.0, |p| p.health.hp);

    println!("Simulated {:.2}s in {} frames", world.time(), world.frame());
    println!("  bullets fired:     {}", stats.bullets);
    println!("  crates destroyed:  {}", stats.crates_destroyed);
    println!("  tiles destroyed:   {}", stats.tiles_destroyed);
    println!("  enemies killed:    {}", enemies_killed);
    println!("  player health:     {}", player_hp);
    println!("  shell casings:     {}", casings.get());
    println!("  grenade exploded:  {}", grenade_exploded);
    println!("  live objects:      {}", world.len());
    if let Some(ground) = world.ground_object(player) {
        println!("  player standing on {:?}", ground);
    }
    for item in world.render_items().iter().rev().take(3) {
        println!("  top draw: {:?} order {} at {:?}", item.id, item.render_order, item.position);
    }
    Ok(())
}

fn count_crates(world: &World) -> usize {
    world
        .objects()
        .filter(|o| world.behavior::<CrateBox>(o.id()).is_some())
        .count()
}

fn count_breakable(world: &World) -> usize {
    world
        .tile_map()
        .grid()
        .cells()
        .iter()
        .filter(|&&code| code == BREAKABLE)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_world() -> World {
        let config = SimulationConfig {
            gravity: 0.0,
            ..SimulationConfig::default()
        };
        World::new(config, TileCollisionMap::new(16, 16, 1.0))
    }

    #[test]
    fn enemy_contact_hurts_player_with_a_grace_period() {
        let mut world = open_world();
        let player = world.spawn_with(
            ObjectDesc::new(Vec2::new(4.0, 4.0), Vec2::new(0.8, 1.8)),
            Player {
                health: Health::new(10.0),
            },
        );
        world.spawn_with(
            ObjectDesc::new(Vec2::new(4.3, 4.0), Vec2::splat(0.9)),
            Enemy {
                health: Health::new(5.0),
                player,
            },
        );

        world.step(1.0 / 60.0);
        world.step(1.0 / 60.0);
        assert_eq!(world.behavior::<Player>(player).map(|p| p.health.hp), Some(9.0));
    }

    #[test]
    fn hurt_destroys_enemies_and_ignores_plain_objects() {
        let mut world = open_world();
        let player = world.spawn(ObjectDesc::new(Vec2::new(1.0, 1.0), Vec2::ONE));
        let enemy = world.spawn_with(
            ObjectDesc::new(Vec2::new(8.0, 8.0), Vec2::splat(0.9)),
            Enemy {
                health: Health::new(5.0),
                player,
            },
        );

        assert!(!hurt(&mut world, enemy, 2.0));
        assert!(hurt(&mut world, enemy, 3.0));
        assert!(world.is_destroyed(enemy));
        assert!(!hurt(&mut world, player, 100.0));
        assert!(!world.is_destroyed(player));
    }
}
