//! Tileforge - the object simulation core of a small 2D arcade engine.
//!
//! A [`World`] owns every live object, integrates gravity and damping,
//! resolves collisions against a tile grid and against other solid objects,
//! and drives particle emitters. Gameplay kinds plug in through the
//! [`Behavior`] hooks. Drawing, input and audio live outside this crate;
//! they read [`World::render_items`] and the query methods.

pub mod behavior;
pub mod color;
pub mod config;
pub mod debug;
pub mod error;
pub mod grid;
pub mod hierarchy;
pub mod math;
pub mod object;
pub mod particles;
pub mod physics;
pub mod render;
pub mod spatial;
pub mod tile_collision;
pub mod timer;
pub mod world;

pub use crate::behavior::{default_tile_response, Behavior, CollisionResponse};
pub use crate::color::Color;
pub use crate::config::{DebugFlags, SimulationConfig};
pub use crate::debug::{DebugDraw, DebugOverlayEntry, DebugPrimitive, DebugShape, PickInfo};
pub use crate::error::SceneError;
pub use crate::grid::{CellRange, Grid, GridCoord};
pub use crate::math::{Aabb, Vec2};
pub use crate::object::{Ground, Object, ObjectDesc, ObjectId, TileInfo, Visual};
pub use crate::particles::{
    EmitShape, EmitterDesc, EmitterState, Particle, ParticleEmitter, ParticleImpact,
};
pub use crate::render::RenderItem;
pub use crate::spatial::SpatialIndex;
pub use crate::tile_collision::{TileCollisionMap, TileLevel};
pub use crate::timer::Timer;
pub use crate::world::World;
