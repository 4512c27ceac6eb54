//! Per-object behavior hooks.
//!
//! Gameplay kinds (crates, bullets, emitters, particles) are plain objects
//! plus a boxed [`Behavior`]. The world calls the hooks with the behavior
//! temporarily taken out of storage, so a hook gets `&mut World` and may
//! spawn, destroy or edit any object, including its own.

use std::any::Any;

use crate::grid::GridCoord;
use crate::object::{Object, ObjectId};
use crate::world::World;

/// Answer from a collision hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionResponse {
    /// Let the world separate the pair and apply bounce and friction.
    Resolve,
    /// The hook dealt with the contact; skip generic resolution for it.
    Handled,
}

/// Downcasting support for boxed behaviors. Implemented for every
/// `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Hooks a gameplay kind can override. All methods have defaults, so an
/// empty `impl Behavior for MyKind {}` is a valid inert behavior.
pub trait Behavior: AsAny {
    /// Called once per tick after the object's transform has been advanced.
    fn update(&mut self, _id: ObjectId, _world: &mut World) {}

    /// Called when this object's box overlaps a solid object it collides with.
    /// Both parties are asked; if either answers `Handled`, the pair is not
    /// separated.
    fn collide_with_object(
        &mut self,
        _id: ObjectId,
        _other: ObjectId,
        _world: &mut World,
    ) -> CollisionResponse {
        CollisionResponse::Resolve
    }

    /// Called for every non-empty tile cell the object's swept box enters.
    /// The default blocks on solid codes (`> 0`) only.
    fn collide_with_tile(
        &mut self,
        _id: ObjectId,
        code: i32,
        _coord: GridCoord,
        _world: &mut World,
    ) -> CollisionResponse {
        default_tile_response(code)
    }

    /// Called once when the object is removed, after its whole subtree has
    /// been marked destroyed. `object` is the final state of the object.
    fn on_destroy(&mut self, _object: &Object, _world: &mut World) {}
}

pub fn default_tile_response(code: i32) -> CollisionResponse {
    if code > 0 {
        CollisionResponse::Resolve
    } else {
        CollisionResponse::Handled
    }
}
