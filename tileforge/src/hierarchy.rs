//! Parent/child relationships between objects.
//!
//! Links are handles, never ownership. A child's transform is derived from
//! its parent every tick, so it is never stale.

use crate::math::Vec2;
use crate::object::{Object, ObjectId};
use crate::world::World;

/// World position and angle of a child attached to `parent`.
///
/// The offset is mirrored on X when the parent is mirrored and then rotated
/// by the parent's angle; the local angle flips sign with the mirror.
pub fn child_world_transform(parent: &Object, local_offset: Vec2, local_angle: f32) -> (Vec2, f32) {
    let sign = parent.mirror_sign();
    let offset = Vec2::new(local_offset.x * sign, local_offset.y).rotate(parent.angle);
    (parent.position + offset, parent.angle + sign * local_angle)
}

/// Get the parent of an object, if it has one.
pub fn get_parent(world: &World, id: ObjectId) -> Option<ObjectId> {
    world.objects.get(&id).and_then(|o| o.parent)
}

/// True if `ancestor` is `id` itself or appears on its parent chain.
pub fn is_ancestor_or_self(world: &World, ancestor: ObjectId, id: ObjectId) -> bool {
    let mut current = Some(id);
    while let Some(c) = current {
        if c == ancestor {
            return true;
        }
        current = get_parent(world, c);
    }
    false
}

/// `id` and all of its descendants, children before their parents.
pub fn subtree_post_order(world: &World, id: ObjectId) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut stack = vec![(id, false)];
    while let Some((current, expanded)) = stack.pop() {
        if expanded {
            out.push(current);
            continue;
        }
        stack.push((current, true));
        if let Some(object) = world.objects.get(&current) {
            for &child in object.children.iter().rev() {
                stack.push((child, false));
            }
        }
    }
    out
}
