use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use crate::behavior::{AsAny, Behavior};
use crate::config::SimulationConfig;
use crate::debug::DebugDraw;
use crate::error::SceneError;
use crate::hierarchy;
use crate::math::{Aabb, Vec2};
use crate::object::{Ground, Object, ObjectDesc, ObjectId};
use crate::physics;
use crate::spatial::SpatialIndex;
use crate::tile_collision::TileCollisionMap;

/// Owner of every live object, the tile collision layer and the broad phase.
///
/// One world is one independent simulation:
/// - `spawn` / `destroy` objects (destruction cascades to children)
/// - `set_parent` to build hierarchies
/// - `step` to advance one tick
/// - read-only queries (`for_each_in_region`, `raycast`, `collision_data_at`)
///
/// Destruction is immediate for queries and iteration but storage is only
/// released by [`flush_destroyed`](Self::flush_destroyed), which `step` runs
/// at the end of every tick. Hooks may therefore destroy anything at any time.
pub struct World {
    pub(crate) config: SimulationConfig,
    next_id: u64,
    pub(crate) objects: HashMap<ObjectId, Object>,
    behaviors: HashMap<ObjectId, Box<dyn Behavior>>,
    /// Unparented objects in spawn order; this is the update order.
    roots: Vec<ObjectId>,
    pending_destroy: Vec<ObjectId>,
    last_update: HashMap<ObjectId, u64>,
    /// Object pairs already settled this tick: a hook answered `Handled` or
    /// neither side can move.
    pub(crate) contact_pairs: HashSet<(ObjectId, ObjectId)>,
    pub(crate) spatial: SpatialIndex,
    pub(crate) tiles: TileCollisionMap,
    rng: fastrand::Rng,
    time: f64,
    delta_time: f32,
    frame: u64,
    pub(crate) debug_draw: DebugDraw,
}

impl World {
    /// Create a world over a tile map. The random source is seeded from
    /// `config.seed` when present.
    pub fn new(config: SimulationConfig, tiles: TileCollisionMap) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self::with_rng(config, tiles, rng)
    }

    /// Create a world with an explicit random source.
    pub fn with_rng(mut config: SimulationConfig, tiles: TileCollisionMap, rng: fastrand::Rng) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("Invalid simulation config ({err}); using defaults for bad fields");
            let defaults = SimulationConfig::default();
            if !(config.max_dt > 0.0) {
                config.max_dt = defaults.max_dt;
            }
            if !(config.spatial_cell_size > 0.0) {
                config.spatial_cell_size = defaults.spatial_cell_size;
            }
            if !(config.max_speed > 0.0) {
                config.max_speed = defaults.max_speed;
            }
            if !config.gravity.is_finite() {
                config.gravity = defaults.gravity;
            }
        }

        Self {
            spatial: SpatialIndex::new(config.spatial_cell_size),
            config,
            next_id: 1,
            objects: HashMap::new(),
            behaviors: HashMap::new(),
            roots: Vec::new(),
            pending_destroy: Vec::new(),
            last_update: HashMap::new(),
            contact_pairs: HashSet::new(),
            tiles,
            rng,
            time: 0.0,
            delta_time: 0.0,
            frame: 0,
            debug_draw: DebugDraw::default(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    /// Simulation clock in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Step length of the current (or last) tick after clamping.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Number of ticks run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn rng_mut(&mut self) -> &mut fastrand::Rng {
        &mut self.rng
    }

    pub fn tile_map(&self) -> &TileCollisionMap {
        &self.tiles
    }

    pub fn tile_map_mut(&mut self) -> &mut TileCollisionMap {
        &mut self.tiles
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }

    // ------------------------------
    // Lifecycle
    // ------------------------------

    /// Spawn an object and return its handle.
    ///
    /// Out-of-range parameters are clamped (see [`ObjectDesc::sanitized`]);
    /// spawning never fails.
    pub fn spawn(&mut self, desc: ObjectDesc) -> ObjectId {
        let (desc, fixed) = desc.sanitized();
        if !fixed.is_empty() {
            log::warn!("Clamped invalid spawn parameters: {}", fixed.join(", "));
        }

        let id = ObjectId::from_raw(self.next_id);
        self.next_id += 1;

        let object = Object::from_desc(id, desc, self.time);
        self.spatial.insert(id, object.aabb());
        self.objects.insert(id, object);
        self.roots.push(id);
        log::trace!("Spawned {:?}", id);
        id
    }

    /// Spawn an object driven by `behavior`.
    pub fn spawn_with<B: Behavior>(&mut self, desc: ObjectDesc, behavior: B) -> ObjectId {
        let id = self.spawn(desc);
        self.behaviors.insert(id, Box::new(behavior));
        id
    }

    /// Replace (or set) the behavior of a live object.
    pub fn set_behavior(&mut self, id: ObjectId, behavior: Box<dyn Behavior>) -> Result<(), SceneError> {
        self.require_alive(id)?;
        self.behaviors.insert(id, behavior);
        Ok(())
    }

    /// Destroy an object and, transitively, all of its children.
    ///
    /// Destroyed objects disappear from queries and iteration at once.
    /// Destroying an unknown or already destroyed object does nothing.
    pub fn destroy(&mut self, id: ObjectId) {
        let parent = match self.objects.get(&id) {
            Some(object) if !object.destroyed => object.parent,
            _ => return,
        };

        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }

        let doomed = hierarchy::subtree_post_order(self, id);
        for &d in &doomed {
            if let Some(object) = self.objects.get_mut(&d) {
                if object.destroyed {
                    continue;
                }
                object.destroyed = true;
                self.spatial.remove(d);
                self.pending_destroy.push(d);
            }
        }
        log::debug!("Destroyed {:?} and {} descendant(s)", id, doomed.len() - 1);
    }

    /// Release storage of destroyed objects and run their `on_destroy` hooks.
    ///
    /// Called at the end of every `step`; call it directly to settle
    /// destruction requested between ticks.
    pub fn flush_destroyed(&mut self) {
        while !self.pending_destroy.is_empty() {
            let batch = std::mem::take(&mut self.pending_destroy);
            for &id in &batch {
                if let Some(mut behavior) = self.behaviors.remove(&id) {
                    if let Some(snapshot) = self.objects.get(&id).cloned() {
                        behavior.on_destroy(&snapshot, self);
                    }
                }
            }
            for id in batch {
                self.objects.remove(&id);
                self.last_update.remove(&id);
            }
        }
        self.roots.retain(|id| self.objects.contains_key(id));
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.objects.get(&id).map_or(false, |o| !o.destroyed)
    }

    /// True for destroyed, flushed and never-issued handles alike.
    pub fn is_destroyed(&self, id: ObjectId) -> bool {
        !self.is_alive(id)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.values().filter(|o| !o.destroyed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------
    // Access
    // ------------------------------

    /// A live object. Destroyed objects resolve to `None`.
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id).filter(|o| !o.destroyed)
    }

    /// Mutable access to a live object.
    ///
    /// Position or size edits reach the broad phase on the object's next
    /// update; use [`set_position`](Self::set_position) or
    /// [`set_size`](Self::set_size) to apply them at once.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id).filter(|o| !o.destroyed)
    }

    pub fn set_position(&mut self, id: ObjectId, position: Vec2) {
        if let Some(object) = self.get_mut(id) {
            object.position = position;
            self.refresh_spatial(id);
        }
    }

    /// Negative components are clamped to zero.
    pub fn set_size(&mut self, id: ObjectId, size: Vec2) {
        if let Some(object) = self.get_mut(id) {
            object.size = size.max(Vec2::ZERO);
            self.refresh_spatial(id);
        }
    }

    /// Live objects in update order: each root followed by its subtree.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for &root in &self.roots {
            if !self.is_alive(root) {
                continue;
            }
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let Some(object) = self.get(id) else {
                    continue;
                };
                out.push(id);
                stack.extend(object.children.iter().rev());
            }
        }
        out
    }

    /// Iterate over every live object in unspecified order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values().filter(|o| !o.destroyed)
    }

    /// What `id` rested on during the last tick. References to objects that
    /// have since been destroyed resolve to `None`.
    pub fn ground_object(&self, id: ObjectId) -> Option<Ground> {
        match self.get(id)?.ground? {
            Ground::World => Some(Ground::World),
            Ground::Object(other) if self.is_alive(other) => Some(Ground::Object(other)),
            Ground::Object(_) => None,
        }
    }

    // ------------------------------
    // Behaviors
    // ------------------------------

    /// Run `f` with the object's behavior taken out of storage.
    /// Returns `None` if the object has no behavior or is already running one
    /// of its hooks.
    pub fn with_behavior<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut dyn Behavior, &mut World) -> R,
    ) -> Option<R> {
        let mut behavior = self.behaviors.remove(&id)?;
        let result = f(behavior.as_mut(), self);
        self.restore_behavior(id, behavior);
        Some(result)
    }

    /// Like [`with_behavior`](Self::with_behavior) for a concrete behavior type.
    pub fn with_behavior_as<T: Behavior, R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut T, &mut World) -> R,
    ) -> Option<R> {
        let mut behavior = self.behaviors.remove(&id)?;
        let result = match AsAny::as_any_mut(behavior.as_mut()).downcast_mut::<T>() {
            Some(typed) => Some(f(typed, self)),
            None => None,
        };
        self.restore_behavior(id, behavior);
        result
    }

    pub fn behavior<T: Behavior>(&self, id: ObjectId) -> Option<&T> {
        let behavior = self.behaviors.get(&id)?;
        AsAny::as_any(behavior.as_ref()).downcast_ref::<T>()
    }

    pub fn behavior_mut<T: Behavior>(&mut self, id: ObjectId) -> Option<&mut T> {
        let behavior = self.behaviors.get_mut(&id)?;
        AsAny::as_any_mut(behavior.as_mut()).downcast_mut::<T>()
    }

    fn restore_behavior(&mut self, id: ObjectId, behavior: Box<dyn Behavior>) {
        // A hook may have installed a replacement; keep the newer one.
        if self.objects.contains_key(&id) && !self.behaviors.contains_key(&id) {
            self.behaviors.insert(id, behavior);
        }
    }

    // ------------------------------
    // Hierarchy
    // ------------------------------

    /// Attach `child` to `parent` at a local offset and angle, or detach it
    /// with `parent == None` (the child keeps its current world transform).
    ///
    /// Rejects self-parenting and cycles without changing anything.
    pub fn set_parent(
        &mut self,
        child: ObjectId,
        parent: Option<ObjectId>,
        local_offset: Vec2,
        local_angle: f32,
    ) -> Result<(), SceneError> {
        self.require_alive(child)?;
        if let Some(parent) = parent {
            self.require_alive(parent)?;
            if parent == child {
                log::warn!("Rejected self-parenting of {:?}", child);
                return Err(SceneError::SelfParent(child));
            }
            if hierarchy::is_ancestor_or_self(self, child, parent) {
                log::warn!("Rejected cyclic parenting of {:?} under {:?}", child, parent);
                return Err(SceneError::CyclicParent { child, parent });
            }
        }

        let old_parent = self.objects.get(&child).and_then(|o| o.parent);
        match old_parent {
            Some(old) => {
                if let Some(old) = self.objects.get_mut(&old) {
                    old.children.retain(|&c| c != child);
                }
            }
            None => self.roots.retain(|&r| r != child),
        }

        match parent {
            Some(parent_id) => {
                let transform = self.objects.get_mut(&parent_id).map(|p| {
                    p.children.push(child);
                    hierarchy::child_world_transform(p, local_offset, local_angle)
                });
                if let (Some((position, angle)), Some(object)) =
                    (transform, self.objects.get_mut(&child))
                {
                    object.parent = Some(parent_id);
                    object.local_offset = local_offset;
                    object.local_angle = local_angle;
                    object.position = position;
                    object.angle = angle;
                }
            }
            None => {
                if let Some(object) = self.objects.get_mut(&child) {
                    object.parent = None;
                    object.local_offset = Vec2::ZERO;
                    object.local_angle = 0.0;
                }
                self.roots.push(child);
            }
        }
        self.refresh_spatial(child);
        Ok(())
    }

    /// Convenience for `set_parent(child, Some(parent), offset, 0.0)`.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId, local_offset: Vec2) -> Result<(), SceneError> {
        self.set_parent(child, Some(parent), local_offset, 0.0)
    }

    /// Change a child's attachment without reparenting.
    pub fn set_local_transform(&mut self, child: ObjectId, local_offset: Vec2, local_angle: f32) {
        if let Some(object) = self.get_mut(child) {
            object.local_offset = local_offset;
            object.local_angle = local_angle;
        }
    }

    fn require_alive(&self, id: ObjectId) -> Result<(), SceneError> {
        match self.objects.get(&id) {
            None => Err(SceneError::UnknownObject(id)),
            Some(o) if o.destroyed => Err(SceneError::DestroyedObject(id)),
            Some(_) => Ok(()),
        }
    }

    // ------------------------------
    // Queries
    // ------------------------------

    /// Visit every live object whose box intersects the query box.
    ///
    /// Each object is visited at most once; the visitor stops the walk by
    /// returning `ControlFlow::Break`. Order is unspecified.
    pub fn for_each_in_region<F>(&self, center: Vec2, half_extents: Vec2, mut visitor: F)
    where
        F: FnMut(&Object) -> ControlFlow<()>,
    {
        let query = Aabb::from_center_half_extents(center, half_extents.abs());
        for id in self.spatial.query(&query) {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            if object.destroyed || !object.aabb().intersects(&query) {
                continue;
            }
            if visitor(object).is_break() {
                break;
            }
        }
    }

    /// Handles of every live object whose box intersects the query box.
    pub fn objects_in_region(&self, center: Vec2, half_extents: Vec2) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.for_each_in_region(center, half_extents, |o| {
            out.push(o.id);
            ControlFlow::Continue(())
        });
        out
    }

    /// Collision code at a world position; `0` outside the map.
    pub fn collision_data_at(&self, world_pos: Vec2) -> i32 {
        self.tiles.collision_data_at(world_pos)
    }

    /// Clear a tile. The change is visible to every later query this tick.
    pub fn destroy_tile(&mut self, world_pos: Vec2) -> bool {
        self.tiles.destroy_tile(world_pos)
    }

    /// First solid-tile hit on the segment, if any.
    pub fn raycast(&self, from: Vec2, to: Vec2) -> Option<Vec2> {
        self.tiles.raycast(from, to)
    }

    /// [`raycast`](Self::raycast) that also records the ray for the debug
    /// overlay when `config.debug.raycast` is on.
    pub fn raycast_traced(&mut self, from: Vec2, to: Vec2) -> Option<Vec2> {
        let hit = self.tiles.raycast(from, to);
        if self.config.debug.raycast {
            self.debug_draw.raycast(self.time, from, to, hit);
        }
        hit
    }

    // ------------------------------
    // Tick driver
    // ------------------------------

    /// Advance the simulation by `dt` seconds (clamped to `config.max_dt`).
    ///
    /// Roots update in spawn order; each object updates before its children,
    /// so a child always follows its parent's transform from this tick.
    /// Objects spawned during the tick first update on the next one.
    pub fn step(&mut self, dt: f32) {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_dt)
        } else {
            0.0
        };
        self.delta_time = dt;
        self.time += f64::from(dt);
        self.frame += 1;
        self.debug_draw.prune(self.time);
        self.contact_pairs.clear();

        let roots = self.roots.clone();
        for id in roots {
            self.update_object(id, dt);
        }

        self.flush_destroyed();
    }

    fn update_object(&mut self, id: ObjectId, dt: f32) {
        if !self.is_alive(id) {
            return;
        }
        if self.last_update.insert(id, self.frame) == Some(self.frame) {
            return;
        }

        let parent = self.objects.get(&id).and_then(|o| o.parent);
        match parent {
            Some(parent) => self.follow_parent(id, parent),
            None => physics::integrate(self, id, dt),
        }
        if !self.is_alive(id) {
            return;
        }
        self.refresh_spatial(id);

        self.with_behavior(id, |behavior, world| behavior.update(id, world));

        let children = match self.get(id) {
            Some(object) => object.children.clone(),
            None => return,
        };
        for child in children {
            self.update_object(child, dt);
        }
    }

    fn follow_parent(&mut self, id: ObjectId, parent: ObjectId) {
        let Some(parent) = self.objects.get(&parent) else {
            return;
        };
        let Some(child) = self.objects.get(&id) else {
            return;
        };
        let (position, angle) =
            hierarchy::child_world_transform(parent, child.local_offset, child.local_angle);
        if let Some(child) = self.objects.get_mut(&id) {
            child.position = position;
            child.angle = angle;
            child.ground = None;
        }
    }

    pub(crate) fn refresh_spatial(&mut self, id: ObjectId) {
        if let Some(object) = self.objects.get(&id) {
            if !object.destroyed {
                self.spatial.update(id, object.aabb());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::CollisionResponse;

    fn world() -> World {
        let config = SimulationConfig::default().with_gravity(0.0).with_seed(1);
        World::new(config, TileCollisionMap::new(16, 16, 1.0))
    }

    fn still(position: Vec2) -> ObjectDesc {
        ObjectDesc::new(position, Vec2::ONE).with_damping(1.0)
    }

    #[test]
    fn spawn_registers_in_region_queries() {
        let mut w = world();
        let id = w.spawn(still(Vec2::new(3.0, 3.0)));
        assert!(w.is_alive(id));
        assert_eq!(w.objects_in_region(Vec2::new(3.0, 3.0), Vec2::splat(0.1)), vec![id]);
        assert!(w.objects_in_region(Vec2::new(9.0, 9.0), Vec2::splat(0.1)).is_empty());
    }

    #[test]
    fn handles_are_not_reused() {
        let mut w = world();
        let a = w.spawn(still(Vec2::ZERO));
        w.destroy(a);
        w.flush_destroyed();
        let b = w.spawn(still(Vec2::ZERO));
        assert_ne!(a, b);
        assert!(w.get(a).is_none());
    }

    #[test]
    fn double_destroy_is_noop() {
        let mut w = world();
        let a = w.spawn(still(Vec2::ZERO));
        w.destroy(a);
        w.destroy(a);
        w.flush_destroyed();
        w.destroy(a);
        assert!(w.is_destroyed(a));
        assert!(w.is_empty());
    }

    #[test]
    fn destroyed_objects_leave_queries_immediately() {
        let mut w = world();
        let a = w.spawn(still(Vec2::new(2.0, 2.0)));
        w.destroy(a);
        assert!(w.objects_in_region(Vec2::new(2.0, 2.0), Vec2::ONE).is_empty());
        assert!(w.get(a).is_none());
    }

    #[test]
    fn cycles_are_rejected_without_changes() {
        let mut w = world();
        let a = w.spawn(still(Vec2::ZERO));
        let b = w.spawn(still(Vec2::ZERO));
        let c = w.spawn(still(Vec2::ZERO));
        w.add_child(a, b, Vec2::ONE).unwrap();
        w.add_child(b, c, Vec2::ONE).unwrap();

        assert_eq!(
            w.set_parent(a, Some(c), Vec2::ZERO, 0.0),
            Err(SceneError::CyclicParent { child: a, parent: c })
        );
        assert_eq!(w.set_parent(a, Some(a), Vec2::ZERO, 0.0), Err(SceneError::SelfParent(a)));
        assert_eq!(w.get(a).unwrap().parent(), None);
        assert_eq!(w.get(b).unwrap().children(), &[c]);
    }

    #[test]
    fn reparenting_moves_child_between_lists() {
        let mut w = world();
        let a = w.spawn(still(Vec2::ZERO));
        let b = w.spawn(still(Vec2::new(4.0, 0.0)));
        let c = w.spawn(still(Vec2::ZERO));
        w.add_child(a, c, Vec2::ZERO).unwrap();
        w.set_parent(c, Some(b), Vec2::new(0.0, 1.0), 0.0).unwrap();

        assert!(w.get(a).unwrap().children().is_empty());
        assert_eq!(w.get(b).unwrap().children(), &[c]);
        assert_eq!(w.get(c).unwrap().position, Vec2::new(4.0, 1.0));

        w.set_parent(c, None, Vec2::ZERO, 0.0).unwrap();
        assert!(w.get(b).unwrap().children().is_empty());
        assert_eq!(w.object_ids(), vec![a, b, c]);
    }

    #[test]
    fn unknown_parent_is_an_error() {
        let mut w = world();
        let a = w.spawn(still(Vec2::ZERO));
        let b = w.spawn(still(Vec2::ZERO));
        w.destroy(b);
        assert_eq!(
            w.set_parent(a, Some(b), Vec2::ZERO, 0.0),
            Err(SceneError::DestroyedObject(b))
        );
    }

    #[test]
    fn region_visitor_can_stop_early() {
        let mut w = world();
        for i in 0..5 {
            w.spawn(still(Vec2::new(1.0 + i as f32 * 0.1, 1.0)));
        }
        let mut visited = 0;
        w.for_each_in_region(Vec2::new(1.0, 1.0), Vec2::splat(2.0), |_| {
            visited += 1;
            if visited == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(visited, 2);
    }

    #[test]
    fn step_clamps_long_frames() {
        let mut w = world();
        let id = w.spawn(still(Vec2::ZERO).with_velocity(Vec2::new(1.0, 0.0)));
        w.step(5.0);
        assert_eq!(w.delta_time(), w.config().max_dt);
        assert!((w.get(id).unwrap().position.x - w.config().max_dt).abs() < 1e-6);
    }

    struct SelfDestruct {
        after: u64,
        destroyed_seen: bool,
    }

    impl Behavior for SelfDestruct {
        fn update(&mut self, id: ObjectId, world: &mut World) {
            if world.frame() >= self.after {
                world.destroy(id);
                self.destroyed_seen = !world.is_alive(id);
            }
        }

        fn collide_with_object(&mut self, _: ObjectId, _: ObjectId, _: &mut World) -> CollisionResponse {
            CollisionResponse::Handled
        }
    }

    #[test]
    fn hooks_can_destroy_their_own_object() {
        let mut w = world();
        let id = w.spawn_with(
            still(Vec2::ZERO),
            SelfDestruct {
                after: 2,
                destroyed_seen: false,
            },
        );
        w.step(0.01);
        assert!(w.is_alive(id));
        assert!(!w.behavior::<SelfDestruct>(id).unwrap().destroyed_seen);
        w.step(0.01);
        assert!(w.is_destroyed(id));
        assert!(w.behavior::<SelfDestruct>(id).is_none());
    }

    struct Recorder {
        log: std::rc::Rc<std::cell::RefCell<Vec<ObjectId>>>,
    }

    impl Behavior for Recorder {
        fn on_destroy(&mut self, object: &Object, _world: &mut World) {
            self.log.borrow_mut().push(object.id());
        }
    }

    #[test]
    fn on_destroy_runs_children_first() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut w = world();
        let parent = w.spawn_with(still(Vec2::ZERO), Recorder { log: log.clone() });
        let child = w.spawn_with(still(Vec2::ZERO), Recorder { log: log.clone() });
        w.add_child(parent, child, Vec2::ONE).unwrap();

        w.destroy(parent);
        w.flush_destroyed();
        assert_eq!(*log.borrow(), vec![child, parent]);
    }
}
