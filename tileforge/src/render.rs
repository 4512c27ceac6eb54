//! Read-only snapshot handed to an external renderer.

use glam::{Mat4, Vec3};

use crate::color::Color;
use crate::math::Vec2;
use crate::object::{Object, ObjectId, TileInfo};
use crate::world::World;

/// Everything a renderer needs to draw one object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
    pub id: ObjectId,
    /// Object position plus its draw offset.
    pub position: Vec2,
    pub angle: f32,
    /// Draw size; the object's `draw_size` if set, else its collision size.
    pub size: Vec2,
    pub mirror: bool,
    pub render_order: i32,
    pub color: Color,
    pub additive_color: Color,
    pub tile: Option<TileInfo>,
    pub additive_blend: bool,
    pub fade_rate: f32,
}

impl RenderItem {
    pub fn from_object(object: &Object) -> Self {
        Self {
            id: object.id(),
            position: object.position + object.visual.draw_offset,
            angle: object.visual.draw_angle.unwrap_or(object.angle),
            size: object.visual.draw_size.unwrap_or(object.size),
            mirror: object.mirror,
            render_order: object.render_order,
            color: object.visual.color,
            additive_color: object.visual.additive_color,
            tile: object.visual.tile,
            additive_blend: object.visual.additive_blend,
            fade_rate: object.visual.fade_rate,
        }
    }

    /// Model matrix mapping a unit quad to this item. Mirroring flips X.
    pub fn model_matrix(&self) -> Mat4 {
        let flip = if self.mirror { -1.0 } else { 1.0 };
        let translation = Mat4::from_translation(Vec3::new(self.position.x, self.position.y, 0.0));
        let rotation = Mat4::from_rotation_z(self.angle);
        let scale = Mat4::from_scale(Vec3::new(self.size.x * flip, self.size.y, 1.0));

        translation * rotation * scale
    }
}

impl World {
    /// Snapshot of every live object, sorted by render order and then by
    /// spawn order.
    pub fn render_items(&self) -> Vec<RenderItem> {
        let mut items: Vec<RenderItem> = self.objects().map(RenderItem::from_object).collect();
        items.sort_by_key(|item| (item.render_order, item.id));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::object::ObjectDesc;
    use crate::tile_collision::TileCollisionMap;

    #[test]
    fn items_sorted_by_render_order() {
        let mut world = World::new(SimulationConfig::default(), TileCollisionMap::new(1, 1, 1.0));
        let front = world.spawn(ObjectDesc::new(Vec2::ZERO, Vec2::ONE).with_render_order(10));
        let back = world.spawn(ObjectDesc::new(Vec2::ZERO, Vec2::ONE).with_render_order(-1));
        let middle = world.spawn(ObjectDesc::new(Vec2::ZERO, Vec2::ONE));
        let order: Vec<_> = world.render_items().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![back, middle, front]);
    }

    #[test]
    fn mirrored_matrix_flips_x() {
        let mut world = World::new(SimulationConfig::default(), TileCollisionMap::new(1, 1, 1.0));
        let id = world.spawn(
            ObjectDesc::new(Vec2::new(2.0, 3.0), Vec2::new(2.0, 1.0)).with_mirror(true),
        );
        let item = world.render_items().into_iter().find(|i| i.id == id).unwrap();
        let corner = item.model_matrix().transform_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 3.5).abs() < 1e-6);
    }
}
