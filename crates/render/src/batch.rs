//! Depth-sorted batch building.
//!
//! Every tick the level is flattened into one list of renderable records,
//! sorted back to front, and walked once to produce draw batches plus the
//! geometry and sprite vertex buffers they index into.

use crawl_assets::UvRect;
use crawl_common::{
    CellAxis, CellCoord, CubeSide, HALF_CUBE, MeshVertex, ModelHandle, TexturedVertex,
    generate_tangents,
};
use crawl_level::{Level, SpriteKind};
use glam::{Mat4, Vec2, Vec3};

use crate::mesh::{CubeFaces, mesh_cell, mesh_sprite};

/// Model object name meaning "draw every object of the model".
pub const WHOLE_MODEL: &str = "*";
pub const DOOR_FRAME_OBJECT: &str = "frame";
pub const DOOR_LEAF_OBJECT: &str = "door";

/// What a depth-sorted record refers to. Indices point into the level's vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthSortedKind {
    Geometry(CellCoord),
    Model(usize),
    Door(usize),
    Sprite(SpriteKind, usize),
}

impl DepthSortedKind {
    /// Tie-break order at equal distance.
    fn rank(self) -> u8 {
        match self {
            Self::Geometry(_) => 0,
            Self::Model(_) => 1,
            Self::Door(_) => 2,
            Self::Sprite(..) => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSortedObject {
    pub kind: DepthSortedKind,
    pub position: Vec3,
    pub distance: f32,
}

/// How the sprite shader orients a quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum Billboard {
    Fixed = 0,
    #[default]
    FaceCamera = 1,
}

/// One model (or one named object of it) placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBatch {
    pub model: ModelHandle,
    pub object: &'static str,
    pub position: Vec3,
    pub offset: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub scale: f32,
    pub align: CubeSide,
}

impl ModelBatch {
    pub fn whole(&self) -> bool {
        self.object == WHOLE_MODEL
    }

    /// `translate(position) * translate(offset) * rotX * rotY * rotZ * scale * align`.
    pub fn model_matrix(&self) -> Mat4 {
        let r = self.rotation;
        Mat4::from_translation(self.position)
            * Mat4::from_translation(self.offset)
            * Mat4::from_rotation_x(r.x.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_z(r.z.to_radians())
            * Mat4::from_scale(Vec3::splat(self.scale))
            * align_matrix(self.align)
    }
}

/// Moves a model from the cell center onto the given face.
pub fn align_matrix(align: CubeSide) -> Mat4 {
    match align {
        CubeSide::North => Mat4::from_translation(Vec3::new(0.0, 0.0, -HALF_CUBE)),
        CubeSide::South => {
            Mat4::from_translation(Vec3::new(0.0, 0.0, HALF_CUBE))
                * Mat4::from_rotation_y(180f32.to_radians())
        }
        CubeSide::West => {
            Mat4::from_translation(Vec3::new(-HALF_CUBE, 0.0, 0.0))
                * Mat4::from_rotation_y(90f32.to_radians())
        }
        CubeSide::East => {
            Mat4::from_translation(Vec3::new(HALF_CUBE, 0.0, 0.0))
                * Mat4::from_rotation_y((-90f32).to_radians())
        }
        CubeSide::Top => Mat4::IDENTITY,
        CubeSide::Bottom => Mat4::from_translation(Vec3::new(0.0, -HALF_CUBE, 0.0)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderBatch {
    Geometry {
        offset: u32,
        count: u32,
        position: Vec3,
    },
    Sprite {
        offset: u32,
        count: u32,
        position: Vec3,
        size: Vec2,
        normal: Vec3,
        billboard: Billboard,
    },
    Model(ModelBatch),
}

impl RenderBatch {
    pub fn position(&self) -> Vec3 {
        match self {
            Self::Geometry { position, .. } | Self::Sprite { position, .. } => *position,
            Self::Model(m) => m.position,
        }
    }
}

/// Output of one batch build.
#[derive(Debug, Clone, Default)]
pub struct LevelBatches {
    /// Back to front.
    pub objects: Vec<DepthSortedObject>,
    /// In the same order as `objects`; doors expand to two batches.
    pub batches: Vec<RenderBatch>,
    pub geometry_mesh: Vec<MeshVertex>,
    pub sprite_mesh: Vec<TexturedVertex>,
}

impl LevelBatches {
    pub fn geometry_count(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b, RenderBatch::Geometry { .. }))
            .count()
    }

    pub fn sprite_count(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b, RenderBatch::Sprite { .. }))
            .count()
    }
}

/// Collect every renderable record with its camera distance, sorted back to front.
pub fn depth_sort(level: &Level, camera: Vec3) -> Vec<DepthSortedObject> {
    let mut objects = Vec::new();
    let mut push = |kind, position: Vec3, anchor: Vec3| {
        objects.push(DepthSortedObject {
            kind,
            position,
            distance: anchor.distance(camera),
        });
    };

    for (cell, symbol) in level.grid().iter() {
        if symbol != crawl_common::Grid::WALL {
            let center = cell.world_center();
            push(DepthSortedKind::Geometry(cell), center, center);
        }
    }
    for (i, inst) in level.model_instances.iter().enumerate() {
        let center = inst.cell.world_center();
        push(DepthSortedKind::Model(i), center, center);
    }
    for (i, door) in level.doors.iter().enumerate() {
        let center = door.cell.world_center();
        push(DepthSortedKind::Door(i), center, center);
    }
    for (kind, list) in [
        (SpriteKind::Monster, &level.monsters),
        (SpriteKind::Object, &level.objects),
    ] {
        for (i, sprite) in list.iter().enumerate() {
            push(
                DepthSortedKind::Sprite(kind, i),
                sprite.world_position(),
                sprite.cell.world_center(),
            );
        }
    }

    objects.sort_by(|a, b| {
        b.distance
            .total_cmp(&a.distance)
            .then_with(|| a.kind.rank().cmp(&b.kind.rank()))
    });
    objects
}

/// Build the depth-sorted batch list and the vertex buffers it references.
///
/// `sprite_uvs` maps atlas slots to UV rectangles. Door batches are only
/// emitted when a door model is loaded.
pub fn build_batches(
    level: &Level,
    camera: Vec3,
    camera_front: Vec3,
    sprite_uvs: &[UvRect],
    door_model: Option<ModelHandle>,
) -> LevelBatches {
    let objects = depth_sort(level, camera);
    let mut batches = Vec::with_capacity(objects.len() + level.doors.len());
    let mut geometry_mesh = Vec::new();
    let mut sprite_mesh = Vec::new();

    for obj in &objects {
        match obj.kind {
            DepthSortedKind::Geometry(cell) => {
                let offset = geometry_mesh.len() as u32;
                let faces = CubeFaces::for_cell(level.grid(), cell);
                let count = mesh_cell(cell, &faces, level.light_map(), &mut geometry_mesh);
                batches.push(RenderBatch::Geometry {
                    offset,
                    count,
                    position: obj.position,
                });
            }
            DepthSortedKind::Sprite(kind, i) => {
                let list = match kind {
                    SpriteKind::Monster => &level.monsters,
                    SpriteKind::Object => &level.objects,
                };
                let Some(sprite) = list.get(i) else {
                    continue;
                };
                let slot = sprite.texture_for(camera_front);
                let uv = sprite_uvs.get(slot as usize).copied().unwrap_or_else(|| {
                    tracing::warn!(slot, "sprite texture slot missing from atlas");
                    UvRect::FULL
                });
                let offset = sprite_mesh.len() as u32;
                let count = mesh_sprite(Vec3::ZERO, sprite.size, uv, &mut sprite_mesh);
                batches.push(RenderBatch::Sprite {
                    offset,
                    count,
                    position: obj.position,
                    size: sprite.size,
                    normal: Vec3::new(sprite.direction.x as f32, 0.0, sprite.direction.y as f32),
                    billboard: Billboard::FaceCamera,
                });
            }
            DepthSortedKind::Door(i) => {
                let (Some(model), Some(door)) = (door_model, level.doors.get(i)) else {
                    continue;
                };
                let rotation = match door.axis {
                    CellAxis::Xy => Vec3::ZERO,
                    CellAxis::Zy => Vec3::new(0.0, -90.0, 0.0),
                };
                let frame = ModelBatch {
                    model,
                    object: DOOR_FRAME_OBJECT,
                    position: obj.position,
                    offset: Vec3::ZERO,
                    rotation,
                    scale: 1.0,
                    align: CubeSide::Bottom,
                };
                batches.push(RenderBatch::Model(frame));
                batches.push(RenderBatch::Model(ModelBatch {
                    object: DOOR_LEAF_OBJECT,
                    offset: Vec3::new(0.0, door.offset_y, 0.0),
                    ..frame
                }));
            }
            DepthSortedKind::Model(i) => {
                let Some(inst) = level.model_instances.get(i) else {
                    continue;
                };
                batches.push(RenderBatch::Model(ModelBatch {
                    model: inst.model,
                    object: WHOLE_MODEL,
                    position: obj.position,
                    offset: Vec3::ZERO,
                    rotation: Vec3::ZERO,
                    scale: inst.scale,
                    align: inst.align,
                }));
            }
        }
    }

    let fallbacks = generate_tangents(&mut geometry_mesh) + generate_tangents(&mut sprite_mesh);
    if fallbacks > 0 {
        tracing::debug!(fallbacks, "degenerate UVs while generating tangents");
    }
    tracing::trace!(
        objects = objects.len(),
        batches = batches.len(),
        geometry_vertices = geometry_mesh.len(),
        sprite_vertices = sprite_mesh.len(),
        "batches rebuilt"
    );

    LevelBatches {
        objects,
        batches,
        geometry_mesh,
        sprite_mesh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_common::Grid;
    use crawl_level::Blueprint;

    fn level() -> Level {
        let grid = Grid::from_rows(&["######", "#P M #", "# 4d #", "######"]).unwrap();
        let goblin = Blueprint::new(SpriteKind::Monster, b'M', b'N', "assets/goblin", 50, 64, 2.5);
        let mut level = Level::load(grid, vec![goblin], 7).unwrap();
        level.create_model_instance(CellCoord::new(3, 2), CubeSide::North, 1.0, ModelHandle(1));
        level
    }

    #[test]
    fn sorted_back_to_front_with_kind_ties() {
        let level = level();
        let camera = CellCoord::new(1, 1).world_center();
        let objects = depth_sort(&level, camera);
        for pair in objects.windows(2) {
            assert!(pair[0].distance >= pair[1].distance);
            if pair[0].distance == pair[1].distance {
                assert!(pair[0].kind.rank() <= pair[1].kind.rank());
            }
        }
        // The door cell: geometry, then the model instance, then the door.
        let at_door: Vec<_> = objects
            .iter()
            .filter(|o| o.position == CellCoord::new(3, 2).world_center())
            .map(|o| o.kind)
            .collect();
        assert_eq!(
            at_door,
            vec![
                DepthSortedKind::Geometry(CellCoord::new(3, 2)),
                DepthSortedKind::Model(0),
                DepthSortedKind::Door(0),
            ]
        );
    }

    #[test]
    fn one_geometry_batch_per_open_cell() {
        let level = level();
        let built = build_batches(&level, Vec3::ZERO, Vec3::NEG_Z, &[], Some(ModelHandle(0)));
        assert_eq!(built.geometry_count(), 8);
        assert_eq!(built.sprite_count(), 1);
        // Frame and leaf for the single door, plus the model instance.
        let models = built.batches.len() - 8 - 1;
        assert_eq!(models, 3);
        let total: u32 = built
            .batches
            .iter()
            .filter_map(|b| match b {
                RenderBatch::Geometry { count, .. } => Some(*count),
                _ => None,
            })
            .sum();
        assert_eq!(total as usize, built.geometry_mesh.len());
        assert_eq!(built.sprite_mesh.len(), 6);
    }

    #[test]
    fn door_batches_follow_the_leaf() {
        let mut level = level();
        level.doors[0].offset_y = -1.25;
        let built = build_batches(&level, Vec3::ZERO, Vec3::NEG_Z, &[], Some(ModelHandle(0)));
        let doors: Vec<&ModelBatch> = built
            .batches
            .iter()
            .filter_map(|b| match b {
                RenderBatch::Model(m) if m.model == ModelHandle(0) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(doors.len(), 2);
        assert_eq!(doors[0].object, DOOR_FRAME_OBJECT);
        assert_eq!(doors[1].object, DOOR_LEAF_OBJECT);
        assert_eq!(doors[1].offset.y, -1.25);
        // 'd' spans the Z axis.
        assert_eq!(doors[0].rotation.y, -90.0);
        assert_eq!(doors[0].align, CubeSide::Bottom);
    }

    #[test]
    fn no_door_model_skips_door_batches() {
        let level = level();
        let built = build_batches(&level, Vec3::ZERO, Vec3::NEG_Z, &[], None);
        assert_eq!(built.batches.len(), 8 + 1 + 1);
    }

    #[test]
    fn model_matrix_applies_alignment() {
        let batch = ModelBatch {
            model: ModelHandle(0),
            object: WHOLE_MODEL,
            position: Vec3::new(6.0, 0.0, 3.0),
            offset: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
            align: CubeSide::South,
        };
        let m = batch.model_matrix();
        let origin = m.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(6.0, 0.0, 4.5)).length() < 1e-5);
        // South turns the model around: local -z now points to +z.
        let ahead = m.transform_vector3(Vec3::NEG_Z);
        assert!((ahead - Vec3::Z).length() < 1e-5);

        let floor = ModelBatch {
            align: CubeSide::Bottom,
            scale: 2.0,
            ..batch
        };
        let p = floor.model_matrix().transform_point3(Vec3::new(0.0, 1.0, 0.0));
        // Scale applies after the alignment offset.
        assert!((p - Vec3::new(6.0, -1.0, 3.0)).length() < 1e-5);
    }
}
