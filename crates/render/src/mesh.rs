//! CPU mesh generation for level cells and sprite quads.

use crawl_assets::UvRect;
use crawl_common::{CellCoord, Grid, HALF_CUBE, MeshVertex, TexturedVertex, WallTexture};
use crawl_lighting::LightMap;
use glam::{IVec2, Vec2, Vec3};

/// Which texture layer each face of a cell cube uses; `None` faces are not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CubeFaces {
    /// -z side, facing the neighbor at `y - 1`.
    pub front: Option<WallTexture>,
    /// +z side, facing the neighbor at `y + 1`.
    pub back: Option<WallTexture>,
    /// -x side.
    pub left: Option<WallTexture>,
    /// +x side.
    pub right: Option<WallTexture>,
    pub top: Option<WallTexture>,
    pub bottom: Option<WallTexture>,
}

impl CubeFaces {
    /// Floor and ceiling always; a wall on each side whose neighbor is a wall.
    pub fn for_cell(grid: &Grid, cell: CellCoord) -> Self {
        let wall = |dx: i32, dy: i32| grid.is_wall(cell.x + dx, cell.y + dy).then_some(WallTexture::Wall);
        Self {
            front: wall(0, -1),
            back: wall(0, 1),
            left: wall(-1, 0),
            right: wall(1, 0),
            top: Some(WallTexture::Ceiling),
            bottom: Some(WallTexture::Floor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Front,
    Back,
    Left,
    Right,
    Bottom,
    Top,
}

impl Face {
    fn normal(self) -> Vec3 {
        match self {
            Face::Front => Vec3::Z,
            Face::Back => Vec3::NEG_Z,
            Face::Left => Vec3::X,
            Face::Right => Vec3::NEG_X,
            Face::Bottom => Vec3::Y,
            Face::Top => Vec3::NEG_Y,
        }
    }

    /// Two triangles: corner signs and UVs, counter-clockwise seen from inside the cell.
    fn corners(self) -> [([f32; 3], [f32; 2]); 6] {
        const L: f32 = -1.0;
        const H: f32 = 1.0;
        match self {
            Face::Front => [
                ([L, L, L], [0.0, 1.0]),
                ([H, L, L], [1.0, 1.0]),
                ([H, H, L], [1.0, 0.0]),
                ([H, H, L], [1.0, 0.0]),
                ([L, H, L], [0.0, 0.0]),
                ([L, L, L], [0.0, 1.0]),
            ],
            Face::Back => [
                ([L, L, H], [0.0, 1.0]),
                ([L, H, H], [0.0, 0.0]),
                ([H, H, H], [1.0, 0.0]),
                ([H, H, H], [1.0, 0.0]),
                ([H, L, H], [1.0, 1.0]),
                ([L, L, H], [0.0, 1.0]),
            ],
            Face::Left => [
                ([L, H, H], [0.0, 0.0]),
                ([L, L, H], [0.0, 1.0]),
                ([L, L, L], [1.0, 1.0]),
                ([L, L, L], [1.0, 1.0]),
                ([L, H, L], [1.0, 0.0]),
                ([L, H, H], [0.0, 0.0]),
            ],
            Face::Right => [
                ([H, H, H], [0.0, 0.0]),
                ([H, H, L], [1.0, 0.0]),
                ([H, L, L], [1.0, 1.0]),
                ([H, L, L], [1.0, 1.0]),
                ([H, L, H], [0.0, 1.0]),
                ([H, H, H], [0.0, 0.0]),
            ],
            Face::Bottom => [
                ([L, L, L], [0.0, 0.0]),
                ([L, L, H], [0.0, 1.0]),
                ([H, L, H], [1.0, 1.0]),
                ([H, L, H], [1.0, 1.0]),
                ([H, L, L], [1.0, 0.0]),
                ([L, L, L], [0.0, 0.0]),
            ],
            Face::Top => [
                ([L, H, L], [0.0, 0.0]),
                ([H, H, L], [1.0, 0.0]),
                ([H, H, H], [1.0, 1.0]),
                ([H, H, H], [1.0, 1.0]),
                ([L, H, H], [0.0, 1.0]),
                ([L, H, L], [0.0, 0.0]),
            ],
        }
    }

    /// Baked light for a corner: floor and ceiling blend the four cells around
    /// the corner, walls blend the two cells sharing the vertical edge.
    fn corner_color(self, light_map: &LightMap, cell: CellCoord, signs: [f32; 3]) -> Vec3 {
        let sx = signs[0] as i32;
        let sz = signs[2] as i32;
        match self {
            Face::Top | Face::Bottom => light_map.blend4([
                cell,
                cell.offset(IVec2::new(sx, 0)),
                cell.offset(IVec2::new(0, sz)),
                cell.offset(IVec2::new(sx, sz)),
            ]),
            Face::Front | Face::Back => light_map.blend2(cell, cell.offset(IVec2::new(sx, 0))),
            Face::Left | Face::Right => light_map.blend2(cell, cell.offset(IVec2::new(0, sz))),
        }
    }
}

/// Append the triangles of one cell cube. Returns the number of vertices written.
pub fn mesh_cell(
    cell: CellCoord,
    faces: &CubeFaces,
    light_map: &LightMap,
    out: &mut Vec<MeshVertex>,
) -> u32 {
    let center = cell.world_center();
    let start = out.len();
    let sides = [
        (Face::Front, faces.front),
        (Face::Back, faces.back),
        (Face::Left, faces.left),
        (Face::Right, faces.right),
        (Face::Bottom, faces.bottom),
        (Face::Top, faces.top),
    ];
    for (face, texture) in sides {
        let Some(texture) = texture else {
            continue;
        };
        let normal = face.normal();
        for (signs, uv) in face.corners() {
            let position = center + Vec3::from(signs) * HALF_CUBE;
            out.push(MeshVertex::new(
                position,
                Vec2::from(uv),
                texture.layer(),
                normal,
                face.corner_color(light_map, cell, signs),
            ));
        }
    }
    (out.len() - start) as u32
}

/// Append a camera-facing quad in the XY plane centered at `center`.
pub fn mesh_sprite(center: Vec3, size: Vec2, uv: UvRect, out: &mut Vec<TexturedVertex>) -> u32 {
    let h = size / 2.0;
    let (l, r, t, b) = (uv.min.x, uv.max.x, uv.min.y, uv.max.y);
    let quad = [
        (Vec2::new(-h.x, -h.y), Vec2::new(l, b)),
        (Vec2::new(-h.x, h.y), Vec2::new(l, t)),
        (Vec2::new(h.x, h.y), Vec2::new(r, t)),
        (Vec2::new(h.x, h.y), Vec2::new(r, t)),
        (Vec2::new(h.x, -h.y), Vec2::new(r, b)),
        (Vec2::new(-h.x, -h.y), Vec2::new(l, b)),
    ];
    for (offset, tex) in quad {
        out.push(TexturedVertex::new(
            center + offset.extend(0.0),
            tex,
            Vec3::Z,
        ));
    }
    quad.len() as u32
}
