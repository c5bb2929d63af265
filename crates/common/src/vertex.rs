use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::tangent::TangentVertex;

/// Level geometry vertex. `uv.z` is the array-texture layer; `color` is the baked light-map tint.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub color: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: Vec3, uv: Vec2, layer: f32, normal: Vec3, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            uv: [uv.x, uv.y, layer],
            normal: normal.to_array(),
            tangent: [0.0; 3],
            color: color.to_array(),
        }
    }
}

/// Vertex used by sprites and loaded models.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl TexturedVertex {
    pub fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
            normal: normal.to_array(),
            tangent: [0.0; 3],
        }
    }
}

impl TangentVertex for MeshVertex {
    fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    fn uv(&self) -> Vec2 {
        Vec2::new(self.uv[0], self.uv[1])
    }

    fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }

    fn set_tangent(&mut self, tangent: Vec3) {
        self.tangent = tangent.to_array();
    }
}

impl TangentVertex for TexturedVertex {
    fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    fn uv(&self) -> Vec2 {
        Vec2::from(self.uv)
    }

    fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }

    fn set_tangent(&mut self, tangent: Vec3) {
        self.tangent = tangent.to_array();
    }
}
