//! Frame plan: the ordered pass commands a backend executes for one frame.

use glam::{Mat4, Vec3};

use crate::lights::{RenderLight, ShaderLight};

pub const GEOMETRY_SHININESS: f32 = 20.0;
pub const SPRITE_SHININESS: f32 = 8.0;
pub const MODEL_SHININESS: f32 = 64.0;
pub const MATERIAL_AMBIENT: f32 = 0.001;

pub const SHADOW_NEAR: f32 = 0.1;
pub const SHADOW_FAR: f32 = 100.0;

/// Cube-map face directions and up vectors, in layer order (+X, -X, +Y, -Y, +Z, -Z).
///
/// Paired with left-handed look-to matrices these match the face layout
/// sampled by `textureSample` on a cube texture.
pub const SHADOW_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y),
    (Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::Z),
    (Vec3::Z, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y),
];

/// View-projection matrix for each face of a light's shadow cube.
pub fn shadow_view_projections(light: Vec3) -> [Mat4; 6] {
    let projection = Mat4::perspective_lh(90f32.to_radians(), 1.0, SHADOW_NEAR, SHADOW_FAR);
    SHADOW_FACES.map(|(dir, up)| projection * Mat4::look_to_lh(light, dir, up))
}

/// Camera data shared by every pass of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl ViewUniforms {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Shader switches carried over from the render settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadingFeatures {
    pub shadows: bool,
    pub normal_mapping: bool,
    pub specular_mapping: bool,
}

/// One pass. Draw lists are indices into the renderer's batch list.
#[derive(Debug, Clone, PartialEq)]
pub enum PassCommand {
    /// Depth only, into the render-sized depth buffer.
    DepthPrePass {
        geometry: Vec<usize>,
        models: Vec<usize>,
    },
    /// Distance cube map for one light: the whole geometry mesh plus `models`.
    Shadow {
        slot: usize,
        light: usize,
        position: Vec3,
        faces: [Mat4; 6],
        models: Vec<usize>,
    },
    /// Lit pass into the offscreen target, in depth-sorted order.
    Main { draws: Vec<usize> },
    /// Blit the offscreen target to the surface.
    Present,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub view: ViewUniforms,
    pub features: ShadingFeatures,
    pub render_lights: Vec<RenderLight>,
    pub shader_lights: Vec<ShaderLight>,
    pub commands: Vec<PassCommand>,
}

impl FramePlan {
    pub fn shadow_passes(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PassCommand::Shadow { .. }))
            .count()
    }

    pub fn main_draws(&self) -> &[usize] {
        self.commands
            .iter()
            .find_map(|c| match c {
                PassCommand::Main { draws } => Some(draws.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}
