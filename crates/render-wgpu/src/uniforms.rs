//! GPU-side uniform layouts, mirrored by the structs in the WGSL sources.

use bytemuck::{Pod, Zeroable};
use crawl_render::lights::MAX_SHADER_LIGHTS;
use crawl_render::plan::{
    GEOMETRY_SHININESS, MATERIAL_AMBIENT, MODEL_SHININESS, SHADOW_FAR, SPRITE_SHININESS,
};
use crawl_render::{FramePlan, RenderBatch, ShaderLight};
use glam::{Mat4, Vec3};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct LightUniform {
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// linear, quadratic, casts shadow, shadow slot (-1 when none)
    pub params: [f32; 4],
}

impl From<&ShaderLight> for LightUniform {
    fn from(l: &ShaderLight) -> Self {
        let slot = l.shadow_slot.map_or(-1.0, |s| s as f32);
        Self {
            position: l.position.extend(1.0).to_array(),
            ambient: l.ambient.extend(1.0).to_array(),
            diffuse: l.diffuse.extend(1.0).to_array(),
            specular: l.specular.extend(1.0).to_array(),
            params: [l.linear, l.quadratic, if l.shadow { 1.0 } else { 0.0 }, slot],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
    /// light count, shadows, normal mapping, specular mapping
    pub flags: [u32; 4],
    pub lights: [LightUniform; MAX_SHADER_LIGHTS],
}

impl FrameUniforms {
    pub fn from_plan(plan: &FramePlan) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.view_proj = plan.view.view_projection().to_cols_array_2d();
        uniforms.eye = plan.view.eye.extend(1.0).to_array();
        uniforms.right = plan.view.right.extend(0.0).to_array();
        uniforms.up = plan.view.up.extend(0.0).to_array();
        let count = plan.shader_lights.len().min(MAX_SHADER_LIGHTS);
        uniforms.flags = [
            count as u32,
            plan.features.shadows as u32,
            plan.features.normal_mapping as u32,
            plan.features.specular_mapping as u32,
        ];
        for (slot, light) in uniforms.lights.iter_mut().zip(&plan.shader_lights) {
            *slot = light.into();
        }
        uniforms
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    /// shininess, billboard, material ambient, unused
    pub params: [f32; 4],
    pub extra: [f32; 4],
}

impl DrawUniforms {
    /// Geometry vertices are already in world space.
    pub fn identity() -> Self {
        Self::new(Mat4::IDENTITY, GEOMETRY_SHININESS, 0.0, 1.0, Vec3::ZERO)
    }

    fn new(model: Mat4, shininess: f32, billboard: f32, ambient: f32, extra: Vec3) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            params: [shininess, billboard, ambient, 0.0],
            extra: extra.extend(0.0).to_array(),
        }
    }

    pub fn for_batch(batch: &RenderBatch) -> Self {
        match batch {
            RenderBatch::Geometry { .. } => Self::identity(),
            RenderBatch::Sprite {
                position,
                normal,
                billboard,
                ..
            } => Self::new(
                Mat4::from_translation(*position),
                SPRITE_SHININESS,
                *billboard as u32 as f32,
                MATERIAL_AMBIENT,
                *normal,
            ),
            RenderBatch::Model(m) => Self::new(
                m.model_matrix(),
                MODEL_SHININESS,
                0.0,
                MATERIAL_AMBIENT,
                Vec3::ZERO,
            ),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ShadowUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// light position, far plane
    pub light: [f32; 4],
}

impl ShadowUniforms {
    pub fn new(view_proj: Mat4, light: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light: light.extend(SHADOW_FAR).to_array(),
        }
    }
}

/// Round `size` up to a multiple of `alignment`.
pub(crate) fn align_to(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

/// Packs one value per slot at `stride` byte intervals.
pub(crate) fn pack_slots<T: Pod>(values: &[T], stride: u64) -> Vec<u8> {
    let stride = stride as usize;
    let mut bytes = vec![0u8; values.len() * stride];
    for (i, value) in values.iter().enumerate() {
        let src = bytemuck::bytes_of(value);
        bytes[i * stride..i * stride + src.len()].copy_from_slice(src);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_common::{CubeSide, ModelHandle};
    use crawl_render::{Billboard, ModelBatch, ShadingFeatures, ViewUniforms};
    use glam::Vec2;

    #[test]
    fn layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 80);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 64 + 16 * 4 + 80 * 7);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 96);
        assert_eq!(std::mem::size_of::<ShadowUniforms>(), 80);
    }

    fn light(slot: Option<usize>, shadow: bool) -> ShaderLight {
        ShaderLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::ONE,
            specular: Vec3::splat(0.5),
            linear: 0.09,
            quadratic: 0.032,
            shadow,
            shadow_slot: slot,
        }
    }

    #[test]
    fn frame_uniforms_from_plan() {
        let plan = FramePlan {
            view: ViewUniforms {
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
                eye: Vec3::new(4.0, 1.5, 7.0),
                right: Vec3::X,
                up: Vec3::Y,
            },
            features: ShadingFeatures {
                shadows: true,
                normal_mapping: false,
                specular_mapping: true,
            },
            render_lights: Vec::new(),
            shader_lights: vec![light(Some(0), true), light(None, false)],
            commands: Vec::new(),
        };
        let u = FrameUniforms::from_plan(&plan);
        assert_eq!(u.flags, [2, 1, 0, 1]);
        assert_eq!(u.eye, [4.0, 1.5, 7.0, 1.0]);
        assert_eq!(u.lights[0].params, [0.09, 0.032, 1.0, 0.0]);
        assert_eq!(u.lights[1].params[2..], [0.0, -1.0]);
        assert_eq!(u.lights[2], LightUniform::zeroed());
    }

    #[test]
    fn draw_uniforms_per_batch_kind() {
        let geometry = RenderBatch::Geometry {
            offset: 0,
            count: 30,
            position: Vec3::ONE,
        };
        assert_eq!(DrawUniforms::for_batch(&geometry), DrawUniforms::identity());

        let sprite = RenderBatch::Sprite {
            offset: 0,
            count: 6,
            position: Vec3::new(4.5, 1.2, 7.5),
            size: Vec2::new(1.9, 2.5),
            normal: Vec3::Z,
            billboard: Billboard::FaceCamera,
        };
        let s = DrawUniforms::for_batch(&sprite);
        assert_eq!(s.model[3], [4.5, 1.2, 7.5, 1.0]);
        assert_eq!(s.params, [SPRITE_SHININESS, 1.0, MATERIAL_AMBIENT, 0.0]);
        assert_eq!(s.extra, [0.0, 0.0, 1.0, 0.0]);

        let batch = ModelBatch {
            model: ModelHandle(0),
            object: "*",
            position: Vec3::new(3.0, 0.0, 3.0),
            offset: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
            align: CubeSide::Bottom,
        };
        let m = DrawUniforms::for_batch(&RenderBatch::Model(batch));
        assert_eq!(m.model, batch.model_matrix().to_cols_array_2d());
        assert_eq!(m.params[0], MODEL_SHININESS);
    }

    #[test]
    fn slots_are_aligned() {
        assert_eq!(align_to(96, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(300, 256), 512);

        let draws = [DrawUniforms::identity(); 3];
        let bytes = pack_slots(&draws, 256);
        assert_eq!(bytes.len(), 768);
        assert_eq!(&bytes[256..352], bytemuck::bytes_of(&draws[1]));
        assert!(bytes[352..512].iter().all(|&b| b == 0));
    }
}
