use serde::{Deserialize, Serialize};

/// Renderer configuration. Every field has a default so partial YAML works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub shadows: bool,
    /// Degrees the render camera pitches down from the logical camera.
    pub head_tilt: f32,
    pub normal_mapping: bool,
    pub specular_mapping: bool,
    pub shadow_map_size: u32,
    pub render_width: u32,
    pub render_height: u32,
    /// Scale applied to the baked light-map colors.
    pub brightness: f32,
    /// Distance the render camera sits behind the logical camera.
    pub camera_pullback: f32,
    /// Eye height forced every tick outside freecam.
    pub camera_height: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fov: 60.0,
            shadows: true,
            head_tilt: 3.0,
            normal_mapping: true,
            specular_mapping: true,
            shadow_map_size: 512,
            render_width: 1920,
            render_height: 1080,
            brightness: 1.0,
            camera_pullback: 1.45,
            camera_height: 0.25,
            near: 0.5,
            far: 100.0,
        }
    }
}

impl RenderSettings {
    pub fn aspect(&self) -> f32 {
        self.render_width.max(1) as f32 / self.render_height.max(1) as f32
    }
}
