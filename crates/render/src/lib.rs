//! Level render core.
//!
//! Turns a [`crawl_level::Level`] into depth-sorted draw batches and a
//! per-frame [`FramePlan`] (depth pre-pass, shadow cube passes, main pass,
//! present) that a backend executes.
//!
//! # Invariants
//! - The renderer never mutates the level; it only reads it while rebuilding batches.
//! - Camera animation advances before the frame plan is built.
//! - At most 8 render lights per frame, at most 4 of them shadowed.

pub mod batch;
pub mod camera;
pub mod frustum;
pub mod lights;
pub mod manifest;
pub mod mesh;
pub mod plan;
mod renderer;
mod scene;
pub mod settings;
mod stats;

pub use batch::{Billboard, DepthSortedKind, DepthSortedObject, LevelBatches, ModelBatch, RenderBatch};
pub use camera::{Camera, CameraAnimation, HeadBob, RenderView};
pub use frustum::{Containment, Frustum};
pub use lights::{RenderLight, ShaderLight, assign_render_lights, shader_lights};
pub use manifest::{LevelManifest, ManifestError};
pub use plan::{FramePlan, PassCommand, ShadingFeatures, ViewUniforms};
pub use renderer::{DebugTextRenderer, LevelRenderer, Renderer, WALL_TEXTURE_SIZE, WallTextures};
pub use scene::{
    SceneError, apply_action, apply_freecam, load_level, render_level, update_level,
    update_level_renderer,
};
pub use settings::RenderSettings;
pub use stats::{FrameStats, FrameTimer};

pub fn crate_info() -> &'static str {
    "crawl-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
