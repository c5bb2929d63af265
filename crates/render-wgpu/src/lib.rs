//! wgpu backend for the crawl level renderer.
//!
//! Executes a [`crawl_render::FramePlan`]: a depth pre-pass, one distance
//! cube map per shadowed light, the lit main pass into an offscreen target,
//! and a present blit to the window surface.
//!
//! # Invariants
//! - The backend never mutates the level or the level renderer.
//! - Pass order is the plan's command order.

mod context;
mod gpu;
mod shaders;
mod textures;
mod uniforms;

pub use context::GpuContext;
pub use gpu::WgpuRenderer;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("surface reports no supported formats")]
    SurfaceUnsupported,
    #[error("failed to acquire device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("validation failed while {stage}: {message}")]
    Validation { stage: &'static str, message: String },
    #[error("texture layers differ in size: expected {expected:?}, found {found:?}")]
    LayerSize {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

pub fn crate_info() -> &'static str {
    "crawl-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }

    #[test]
    fn errors_render_readably() {
        let err = GpuError::LayerSize {
            expected: (64, 64),
            found: (32, 64),
        };
        assert_eq!(
            err.to_string(),
            "texture layers differ in size: expected (64, 64), found (32, 64)"
        );
    }
}
