//! Asset loading: the collaborator the renderer calls for models, textures and atlases.
//!
//! The renderer consumes assets as plain CPU data ([`ModelData`], [`image::RgbaImage`],
//! [`Atlas`]); GPU upload happens in the backend. Missing files are errors, never defaults.
//!
//! # Layout
//! - [`FsAssetLoader`] reads glTF and PNG files relative to an asset root.
//! - [`PlaceholderLoader`] generates stand-in assets so tools and tests run without files.

mod atlas;
mod loader;
mod model;
mod texture;

pub use atlas::{Atlas, AtlasBuilder, UvRect};
pub use image::RgbaImage;
pub use loader::{AssetLoader, FsAssetLoader, PlaceholderLoader};
pub use model::{MeshData, ModelData, ModelObject, ModelSpec, box_mesh};
pub use texture::{checker, fit_to, flat_normal_map, solid};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("image decode error in {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("glTF import error in {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("model {0} contains no triangle meshes")]
    EmptyModel(String),
}

pub fn crate_info() -> &'static str {
    "crawl-assets v0.1.0"
}
