use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::Vec3;
use image::RgbaImage;

use crate::model::{MeshData, ModelData, ModelSpec, box_mesh};
use crate::texture::{checker, flat_normal_map, solid};
use crate::AssetError;

/// Source of models and textures for the renderer.
pub trait AssetLoader {
    fn load_image(&mut self, path: &str) -> Result<RgbaImage, AssetError>;

    fn load_mesh(&mut self, path: &str) -> Result<MeshData, AssetError>;

    /// Mesh plus diffuse and the optional normal/specular maps.
    fn load_model(&mut self, spec: &ModelSpec) -> Result<ModelData, AssetError> {
        let mesh = self.load_mesh(&spec.path)?;
        let diffuse = self.load_image(&spec.diffuse)?;
        let normal = spec.normal.as_deref().map(|p| self.load_image(p)).transpose()?;
        let specular = spec
            .specular
            .as_deref()
            .map(|p| self.load_image(p))
            .transpose()?;
        Ok(ModelData {
            mesh,
            diffuse,
            normal,
            specular,
        })
    }
}

/// Reads PNG and glTF files relative to an asset root.
#[derive(Debug, Clone)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let full = self.root.join(path);
        if full.is_file() {
            Ok(full)
        } else {
            Err(AssetError::NotFound(full.display().to_string()))
        }
    }
}

impl AssetLoader for FsAssetLoader {
    fn load_image(&mut self, path: &str) -> Result<RgbaImage, AssetError> {
        let full = self.resolve(path)?;
        let img = image::open(&full).map_err(|source| AssetError::Image {
            path: full.display().to_string(),
            source,
        })?;
        tracing::debug!(path, width = img.width(), height = img.height(), "loaded image");
        Ok(img.to_rgba8())
    }

    fn load_mesh(&mut self, path: &str) -> Result<MeshData, AssetError> {
        let full = self.resolve(path)?;
        MeshData::from_gltf(&full)
    }
}

/// Generates stand-in assets so tools and tests run without asset files.
///
/// Images are deterministic per path: a checkerboard tinted by a hash of the
/// path. Normal maps (`*normal*`, `*_n.png`) are flat; specular maps
/// (`*specular*`, `*_s.png`) are grey.
/// Every mesh is a door frame plus a door leaf sized to one cell.
#[derive(Debug)]
pub struct PlaceholderLoader {
    size: u32,
    requested: HashMap<String, u32>,
}

impl Default for PlaceholderLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderLoader {
    pub fn new() -> Self {
        Self {
            size: 32,
            requested: HashMap::new(),
        }
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    /// How many times `path` has been requested.
    pub fn requests(&self, path: &str) -> u32 {
        self.requested.get(path).copied().unwrap_or(0)
    }

    fn note(&mut self, path: &str) {
        *self.requested.entry(path.to_string()).or_default() += 1;
    }
}

fn tint(path: &str) -> [u8; 4] {
    // FNV-1a
    let mut h: u32 = 0x811c_9dc5;
    for b in path.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    let [r, g, b, _] = h.to_le_bytes();
    [r | 0x40, g | 0x40, b | 0x40, 255]
}

impl AssetLoader for PlaceholderLoader {
    fn load_image(&mut self, path: &str) -> Result<RgbaImage, AssetError> {
        self.note(path);
        let size = self.size;
        let lower = path.to_ascii_lowercase();
        let img = if lower.contains("normal") || lower.ends_with("_n.png") {
            flat_normal_map(size, size)
        } else if lower.contains("specular") || lower.ends_with("_s.png") {
            solid(size, size, [96, 96, 96, 255])
        } else {
            let a = tint(path);
            let b = [a[0] / 2, a[1] / 2, a[2] / 2, 255];
            checker(size, size, (size / 4).max(1), a, b)
        };
        Ok(img)
    }

    fn load_mesh(&mut self, path: &str) -> Result<MeshData, AssetError> {
        self.note(path);
        // Origin on the floor, one cell wide and tall.
        let half = 1.5;
        let top = 2.0 * half;
        let mut mesh = MeshData::default();
        let frame = [
            box_mesh(Vec3::new(-half, 0.0, -0.2), Vec3::new(-half + 0.3, top, 0.2)),
            box_mesh(Vec3::new(half - 0.3, 0.0, -0.2), Vec3::new(half, top, 0.2)),
            box_mesh(Vec3::new(-half, top - 0.3, -0.2), Vec3::new(half, top, 0.2)),
        ];
        mesh.push_object("frame", frame.into_iter().flatten());
        mesh.push_object(
            "door",
            box_mesh(
                Vec3::new(-half + 0.3, 0.0, -0.1),
                Vec3::new(half - 0.3, top - 0.3, 0.1),
            ),
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_loader_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        solid(3, 2, [10, 20, 30, 255])
            .save(dir.path().join("wall.png"))
            .unwrap();
        let mut loader = FsAssetLoader::new(dir.path());
        let img = loader.load_image("wall.png").unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn fs_loader_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = FsAssetLoader::new(dir.path());
        assert!(matches!(
            loader.load_image("nope.png"),
            Err(AssetError::NotFound(_))
        ));
        let spec = ModelSpec::new("door.gltf", "door.png");
        assert!(matches!(
            loader.load_model(&spec),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn fs_loader_rejects_garbage_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let mut loader = FsAssetLoader::new(dir.path());
        assert!(matches!(
            loader.load_image("bad.png"),
            Err(AssetError::Image { .. })
        ));
    }

    #[test]
    fn placeholder_model_has_door_objects() {
        let mut loader = PlaceholderLoader::new();
        let mut spec = ModelSpec::new("door.gltf", "door.png");
        spec.normal = Some("door_normal.png".into());
        let model = loader.load_model(&spec).unwrap();
        assert!(model.mesh.object("frame").is_some());
        assert_eq!(model.mesh.object("door").unwrap().count, 36);
        assert_eq!(model.normal.unwrap().get_pixel(0, 0).0, [128, 128, 255, 255]);
        assert!(model.specular.is_none());
        assert_eq!(loader.requests("door.png"), 1);
    }

    #[test]
    fn placeholder_images_are_deterministic() {
        let mut a = PlaceholderLoader::new().with_image_size(8);
        let mut b = PlaceholderLoader::new().with_image_size(8);
        assert_eq!(
            a.load_image("monster_front.png").unwrap(),
            b.load_image("monster_front.png").unwrap()
        );
        assert_ne!(
            a.load_image("monster_front.png").unwrap(),
            a.load_image("monster_back.png").unwrap()
        );
    }
}
