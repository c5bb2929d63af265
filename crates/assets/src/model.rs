use std::ops::Range;
use std::path::Path;

use crawl_common::{TexturedVertex, generate_tangents};
use glam::{Mat3, Mat4, Vec2, Vec3};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::AssetError;

/// File references for one renderable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub path: String,
    pub diffuse: String,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
}

impl ModelSpec {
    pub fn new(path: impl Into<String>, diffuse: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diffuse: diffuse.into(),
            normal: None,
            specular: None,
        }
    }
}

/// A named vertex range inside a model, e.g. `"frame"` or `"door"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelObject {
    pub name: String,
    pub first: u32,
    pub count: u32,
}

impl ModelObject {
    pub fn range(&self) -> Range<u32> {
        self.first..self.first + self.count
    }
}

/// Non-indexed triangle list split into named objects.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<TexturedVertex>,
    pub objects: Vec<ModelObject>,
}

impl MeshData {
    pub fn object(&self, name: &str) -> Option<&ModelObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Append a named triangle list.
    pub fn push_object(&mut self, name: impl Into<String>, vertices: impl IntoIterator<Item = TexturedVertex>) {
        let first = self.vertices.len() as u32;
        self.vertices.extend(vertices);
        let count = self.vertices.len() as u32 - first;
        self.objects.push(ModelObject {
            name: name.into(),
            first,
            count,
        });
    }

    /// Import every triangle primitive of a glTF file; one object per mesh node.
    pub fn from_gltf(path: &Path) -> Result<Self, AssetError> {
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(AssetError::NotFound(shown));
        }
        let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
            path: shown.clone(),
            source,
        })?;

        let mut mesh = MeshData::default();
        let scene = document.default_scene().or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                visit_node(&node, Mat4::IDENTITY, &buffers, &mut mesh);
            }
        }
        if mesh.vertices.is_empty() {
            return Err(AssetError::EmptyModel(shown));
        }

        let fallbacks = generate_tangents(&mut mesh.vertices);
        tracing::info!(
            path = %shown,
            vertices = mesh.vertices.len(),
            objects = mesh.objects.len(),
            degenerate_uv_triangles = fallbacks,
            "loaded model"
        );
        Ok(mesh)
    }
}

fn visit_node(node: &gltf::Node, parent: Mat4, buffers: &[gltf::buffer::Data], mesh: &mut MeshData) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(m) = node.mesh() {
        let name = node
            .name()
            .or_else(|| m.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("object{}", mesh.objects.len()));
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

        let mut vertices = Vec::new();
        for primitive in m.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                tracing::warn!(object = %name, mode = ?primitive.mode(), "skipping non-triangle primitive");
                continue;
            }
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| &d.0[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
            let normals: Vec<Vec3> = reader
                .read_normals()
                .map(|n| n.map(Vec3::from).collect())
                .unwrap_or_default();
            let uvs: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().map(Vec2::from).collect())
                .unwrap_or_default();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(i) => i.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            for &i in &indices {
                let i = i as usize;
                let Some(&p) = positions.get(i) else {
                    continue;
                };
                let n = normals.get(i).copied().unwrap_or(Vec3::Y);
                let uv = uvs.get(i).copied().unwrap_or(Vec2::ZERO);
                vertices.push(TexturedVertex::new(
                    world.transform_point3(p),
                    uv,
                    (normal_matrix * n).normalize_or_zero(),
                ));
            }
        }
        // A stray index can leave a partial triangle; drop it.
        vertices.truncate(vertices.len() - vertices.len() % 3);
        if !vertices.is_empty() {
            mesh.push_object(name, vertices);
        }
    }
    for child in node.children() {
        visit_node(&child, world, buffers, mesh);
    }
}

/// A loaded model: geometry plus its textures.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub mesh: MeshData,
    pub diffuse: RgbaImage,
    pub normal: Option<RgbaImage>,
    pub specular: Option<RgbaImage>,
}

/// Axis-aligned box from `min` to `max` with outward normals and per-face UVs.
pub fn box_mesh(min: Vec3, max: Vec3) -> Vec<TexturedVertex> {
    let c = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    // Each face: four corners counter-clockwise seen from outside, and the normal.
    let faces = [
        ([c(false, false, true), c(true, false, true), c(true, true, true), c(false, true, true)], Vec3::Z),
        ([c(true, false, false), c(false, false, false), c(false, true, false), c(true, true, false)], Vec3::NEG_Z),
        ([c(true, false, true), c(true, false, false), c(true, true, false), c(true, true, true)], Vec3::X),
        ([c(false, false, false), c(false, false, true), c(false, true, true), c(false, true, false)], Vec3::NEG_X),
        ([c(false, true, true), c(true, true, true), c(true, true, false), c(false, true, false)], Vec3::Y),
        ([c(false, false, false), c(true, false, false), c(true, false, true), c(false, false, true)], Vec3::NEG_Y),
    ];
    let uvs = [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)];

    let mut out = Vec::with_capacity(36);
    for (corners, normal) in faces {
        for i in [0, 1, 2, 0, 2, 3] {
            out.push(TexturedVertex::new(corners[i], uvs[i], normal));
        }
    }
    generate_tangents(&mut out);
    out
}
