use std::fmt::Write as _;
use std::ops::Range;

use crawl_assets::{Atlas, ModelData, RgbaImage, fit_to, flat_normal_map, solid};
use crawl_common::{MeshVertex, ModelHandle, TexturedVertex};
use crawl_level::Level;
use crawl_lighting::Light;

use crate::batch::{LevelBatches, ModelBatch, RenderBatch};
use crate::camera::Camera;
use crate::frustum::Frustum;
use crate::lights::RenderLight;
use crate::plan::{FramePlan, PassCommand};
use crate::settings::RenderSettings;
use crate::stats::{FrameStats, FrameTimer};

/// Edge length of every wall texture layer.
pub const WALL_TEXTURE_SIZE: u32 = 64;

/// Diffuse, normal and specular maps for the three wall layers, in
/// [`crawl_common::WallTexture::LAYERS`] order.
#[derive(Debug, Clone)]
pub struct WallTextures {
    pub diffuse: [RgbaImage; 3],
    pub normal: [RgbaImage; 3],
    pub specular: [RgbaImage; 3],
}

impl WallTextures {
    /// Resizes every layer to [`WALL_TEXTURE_SIZE`].
    pub fn new(diffuse: [RgbaImage; 3], normal: [RgbaImage; 3], specular: [RgbaImage; 3]) -> Self {
        let fit = |layers: [RgbaImage; 3]| {
            layers.map(|img| fit_to(img, WALL_TEXTURE_SIZE, WALL_TEXTURE_SIZE))
        };
        Self {
            diffuse: fit(diffuse),
            normal: fit(normal),
            specular: fit(specular),
        }
    }

    /// Flat grey layers with neutral normals.
    pub fn plain() -> Self {
        let s = WALL_TEXTURE_SIZE;
        Self {
            diffuse: std::array::from_fn(|_| solid(s, s, [160, 160, 160, 255])),
            normal: std::array::from_fn(|_| flat_normal_map(s, s)),
            specular: std::array::from_fn(|_| solid(s, s, [0, 0, 0, 255])),
        }
    }
}

/// Render-side state for one level: camera, batches, lights, models and textures.
///
/// Owned by the frame loop next to the [`Level`] it draws.
#[derive(Debug)]
pub struct LevelRenderer {
    pub camera: Camera,
    pub settings: RenderSettings,
    pub(crate) frustum: Frustum,
    pub(crate) batches: LevelBatches,
    pub(crate) lights: Vec<Light>,
    pub(crate) render_lights: Vec<RenderLight>,
    pub(crate) stats: FrameStats,
    pub(crate) timer: FrameTimer,
    models: Vec<ModelData>,
    door_model: Option<ModelHandle>,
    sprite_atlas: Atlas,
    walls: WallTextures,
}

impl LevelRenderer {
    pub fn new(settings: RenderSettings, sprite_atlas: Atlas, walls: WallTextures) -> Self {
        Self {
            camera: Camera::default(),
            settings,
            frustum: Frustum::new(),
            batches: LevelBatches::default(),
            lights: Vec::new(),
            render_lights: Vec::new(),
            stats: FrameStats::default(),
            timer: FrameTimer::default(),
            models: Vec::new(),
            door_model: None,
            sprite_atlas,
            walls,
        }
    }

    /// Take ownership of a model and return its handle.
    pub fn load_model(&mut self, model: ModelData) -> ModelHandle {
        let handle = ModelHandle(self.models.len() as u32);
        tracing::debug!(
            handle = handle.0,
            vertices = model.mesh.vertices.len(),
            objects = model.mesh.objects.len(),
            "model registered"
        );
        self.models.push(model);
        handle
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&ModelData> {
        self.models.get(handle.index())
    }

    pub fn models(&self) -> &[ModelData] {
        &self.models
    }

    pub fn door_model(&self) -> Option<ModelHandle> {
        self.door_model
    }

    pub fn set_door_model(&mut self, handle: ModelHandle) {
        self.door_model = Some(handle);
    }

    /// Vertex range a model batch draws, or `None` (logged) when the handle
    /// or the named object does not exist.
    pub fn resolve_model_draw(&self, batch: &ModelBatch) -> Option<Range<u32>> {
        let Some(model) = self.model(batch.model) else {
            tracing::warn!(handle = batch.model.0, "batch refers to a missing model");
            return None;
        };
        if batch.whole() {
            return Some(0..model.mesh.vertices.len() as u32);
        }
        match model.mesh.object(batch.object) {
            Some(object) => Some(object.range()),
            None => {
                tracing::warn!(
                    handle = batch.model.0,
                    object = batch.object,
                    "model has no such object"
                );
                None
            }
        }
    }

    /// Rebuild the depth-sorted batches from the level and the current camera.
    pub fn rebuild_batches(&mut self, level: &Level) {
        self.batches = crate::batch::build_batches(
            level,
            self.camera.position,
            self.camera.front(),
            &self.sprite_atlas.slots,
            self.door_model,
        );
    }

    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches.batches
    }

    pub fn level_batches(&self) -> &LevelBatches {
        &self.batches
    }

    pub fn geometry_mesh(&self) -> &[MeshVertex] {
        &self.batches.geometry_mesh
    }

    pub fn sprite_mesh(&self) -> &[TexturedVertex] {
        &self.batches.sprite_mesh
    }

    pub fn set_lights(&mut self, lights: Vec<Light>) {
        self.lights = lights;
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn render_lights(&self) -> &[RenderLight] {
        &self.render_lights
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn sprite_atlas(&self) -> &Atlas {
        &self.sprite_atlas
    }

    pub fn walls(&self) -> &WallTextures {
        &self.walls
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn frame_timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn render_size(&self) -> (u32, u32) {
        (self.settings.render_width, self.settings.render_height)
    }

    pub fn aspect(&self) -> f32 {
        self.settings.aspect()
    }
}

/// Backend-agnostic interface. A renderer consumes a frame plan built by
/// [`crate::render_level`]; it never mutates the level.
pub trait Renderer {
    type Output;

    fn render(&mut self, level: &Level, renderer: &LevelRenderer, plan: &FramePlan) -> Self::Output;
}

/// Describes each frame as text. Used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, level: &Level, renderer: &LevelRenderer, plan: &FramePlan) -> String {
        let mut out = String::new();
        let cam = &renderer.camera;
        let player = level.player;
        let _ = writeln!(
            out,
            "=== Frame (player=({}, {}) facing=({}, {}) freecam={}) ===",
            player.cell.x, player.cell.y, player.direction.x, player.direction.y, level.freecam
        );
        let _ = writeln!(
            out,
            "Camera: pos=({:.2}, {:.2}, {:.2}) yaw={:.1} pitch={:.1} animations={}",
            cam.position.x,
            cam.position.y,
            cam.position.z,
            cam.yaw(),
            cam.pitch(),
            cam.pending_animations()
        );
        let stats = renderer.stats();
        let _ = writeln!(
            out,
            "Batches: {} (cells rendered={}) lights={} shadowed={}",
            stats.batches,
            stats.cells_rendered,
            plan.render_lights.len(),
            plan.render_lights.iter().filter(|l| l.shadow).count()
        );
        for cmd in &plan.commands {
            match cmd {
                PassCommand::DepthPrePass { geometry, models } => {
                    let _ = writeln!(out, "  depth: geometry={} models={}", geometry.len(), models.len());
                }
                PassCommand::Shadow {
                    slot,
                    light,
                    position,
                    models,
                    ..
                } => {
                    let _ = writeln!(
                        out,
                        "  shadow[{slot}]: light={light} at ({:.2}, {:.2}, {:.2}) models={}",
                        position.x,
                        position.y,
                        position.z,
                        models.len()
                    );
                }
                PassCommand::Main { draws } => {
                    let _ = writeln!(out, "  main: draws={}", draws.len());
                }
                PassCommand::Present => {
                    let _ = writeln!(out, "  present");
                }
            }
        }
        for door in &level.doors {
            let _ = writeln!(
                out,
                "  door ({}, {}) {:?} offset={:.2}",
                door.cell.x,
                door.cell.y,
                door.phase(),
                door.offset_y
            );
        }
        out
    }
}
