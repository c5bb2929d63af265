//! Level loading and the per-tick entry points of the frame loop.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crawl_assets::{AssetError, AssetLoader, AtlasBuilder};
use crawl_common::{CUBE_SIZE, CellCoord, ModelHandle};
use crawl_input::{Action, HeldKeys};
use crawl_level::{Level, LevelError};
use glam::{Mat4, Vec2};

use crate::batch::RenderBatch;
use crate::lights::{MAX_SHADOW_LIGHTS, assign_render_lights, shader_lights};
use crate::manifest::{LevelManifest, ManifestError};
use crate::plan::{FramePlan, PassCommand, ShadingFeatures, ViewUniforms, shadow_view_projections};
use crate::renderer::{LevelRenderer, WallTextures};
use crate::settings::RenderSettings;
use crate::stats::FrameStats;

const ATLAS_WIDTH: u32 = 2048;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("instance refers to unknown model '{0}'")]
    UnknownModel(String),
}

/// Load a level and everything needed to draw it.
///
/// Missing textures or models are fatal. Sprite textures are packed into one
/// atlas and their slots written back into the blueprints before spawning.
pub fn load_level(
    manifest: &LevelManifest,
    loader: &mut dyn AssetLoader,
    settings: &RenderSettings,
) -> Result<(Level, LevelRenderer), SceneError> {
    let _span = tracing::info_span!("load_scene", name = %manifest.name).entered();

    let mut blueprints = manifest.blueprints()?;
    let mut atlas = AtlasBuilder::new(ATLAS_WIDTH);
    for bp in &mut blueprints {
        let paths = bp.texture_paths();
        let mut slots = [0u32; 4];
        for (i, path) in paths.iter().enumerate() {
            slots[i] = atlas.add(loader.load_image(path)?);
        }
        if bp.is_unidirectional() {
            slots = [slots[0]; 4];
        }
        bp.textures = slots;
    }
    let atlas = atlas.build();

    let mut level = Level::load(manifest.grid()?, blueprints, manifest.seed)?;
    if settings.brightness != 1.0 {
        let scaled = level.light_map().clone().with_brightness_scale(settings.brightness);
        level.set_light_map(scaled);
    }

    let walls = load_walls(manifest, loader)?;
    let mut renderer = LevelRenderer::new(settings.clone(), atlas, walls);
    renderer.set_lights(level.lights().to_vec());

    let door = renderer.load_model(loader.load_model(&manifest.door_model)?);
    renderer.set_door_model(door);

    let mut handles: BTreeMap<&str, ModelHandle> = BTreeMap::new();
    for (name, spec) in &manifest.models {
        let handle = renderer.load_model(loader.load_model(spec)?);
        handles.insert(name.as_str(), handle);
    }
    for inst in &manifest.instances {
        let handle = *handles
            .get(inst.model.as_str())
            .ok_or_else(|| SceneError::UnknownModel(inst.model.clone()))?;
        level.create_model_instance(CellCoord::new(inst.x, inst.y), inst.align, inst.scale, handle);
    }

    renderer.camera.position = level.player.cell.world_center();
    renderer.rebuild_batches(&level);

    tracing::info!(
        name = %manifest.name,
        models = renderer.models().len(),
        instances = level.model_instances.len(),
        sprites = renderer.sprite_atlas().slots.len(),
        "scene ready"
    );
    Ok((level, renderer))
}

fn load_walls(
    manifest: &LevelManifest,
    loader: &mut dyn AssetLoader,
) -> Result<WallTextures, AssetError> {
    let [wall, floor, ceiling] = manifest.walls.layers();
    let mut load = |path: &String| loader.load_image(path);
    Ok(WallTextures::new(
        [load(&wall.diffuse)?, load(&floor.diffuse)?, load(&ceiling.diffuse)?],
        [load(&wall.normal)?, load(&floor.normal)?, load(&ceiling.normal)?],
        [load(&wall.specular)?, load(&floor.specular)?, load(&ceiling.specular)?],
    ))
}

/// Advance doors, pin the camera height and rebuild the batches.
pub fn update_level(level: &mut Level, renderer: &mut LevelRenderer, dt: f32) {
    let _span = tracing::info_span!("update_level").entered();
    level.update(dt);
    if !level.freecam {
        renderer.camera.position.y = renderer.settings.camera_height;
    }
    renderer.rebuild_batches(level);
}

/// Advance the camera animation.
pub fn update_level_renderer(renderer: &mut LevelRenderer, dt: f32) {
    renderer.camera.update(dt);
}

/// Build this frame's plan: cull, assign lights, then list the passes.
pub fn render_level(renderer: &mut LevelRenderer, dt: f32) -> FramePlan {
    let _span = tracing::info_span!("render_level").entered();
    let start = Instant::now();
    let settings = renderer.settings.clone();

    let view = renderer
        .camera
        .render_view(settings.head_tilt, settings.camera_pullback);
    renderer
        .frustum
        .set_internals(settings.fov, settings.aspect(), settings.near, settings.far);
    renderer.frustum.set_view(view.eye, view.target(), view.up);

    let render_lights =
        assign_render_lights(&renderer.lights, &renderer.frustum, renderer.camera.position);
    let mut lights = shader_lights(&render_lights, &renderer.lights);
    if !settings.shadows {
        for l in &mut lights {
            l.shadow = false;
        }
    }

    let mut visible_geometry = Vec::new();
    let mut models = Vec::new();
    let mut draws = Vec::with_capacity(renderer.batches().len());
    for (i, batch) in renderer.batches().iter().enumerate() {
        match batch {
            RenderBatch::Geometry { position, .. } => {
                if !renderer.frustum.cell_visible(*position) {
                    continue;
                }
                visible_geometry.push(i);
            }
            RenderBatch::Model(_) => models.push(i),
            RenderBatch::Sprite { .. } => {}
        }
        draws.push(i);
    }

    let mut commands = vec![PassCommand::DepthPrePass {
        geometry: visible_geometry.clone(),
        models: models.clone(),
    }];
    if settings.shadows {
        for (slot, rl) in render_lights.iter().take(MAX_SHADOW_LIGHTS).enumerate() {
            if !rl.shadow {
                continue;
            }
            let Some(light) = renderer.lights.get(rl.light) else {
                continue;
            };
            commands.push(PassCommand::Shadow {
                slot,
                light: rl.light,
                position: light.position,
                faces: shadow_view_projections(light.position),
                models: models.clone(),
            });
        }
    }
    commands.push(PassCommand::Main { draws });
    commands.push(PassCommand::Present);

    let plan = FramePlan {
        view: ViewUniforms {
            view: view.view_matrix(),
            projection: Mat4::perspective_rh(
                settings.fov.to_radians(),
                settings.aspect(),
                settings.near,
                settings.far,
            ),
            eye: view.eye,
            right: view.right,
            up: view.up,
        },
        features: ShadingFeatures {
            shadows: settings.shadows,
            normal_mapping: settings.normal_mapping,
            specular_mapping: settings.specular_mapping,
        },
        render_lights: render_lights.clone(),
        shader_lights: lights,
        commands,
    };

    renderer.stats = FrameStats {
        cells_rendered: visible_geometry.len(),
        batches: renderer.batches().len(),
        render_lights: render_lights.len(),
        shadow_passes: plan.shadow_passes(),
        cpu_time: start.elapsed(),
    };
    renderer.render_lights = render_lights;
    renderer
        .timer
        .record(Duration::try_from_secs_f32(dt.max(0.0)).unwrap_or_default());

    tracing::trace!(
        cells = renderer.stats.cells_rendered,
        batches = renderer.stats.batches,
        lights = renderer.stats.render_lights,
        shadows = renderer.stats.shadow_passes,
        "frame planned"
    );
    plan
}

/// Apply one discrete action. Accepted moves and turns queue a camera animation.
pub fn apply_action(level: &mut Level, renderer: &mut LevelRenderer, action: Action) {
    match action {
        Action::OpenDoor => {
            level.use_door();
        }
        Action::ToggleFreecam => {
            let enabled = level.toggle_freecam();
            tracing::info!(enabled, "freecam toggled");
        }
        _ => {
            let Some(movement) = action.movement() else {
                return;
            };
            if let Some((movement, duration)) = level.move_player(movement) {
                let distance = if movement.is_turn() { 0.0 } else { CUBE_SIZE };
                renderer.camera.animate(movement, duration, distance);
            }
        }
    }
}

/// Free-fly movement and mouse look; does nothing outside freecam.
pub fn apply_freecam(
    level: &Level,
    renderer: &mut LevelRenderer,
    held: HeldKeys,
    mouse: Vec2,
    dt: f32,
) {
    use crawl_common::Movement;

    if !level.freecam {
        return;
    }
    let camera = &mut renderer.camera;
    for (down, movement) in [
        (held.forward, Movement::Forward),
        (held.backward, Movement::Backward),
        (held.left, Movement::Left),
        (held.right, Movement::Right),
    ] {
        if down {
            camera.process_keyboard(movement, dt);
        }
    }
    if mouse != Vec2::ZERO {
        camera.process_mouse(mouse.x, mouse.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_assets::PlaceholderLoader;
    use crawl_level::DoorPhase;
    use glam::Vec3;

    use crate::renderer::{DebugTextRenderer, Renderer};

    fn small_manifest() -> LevelManifest {
        let mut m = LevelManifest::builtin().unwrap();
        m.map = [
            "#########",
            "#   M   #",
            "#       #",
            "#  W    #",
            "#       #",
            "#       #",
            "#  D    #",
            "#P 4    #",
            "#########",
        ]
        .map(String::from)
        .to_vec();
        m.instances.clear();
        m
    }

    fn load(m: &LevelManifest) -> (Level, LevelRenderer) {
        let mut loader = PlaceholderLoader::new().with_image_size(8);
        load_level(m, &mut loader, &RenderSettings::default()).unwrap()
    }

    #[test]
    fn end_to_end_update() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        assert_eq!(level.player.cell, CellCoord::new(1, 7));
        let doors = level.doors.clone();

        update_level(&mut level, &mut renderer, 0.016);
        assert_eq!(level.doors, doors);

        let open_cells = level.grid().iter().filter(|(_, s)| *s != b'#').count();
        let built = renderer.level_batches();
        assert_eq!(built.geometry_count(), open_cells);
        assert_eq!(built.sprite_count(), level.monsters.len());
        assert_eq!(level.monsters.len(), 2);
        assert_eq!(renderer.camera.position.y, 0.25);
    }

    #[test]
    fn door_free_level_lights_and_batches() {
        let mut manifest = small_manifest();
        manifest.map = [
            "#########",
            "#       #",
            "# M     #",
            "#       #",
            "#       #",
            "#       #",
            "#       #",
            "#P 4    #",
            "#########",
        ]
        .map(String::from)
        .to_vec();
        let (mut level, mut renderer) = load(&manifest);
        assert_eq!(level.player.cell, CellCoord::new(1, 7));
        assert!(level.doors.is_empty());

        // One hop costs one level from the torch at (3,7).
        let lights = level.light_map();
        assert_eq!(lights.level(3, 7), 7);
        assert_eq!(lights.level(2, 7), 6);
        assert_eq!(lights.level(1, 7), 5);
        assert_eq!(lights.level(3, 6), 6);
        assert_eq!(lights.level(3, 2), 2);
        assert_eq!(lights.level(7, 1), 0);
        // Walls are lit but do not pass light on.
        assert_eq!(lights.level(3, 8), 6);
        assert_eq!(lights.level(0, 7), 4);

        update_level(&mut level, &mut renderer, 0.016);
        assert!(level.doors.is_empty());
        let built = renderer.level_batches();
        assert_eq!(built.geometry_count(), 49);
        assert_eq!(level.monsters.len(), 1);
        assert_eq!(built.sprite_count(), 1);
        assert_eq!(built.batches.len(), 50);
    }

    #[test]
    fn builtin_scene_loads_with_placeholders() {
        let manifest = LevelManifest::builtin().unwrap();
        let (level, renderer) = load(&manifest);
        // door model + torch, barrel, bench
        assert_eq!(renderer.models().len(), 4);
        assert_eq!(level.model_instances.len(), 18);
        // 3 directional blueprints x 4 facings + 2 unidirectional.
        assert_eq!(renderer.sprite_atlas().slots.len(), 14);
        assert!(level.objects.iter().all(|o| o.textures.iter().all(|&t| t == o.textures[0])));
        assert_eq!(renderer.camera.position, CellCoord::new(1, 7).world_center());
    }

    #[test]
    fn unknown_instance_model_fails() {
        let mut manifest = small_manifest();
        manifest.instances.push(crate::manifest::InstanceSpec {
            model: "statue".into(),
            x: 1,
            y: 1,
            align: crawl_common::CubeSide::North,
            scale: 1.0,
        });
        let mut loader = PlaceholderLoader::new();
        let err = load_level(&manifest, &mut loader, &RenderSettings::default()).unwrap_err();
        assert!(matches!(err, SceneError::UnknownModel(name) if name == "statue"));
    }

    #[test]
    fn frame_plan_pass_order() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        update_level(&mut level, &mut renderer, 0.016);
        let plan = render_level(&mut renderer, 0.016);

        assert!(matches!(plan.commands.first(), Some(PassCommand::DepthPrePass { .. })));
        assert!(matches!(plan.commands.last(), Some(PassCommand::Present)));
        let main_at = plan
            .commands
            .iter()
            .position(|c| matches!(c, PassCommand::Main { .. }))
            .unwrap();
        assert!(plan.commands[1..main_at]
            .iter()
            .all(|c| matches!(c, PassCommand::Shadow { .. })));
        assert!(plan.shadow_passes() <= MAX_SHADOW_LIGHTS);
        // The tier 4 light next to the player casts a shadow.
        assert_eq!(plan.shadow_passes(), 1);

        let stats = renderer.stats();
        assert!(stats.cells_rendered > 0);
        assert!(stats.cells_rendered <= renderer.level_batches().geometry_count());
        assert_eq!(renderer.frame_timer().count(), 1);

        // Main pass keeps depth-sorted order.
        let draws = plan.main_draws();
        assert!(draws.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn shadows_disabled_skip_shadow_passes() {
        let manifest = small_manifest();
        let mut loader = PlaceholderLoader::new().with_image_size(8);
        let settings = RenderSettings {
            shadows: false,
            ..RenderSettings::default()
        };
        let (mut level, mut renderer) = load_level(&manifest, &mut loader, &settings).unwrap();
        update_level(&mut level, &mut renderer, 0.016);
        let plan = render_level(&mut renderer, 0.016);
        assert_eq!(plan.shadow_passes(), 0);
        assert!(plan.shader_lights.iter().all(|l| !l.shadow));
    }

    #[test]
    fn actions_drive_level_and_camera() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        update_level(&mut level, &mut renderer, 0.0);

        // Facing north from (1,7); (1,6) is open.
        apply_action(&mut level, &mut renderer, Action::MoveForward);
        assert_eq!(level.player.cell, CellCoord::new(1, 6));
        assert_eq!(renderer.camera.pending_animations(), 1);
        update_level_renderer(&mut renderer, 0.35);
        let expected = CellCoord::new(1, 6).world_center() + Vec3::Y * 0.25;
        assert!((renderer.camera.position - expected).length() < 1e-4);

        // West of (1,6) is a wall.
        apply_action(&mut level, &mut renderer, Action::MoveLeft);
        assert_eq!(level.player.cell, CellCoord::new(1, 6));
        assert!(!renderer.camera.is_animating());

        apply_action(&mut level, &mut renderer, Action::TurnRight);
        assert_eq!(renderer.camera.pending_animations(), 1);
        update_level_renderer(&mut renderer, 0.25);
        assert!((renderer.camera.yaw() - 0.0).abs() < 1e-4);
    }

    #[test]
    fn door_opens_through_actions() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        // Two steps east put the door at (3,6) straight ahead.
        apply_action(&mut level, &mut renderer, Action::MoveRight);
        apply_action(&mut level, &mut renderer, Action::MoveRight);
        assert_eq!(level.player.cell, CellCoord::new(3, 7));
        apply_action(&mut level, &mut renderer, Action::OpenDoor);
        assert_eq!(level.doors[0].phase(), DoorPhase::Opening);
        for _ in 0..11 {
            update_level(&mut level, &mut renderer, 0.1);
        }
        assert_eq!(level.doors[0].phase(), DoorPhase::Open);
    }

    #[test]
    fn freecam_moves_only_when_enabled() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        let held = HeldKeys {
            forward: true,
            ..HeldKeys::default()
        };
        let start = renderer.camera.position;
        apply_freecam(&level, &mut renderer, held, Vec2::ZERO, 1.0);
        assert_eq!(renderer.camera.position, start);

        apply_action(&mut level, &mut renderer, Action::ToggleFreecam);
        apply_freecam(&level, &mut renderer, held, Vec2::new(0.0, -100.0), 1.0);
        assert!(renderer.camera.position.z < start.z);
        assert!(renderer.camera.pitch() > 0.0);
        // Freecam keeps its height across updates.
        renderer.camera.position.y = 2.0;
        update_level(&mut level, &mut renderer, 0.016);
        assert_eq!(renderer.camera.position.y, 2.0);
    }

    #[test]
    fn debug_text_describes_frame() {
        let manifest = small_manifest();
        let (mut level, mut renderer) = load(&manifest);
        update_level(&mut level, &mut renderer, 0.016);
        let plan = render_level(&mut renderer, 0.016);
        let text = DebugTextRenderer::new().render(&level, &renderer, &plan);
        assert!(text.contains("player=(1, 7)"));
        assert!(text.contains("depth:"));
        assert!(text.contains("present"));
        assert!(text.contains("door (3, 6) Closed"));
    }
}
