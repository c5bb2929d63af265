use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crawl_assets::{FsAssetLoader, PlaceholderLoader};
use crawl_common::CellCoord;
use crawl_input::Action;
use crawl_level::{Level, LevelEvent};
use crawl_render::{
    DebugTextRenderer, LevelManifest, LevelRenderer, Renderer, apply_action, load_level,
    render_level, update_level, update_level_renderer,
};
use glam::IVec2;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crawl-cli", about = "Headless tools for crawl levels")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LevelArgs {
    /// Level manifest (YAML); the built-in test level when omitted
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Read assets from this directory instead of generating placeholders
    #[arg(long)]
    assets: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and a summary of the level
    Info {
        #[command(flatten)]
        level: LevelArgs,
    },
    /// Print the propagated light level of every cell
    Lightmap {
        #[command(flatten)]
        level: LevelArgs,
    },
    /// Run frames without a window and print what the renderer would draw
    Simulate {
        #[command(flatten)]
        level: LevelArgs,
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Seconds per frame
        #[arg(long, default_value = "0.016666668")]
        dt: f32,
        /// Actions to issue, one every `--spacing` frames
        #[arg(short, long, value_enum, value_delimiter = ',')]
        actions: Vec<ActionArg>,
        /// Frames between two actions
        #[arg(long, default_value = "30")]
        spacing: u32,
        /// Print every frame instead of only the last one
        #[arg(long)]
        trace: bool,
        /// Emit one JSON record per frame instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionArg {
    Forward,
    Backward,
    Left,
    Right,
    TurnLeft,
    TurnRight,
    Open,
    Freecam,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Forward => Action::MoveForward,
            ActionArg::Backward => Action::MoveBackward,
            ActionArg::Left => Action::MoveLeft,
            ActionArg::Right => Action::MoveRight,
            ActionArg::TurnLeft => Action::TurnLeft,
            ActionArg::TurnRight => Action::TurnRight,
            ActionArg::Open => Action::OpenDoor,
            ActionArg::Freecam => Action::ToggleFreecam,
        }
    }
}

#[derive(Serialize)]
struct FrameRecord {
    frame: u32,
    player: CellCoord,
    facing: IVec2,
    freecam: bool,
    camera: [f32; 3],
    batches: usize,
    cells_rendered: usize,
    render_lights: usize,
    shadow_passes: usize,
    events: Vec<LevelEvent>,
}

fn load(args: &LevelArgs) -> Result<(String, Level, LevelRenderer)> {
    let manifest = match &args.manifest {
        Some(path) => LevelManifest::load(path)
            .with_context(|| format!("failed to load manifest {}", path.display()))?,
        None => LevelManifest::builtin().context("built-in manifest is invalid")?,
    };
    let settings = manifest.render_settings();
    let loaded = match &args.assets {
        Some(dir) => load_level(&manifest, &mut FsAssetLoader::new(dir), &settings),
        None => load_level(&manifest, &mut PlaceholderLoader::new(), &settings),
    };
    let (level, renderer) =
        loaded.with_context(|| format!("failed to load level {}", manifest.name))?;
    Ok((manifest.name, level, renderer))
}

/// The action issued at `frame`, if one is due.
fn action_at(actions: &[ActionArg], spacing: u32, frame: u32) -> Option<Action> {
    let spacing = spacing.max(1);
    if frame % spacing != 0 {
        return None;
    }
    actions.get((frame / spacing) as usize).map(|&a| a.into())
}

fn simulate(
    args: &LevelArgs,
    frames: u32,
    dt: f32,
    actions: &[ActionArg],
    spacing: u32,
    trace: bool,
    json: bool,
) -> Result<()> {
    let (name, mut level, mut renderer) = load(args)?;
    tracing::info!(level = %name, frames, dt, "simulating");
    let mut text = DebugTextRenderer::new();

    for frame in 0..frames {
        if let Some(action) = action_at(actions, spacing, frame) {
            tracing::debug!(frame, ?action, "issuing action");
            apply_action(&mut level, &mut renderer, action);
        }
        update_level(&mut level, &mut renderer, dt);
        update_level_renderer(&mut renderer, dt);
        let plan = render_level(&mut renderer, dt);
        let events = level.drain_events();
        let last = frame + 1 == frames;

        if json {
            let stats = renderer.stats();
            let record = FrameRecord {
                frame,
                player: level.player.cell,
                facing: level.player.direction,
                freecam: level.freecam,
                camera: renderer.camera.position.to_array(),
                batches: stats.batches,
                cells_rendered: stats.cells_rendered,
                render_lights: stats.render_lights,
                shadow_passes: plan.shadow_passes(),
                events,
            };
            println!("{}", serde_json::to_string(&record)?);
        } else if trace || last {
            for event in &events {
                println!("event: {event:?}");
            }
            print!("{}", text.render(&level, &renderer, &plan));
        }
    }

    let timer = renderer.frame_timer();
    tracing::info!(
        frames = timer.count(),
        avg_ms = timer.average().as_secs_f64() * 1000.0,
        "simulation finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { level } => {
            println!("crawl-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", crawl_common::crate_info());
            println!("lighting: {}", crawl_lighting::crate_info());
            println!("level: {}", crawl_level::crate_info());
            println!("input: {}", crawl_input::crate_info());
            println!("assets: {}", crawl_assets::crate_info());
            println!("render: {}", crawl_render::crate_info());
            println!("render-wgpu: {}", crawl_render_wgpu::crate_info());

            let (name, level, renderer) = load(&level)?;
            println!();
            println!("Level: {name} ({}x{}, seed={})", level.width(), level.height(), level.seed());
            println!(
                "Player: ({}, {}) facing ({}, {})",
                level.player.cell.x,
                level.player.cell.y,
                level.player.direction.x,
                level.player.direction.y
            );
            println!("Lights: {}", level.lights().len());
            println!("Doors: {}", level.doors.len());
            println!(
                "Sprites: {} monsters, {} objects",
                level.monsters.len(),
                level.objects.len()
            );
            println!("Model instances: {}", level.model_instances.len());
            println!(
                "Render: {}x{}, shadows={}",
                renderer.settings.render_width,
                renderer.settings.render_height,
                renderer.settings.shadows
            );
        }
        Commands::Lightmap { level } => {
            let (name, level, _) = load(&level)?;
            println!("Light map for {name}:");
            for row in level.light_map().to_rows() {
                println!("{row}");
            }
        }
        Commands::Simulate {
            level,
            frames,
            dt,
            actions,
            spacing,
            trace,
            json,
        } => simulate(&level, frames, dt, &actions, spacing, trace, json)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_are_spaced() {
        let actions = [ActionArg::Forward, ActionArg::Open];
        assert_eq!(action_at(&actions, 10, 0), Some(Action::MoveForward));
        assert_eq!(action_at(&actions, 10, 5), None);
        assert_eq!(action_at(&actions, 10, 10), Some(Action::OpenDoor));
        assert_eq!(action_at(&actions, 10, 20), None);
    }

    #[test]
    fn zero_spacing_issues_every_frame() {
        let actions = [ActionArg::TurnLeft, ActionArg::TurnRight];
        assert_eq!(action_at(&actions, 0, 1), Some(Action::TurnRight));
    }

    #[test]
    fn cli_parses_action_list() {
        let cli = Cli::try_parse_from([
            "crawl-cli",
            "simulate",
            "--frames",
            "5",
            "--actions",
            "forward,turn-left,open",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate { frames, actions, .. } => {
                assert_eq!(frames, 5);
                assert_eq!(actions.len(), 3);
                assert!(matches!(actions[1], ActionArg::TurnLeft));
            }
            _ => panic!("expected simulate"),
        }
    }
}
