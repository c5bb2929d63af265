use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use crawl_assets::{FsAssetLoader, PlaceholderLoader};
use crawl_input::{Action, ActionQueue, InputState};
use crawl_level::Level;
use crawl_render::{
    FramePlan, LevelManifest, LevelRenderer, Renderer, apply_action, apply_freecam, load_level,
    render_level, update_level, update_level_renderer,
};
use crawl_render_wgpu::{GpuContext, GpuError, WgpuRenderer};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "crawl-desktop", about = "Walk through a crawl level")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Level manifest (YAML); the built-in test level when omitted
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory asset paths are resolved against
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    /// Generate textures and models instead of reading asset files
    #[arg(long)]
    placeholder: bool,

    /// Skip shadow cube passes
    #[arg(long)]
    no_shadows: bool,
}

/// Level, render state and input for one running level.
struct Session {
    name: String,
    level: Level,
    renderer: LevelRenderer,
    actions: ActionQueue,
    input: InputState,
    last_frame: Instant,
    last_title: Instant,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let manifest = match &cli.manifest {
            Some(path) => LevelManifest::load(path)
                .with_context(|| format!("failed to load manifest {}", path.display()))?,
            None => LevelManifest::builtin().context("built-in manifest is invalid")?,
        };
        let mut settings = manifest.render_settings();
        if cli.no_shadows {
            settings.shadows = false;
        }

        let loaded = if cli.placeholder {
            load_level(&manifest, &mut PlaceholderLoader::new(), &settings)
        } else {
            load_level(&manifest, &mut FsAssetLoader::new(&cli.assets), &settings)
        };
        let (level, renderer) =
            loaded.with_context(|| format!("failed to load level {}", manifest.name))?;

        let now = Instant::now();
        Ok(Self {
            name: manifest.name,
            level,
            renderer,
            actions: ActionQueue::new(),
            input: InputState::new(),
            last_frame: now,
            last_title: now,
        })
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool, repeat: bool) {
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => self.input.set_forward(pressed),
            KeyCode::KeyS | KeyCode::ArrowDown => self.input.set_backward(pressed),
            KeyCode::KeyA => self.input.set_left(pressed),
            KeyCode::KeyD => self.input.set_right(pressed),
            _ => {}
        }
        if !pressed || repeat {
            return;
        }
        let action = match key {
            KeyCode::KeyW | KeyCode::ArrowUp => Action::MoveForward,
            KeyCode::KeyS | KeyCode::ArrowDown => Action::MoveBackward,
            KeyCode::KeyA => Action::MoveLeft,
            KeyCode::KeyD => Action::MoveRight,
            KeyCode::KeyQ | KeyCode::ArrowLeft => Action::TurnLeft,
            KeyCode::KeyE | KeyCode::ArrowRight => Action::TurnRight,
            KeyCode::Space => Action::OpenDoor,
            KeyCode::KeyF => Action::ToggleFreecam,
            _ => return,
        };
        self.actions.push(action);
    }

    /// Actions, freecam, level update, camera animation, then the frame plan.
    fn frame(&mut self, dt: f32) -> FramePlan {
        for action in self.actions.drain() {
            apply_action(&mut self.level, &mut self.renderer, action);
        }
        let mouse = self.input.take_mouse_delta();
        apply_freecam(&self.level, &mut self.renderer, self.input.held(), mouse, dt);
        update_level(&mut self.level, &mut self.renderer, dt);
        update_level_renderer(&mut self.renderer, dt);
        for event in self.level.drain_events() {
            tracing::debug!(?event, "level event");
        }
        render_level(&mut self.renderer, dt)
    }

    /// Frame-time summary for the window title, at most once a second.
    fn title(&mut self) -> Option<String> {
        if self.last_title.elapsed().as_secs_f32() < 1.0 {
            return None;
        }
        self.last_title = Instant::now();
        let timer = self.renderer.frame_timer();
        let stats = self.renderer.stats();
        Some(format!(
            "{} - {:.1} ms (max {:.1}) - {} batches, {} lights",
            self.name,
            timer.average().as_secs_f64() * 1000.0,
            timer.max().as_secs_f64() * 1000.0,
            stats.batches,
            stats.render_lights
        ))
    }
}

struct DesktopApp {
    session: Session,
    window: Option<Arc<Window>>,
    gpu: Option<WgpuRenderer>,
    mouse_captured: bool,
    failure: Option<anyhow::Error>,
}

impl DesktopApp {
    fn new(session: Session) -> Self {
        Self {
            session,
            window: None,
            gpu: None,
            mouse_captured: false,
            failure: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.session.name.clone())
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let window = Arc::new(window);
        let size = window.inner_size();

        let ctx = pollster::block_on(GpuContext::new(window.clone(), size.width, size.height))
            .context("failed to initialize GPU")?;
        let gpu = pollster::block_on(WgpuRenderer::new(ctx, &self.session.renderer))
            .context("failed to create GPU renderer")?;
        tracing::info!(
            width = size.width,
            height = size.height,
            format = ?gpu.context().format(),
            "window ready"
        );

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = (now - self.session.last_frame).as_secs_f32().min(0.1);
        self.session.last_frame = now;

        let plan = self.session.frame(dt);
        if let Some(gpu) = &mut self.gpu {
            match gpu.render(&self.session.level, &self.session.renderer, &plan) {
                Ok(()) => {}
                Err(GpuError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                    tracing::error!("GPU out of memory");
                    event_loop.exit();
                }
                Err(e) => tracing::error!("render failed: {e}"),
            }
        }

        if let Some(window) = &self.window {
            if let Some(title) = self.session.title() {
                window.set_title(&title);
            }
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for DesktopApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_gpu(event_loop) {
            tracing::error!("{err:#}");
            self.failure = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => {
                self.session.input.release_all();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    event_loop.exit();
                    return;
                }
                self.session
                    .handle_key(key, key_state == ElementState::Pressed, repeat);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.mouse_captured {
                self.session
                    .input
                    .add_mouse_delta(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("crawl-desktop starting");
    let session = Session::load(&cli)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DesktopApp::new(session);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
