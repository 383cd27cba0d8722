use std::sync::Arc;
use std::time::Instant;

use glam::Vec4;
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
pub use winit::keyboard::KeyCode;
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::assets::AssetSystem;
use crate::audio::{AudioContext, SoundConfig};
use crate::config::TitanConfig;
use crate::error::{RenderError, TitanError};
use crate::graphics::{HeadlessBackend, RenderBackend, WgpuBackend};
use crate::input::{InputState, MouseButton};
use crate::screen::{Screen, ScreenStack};
use crate::window::{apply_window_settings, window_attributes};

// ── Engine ──────────────────────────────────────────────────────────────────

/// Everything a [`Screen`] can reach during a frame.
pub struct Engine {
    pub backend: Box<dyn RenderBackend>,
    pub input: InputState,
    pub audio: AudioContext,
    pub assets: AssetSystem,
    pub config: TitanConfig,
    dt: f32,
    tick: u64,
    time: f32,
    quit_requested: bool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn new(backend: Box<dyn RenderBackend>, audio: AudioContext, config: TitanConfig) -> Self {
        let dt = config.fixed_dt();
        Self {
            backend,
            input: InputState::new(),
            audio,
            assets: AssetSystem::new(),
            config,
            dt,
            tick: 0,
            time: 0.0,
            quit_requested: false,
        }
    }

    /// Engine over the recording backend with audio disabled.
    pub fn headless(config: TitanConfig) -> Self {
        let backend = HeadlessBackend::new(config.width, config.height);
        Self::new(Box::new(backend), AudioContext::disabled(), config)
    }

    pub fn dt(&self) -> f32 { self.dt }
    pub fn tick(&self) -> u64 { self.tick }
    /// Seconds of simulation since start.
    pub fn time(&self) -> f32 { self.time }

    /// Start a simulation step of length `dt`.
    pub fn begin_tick(&mut self, dt: f32) {
        self.dt = dt;
        self.tick += 1;
        self.time += dt;
    }

    pub fn backend(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.backend.surface_size()
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool { self.input.is_key_held(key) }
    pub fn is_key_pressed(&self, key: KeyCode) -> bool { self.input.is_key_pressed(key) }
    pub fn is_mouse_held(&self, button: MouseButton) -> bool { self.input.is_mouse_held(button) }
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool { self.input.is_mouse_pressed(button) }
    pub fn mouse_pos(&self) -> [f32; 2] { self.input.mouse_pos }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn play_sound(&mut self, name: &str) {
        self.audio.play(name, SoundConfig::default());
    }

    pub fn play_sound_varied(&mut self, name: &str, volume: f32, pitch_variation: f32) {
        self.audio.play(name, SoundConfig { volume, pitch_variation, ..SoundConfig::default() });
    }

    /// Advance one simulation step: upload finished asset sets, then update
    /// the screen stack. Input edges are consumed by the step.
    pub fn step(&mut self, screens: &mut ScreenStack, dt: f32) -> Result<(), TitanError> {
        self.begin_tick(dt);
        let backend = self.backend.as_mut();
        self.assets.poll(backend)?;
        screens.update(self)?;
        self.input.clear_frame_state();
        Ok(())
    }

    /// Draw one frame of the screen stack to the surface.
    pub fn render(&mut self, screens: &mut ScreenStack) -> Result<(), RenderError> {
        self.backend.begin_frame()?;
        self.backend.clear_framebuffer(None, Vec4::new(0.0, 0.0, 0.0, 1.0));
        screens.draw(self);
        self.backend.end_frame();
        Ok(())
    }

    fn handle_resize(&mut self, screens: &mut ScreenStack, width: u32, height: u32) -> Result<(), TitanError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.backend.resize_surface(width, height);
        screens.resize(self, width, height)
    }
}

// ── EngineBuilder ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct EngineBuilder {
    config: TitanConfig,
}

impl EngineBuilder {
    pub fn with_config(mut self, config: TitanConfig) -> Self { self.config = config; self }
    pub fn with_title(mut self, title: &str) -> Self { self.config.title = title.into(); self }
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }
    pub fn with_ups(mut self, ups: u32) -> Self { self.config.ups = ups; self }

    /// Open the window and run `initial` until the stack empties, a screen
    /// asks to quit, or the window closes. The first fatal error stops the
    /// loop and is returned.
    pub fn run(self, initial: Box<dyn Screen>) -> Result<(), TitanError> {
        let event_loop = EventLoop::new().map_err(|e| TitanError::EventLoop(e.to_string()))?;
        let fixed_dt = self.config.fixed_dt();
        let mut app = App {
            config: Some(self.config),
            screens: ScreenStack::new(initial),
            engine: None,
            window: None,
            last_instant: None,
            accumulator: 0.0,
            fixed_dt,
            error: None,
        };
        event_loop
            .run_app(&mut app)
            .map_err(|e| TitanError::EventLoop(e.to_string()))?;
        match app.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── App (winit ApplicationHandler) ──────────────────────────────────────────

struct App {
    config: Option<TitanConfig>,
    screens: ScreenStack,
    engine: Option<Engine>,
    window: Option<Arc<Window>>,
    last_instant: Option<Instant>,
    accumulator: f32,
    fixed_dt: f32,
    error: Option<TitanError>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: TitanError) {
        error!("{err}");
        self.error.get_or_insert(err);
        event_loop.exit();
    }

    fn create_engine(&mut self, event_loop: &ActiveEventLoop, config: TitanConfig) -> Result<(), TitanError> {
        let window = Arc::new(
            event_loop
                .create_window(window_attributes(&config))
                .map_err(|e| TitanError::Render(RenderError::Surface(e.to_string())))?,
        );
        apply_window_settings(&window, &config);
        let backend = pollster::block_on(WgpuBackend::new(window.clone()))?;
        info!("window '{}' opened at {:?}", config.title, backend.surface_size());
        self.engine = Some(Engine::new(Box::new(backend), AudioContext::new(), config));
        self.window = Some(window);
        Ok(())
    }

    fn apply_cursor_lock(&mut self) {
        let (Some(engine), Some(window)) = (self.engine.as_mut(), self.window.as_ref()) else { return };
        let Some(locked) = engine.input.take_lock_request() else { return };
        let grab = if locked {
            window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = grab {
            warn!("cursor grab failed: {e}");
        }
        window.set_cursor_visible(!locked);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) -> Result<(), TitanError> {
        let Some(engine) = self.engine.as_mut() else { return Ok(()) };
        let now = Instant::now();
        let elapsed = match self.last_instant {
            Some(prev) => now.duration_since(prev).as_secs_f32().min(0.25),
            None => self.fixed_dt,
        };
        self.last_instant = Some(now);
        self.accumulator += elapsed;

        while self.accumulator >= self.fixed_dt {
            engine.step(&mut self.screens, self.fixed_dt)?;
            if engine.quit_requested() {
                self.screens.shutdown(engine);
                event_loop.exit();
                return Ok(());
            }
            self.accumulator -= self.fixed_dt;
        }

        if let Err(e) = engine.render(&mut self.screens) {
            error!("frame skipped: {e}");
        }
        self.apply_cursor_lock();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else { return };
        if let Err(e) = self.create_engine(event_loop, config) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let Some(engine) = self.engine.as_mut() else { return };
        if let DeviceEvent::MouseMotion { delta } = event {
            if engine.input.cursor_locked() {
                engine.input.add_motion(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(engine) = self.engine.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => {
                self.screens.shutdown(engine);
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Err(e) = engine.handle_resize(&mut self.screens, size.width, size.height) {
                    self.fail(event_loop, e);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                if engine.input.cursor_locked() {
                    engine.input.mouse_pos = [x, y];
                } else {
                    engine.input.move_cursor(x, y);
                }
            }

            WindowEvent::MouseInput { button, state, .. } => match state {
                ElementState::Pressed => engine.input.press_mouse(button),
                ElementState::Released => engine.input.release_mouse(button),
            },

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw(event_loop) {
                    self.fail(event_loop, e);
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => match state {
                ElementState::Pressed => engine.input.press_key(code),
                ElementState::Released => engine.input.release_key(code),
            },

            _ => {}
        }
    }
}
