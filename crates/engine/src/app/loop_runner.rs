use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, WindowBuilder};

use crate::resources::ResourceManager;
use crate::AppPaths;

use super::engine::Engine;
use super::input::{InputSnapshot, Key, KeyStates};
use super::metrics::{FrameSample, MetricsAccumulator};
use super::rendering::Renderer;
use super::settings::RenderSettings;
use super::tools::DEFAULT_CONSOLE_FONT_SIZE;
use super::MetricsHandle;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub clear_color: [f32; 4],
    pub console_font: String,
    pub console_font_size: f32,
    pub target_tps: u32,
    pub max_ticks_per_frame: u32,
    pub max_frame_delta_ms: u64,
    pub metrics_log_interval_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "UI Engine".to_string(),
            window_width: 1280,
            window_height: 720,
            clear_color: RenderSettings::default().clear_color,
            console_font: "roboto".to_string(),
            console_font_size: DEFAULT_CONSOLE_FONT_SIZE,
            target_tps: 60,
            max_ticks_per_frame: 5,
            max_frame_delta_ms: 250,
            metrics_log_interval_ms: 1000,
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    paths: &AppPaths,
    setup: impl FnOnce(&mut Engine),
) -> Result<(), AppError> {
    run_app_with_metrics(config, paths, setup, MetricsHandle::default())
}

/// Opens the window, builds the engine over `paths.assets_dir`, lets `setup`
/// populate it, then runs until the window closes or `$exit` is issued.
pub fn run_app_with_metrics(
    config: LoopConfig,
    paths: &AppPaths,
    setup: impl FnOnce(&mut Engine),
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    info!(
        root = %paths.root.display(),
        assets_dir = %paths.assets_dir.display(),
        "startup"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    let size = window.inner_size();
    let mut engine = Engine::new(
        ResourceManager::new(&paths.assets_dir),
        &config.console_font,
        config.console_font_size,
        (size.width, size.height),
        RenderSettings {
            clear_color: config.clear_color,
            fullscreen: false,
        },
    );
    setup(&mut engine);

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let max_frame_delta = normalize_non_zero_duration(
        Duration::from_millis(config.max_frame_delta_ms),
        Duration::from_millis(250),
    );
    let metrics_log_interval = normalize_non_zero_duration(
        Duration::from_millis(config.metrics_log_interval_ms),
        Duration::from_secs(1),
    );
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let render_frame_target = target_frame_duration(config.max_render_fps.filter(|fps| *fps > 0));
    let mut input_collector = InputCollector::new(size.width, size.height);

    info!(
        target_tps,
        max_ticks_per_frame,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        entity_count = engine.world().len(),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut applied_fullscreen = false;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    engine.resize(new_size.width, new_size.height);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    let input = input_collector.snapshot_for_frame();
                    engine.update(&input);

                    accumulator = accumulator.saturating_add(raw_frame_dt.min(max_frame_delta));
                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        engine.tick(fixed_dt.as_secs_f64());
                    }
                    accumulator = step_plan.remaining_accumulator;
                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    if !engine.run_handle().is_running() {
                        info!(reason = "exit_command", "shutdown_requested");
                        window_target.exit();
                        return;
                    }

                    let settings = engine.settings().snapshot();
                    if settings.fullscreen != applied_fullscreen {
                        window.set_fullscreen(
                            settings.fullscreen.then_some(Fullscreen::Borderless(None)),
                        );
                        applied_fullscreen = settings.fullscreen;
                    }

                    let cap_sleep = compute_cap_sleep(
                        Instant::now().saturating_duration_since(last_present_instant),
                        render_frame_target,
                    );
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    match renderer.render_world(
                        engine.world(),
                        engine.projection(),
                        settings.clear_color,
                        engine.text_enabled(),
                    ) {
                        Ok(draw) => metrics_accumulator.record_frame(FrameSample {
                            frame_dt: raw_frame_dt,
                            ticks: step_plan.ticks_to_run,
                            dropped_backlog: step_plan.dropped_backlog,
                            draw,
                        }),
                        Err(error) => {
                            warn!(error = %error, "renderer_draw_failed");
                            window_target.exit();
                        }
                    }
                    last_present_instant = Instant::now();

                    if let Some(snapshot) =
                        metrics_accumulator.maybe_snapshot(now, engine.world().len())
                    {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            worst_frame_ms = snapshot.worst_frame_ms,
                            text_quads = snapshot.text_quads_per_frame,
                            mesh_triangles = snapshot.mesh_triangles_per_frame,
                            dropped_backlog_ms = snapshot.dropped_backlog_ms,
                            entity_count = snapshot.entity_count,
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                engine.resources_mut().clear_all();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Accumulates window input between frames. A press and release landing in
/// the same frame still reads as pressed for that frame, and an OS key
/// repeat reads as a fresh press.
#[derive(Debug, Default)]
struct InputCollector {
    down: KeyStates,
    pressed_latch: KeyStates,
    repeat_latch: KeyStates,
    previous: KeyStates,
    text: String,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let pressed = key_event.state == ElementState::Pressed;
        let key = engine_key(key_event.physical_key);
        if pressed && key_event.repeat {
            if let Some(key) = key {
                self.handle_repeat(key);
            }
        }
        self.handle_key(key, pressed, key_event.text.as_deref().filter(|_| pressed));
    }

    fn handle_repeat(&mut self, key: Key) {
        self.repeat_latch.set(key, true);
    }

    fn handle_key(&mut self, key: Option<Key>, pressed: bool, text: Option<&str>) {
        if let Some(key) = key {
            self.down.set(key, pressed);
            if pressed {
                self.pressed_latch.set(key, true);
            }
        }
        if let Some(text) = text {
            self.text.push_str(text);
        }
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn snapshot_for_frame(&mut self) -> InputSnapshot {
        let mut current = self.down;
        let mut previous = self.previous;
        for key in ALL_KEYS {
            if self.pressed_latch.is_down(key) {
                current.set(key, true);
            }
            if self.repeat_latch.is_down(key) {
                previous.set(key, false);
            }
        }
        let snapshot = InputSnapshot::new(
            current,
            previous,
            std::mem::take(&mut self.text),
            self.window_width,
            self.window_height,
        );
        self.previous = self.down;
        self.pressed_latch = KeyStates::default();
        self.repeat_latch = KeyStates::default();
        snapshot
    }
}

const ALL_KEYS: [Key; 5] = [
    Key::Escape,
    Key::Enter,
    Key::Backspace,
    Key::Semicolon,
    Key::Slash,
];

fn engine_key(key: PhysicalKey) -> Option<Key> {
    match key {
        PhysicalKey::Code(KeyCode::Escape) => Some(Key::Escape),
        PhysicalKey::Code(KeyCode::Enter | KeyCode::NumpadEnter) => Some(Key::Enter),
        PhysicalKey::Code(KeyCode::Backspace) => Some(Key::Backspace),
        PhysicalKey::Code(KeyCode::Semicolon) => Some(Key::Semicolon),
        PhysicalKey::Code(KeyCode::Slash | KeyCode::NumpadDivide) => Some(Key::Slash),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}
