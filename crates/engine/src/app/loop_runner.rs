use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::config::ViewerConfig;
use crate::model::ModelChange;
use crate::net::{spawn_transport, TransportError};

use super::input::ActionEdges;
use super::metrics::MetricsAccumulator;
use super::{Clock, Renderer, SessionControl, SystemClock, Vec2, ViewerAction, ViewerSession};

const ACTIONS: [ViewerAction; 4] = [
    ViewerAction::Confirm,
    ViewerAction::Cancel,
    ViewerAction::NextActor,
    ViewerAction::StopFollow,
];

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "World Viewer".to_string(),
            window_width: 1280,
            window_height: 720,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: Some(60),
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
    #[error("failed to start world transport: {0}")]
    Transport(#[from] TransportError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Opens the viewer window and runs until it is closed or Escape quits from
/// play mode. The transport is shut down before this returns.
pub fn run_app(viewer: ViewerConfig, config: LoopConfig) -> Result<(), AppError> {
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
    let mut transport = spawn_transport(&viewer)?;
    let mut session = ViewerSession::new(renderer.viewport(), viewer.follow.as_deref());
    let clock = SystemClock;

    event_loop.set_control_flow(ControlFlow::Poll);

    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    info!(
        stream_url = %viewer.stream_url,
        follow = viewer.follow.as_deref().unwrap_or("-"),
        fallback_fetch = viewer.fallback_fetch,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut edges = ActionEdges::default();
    let mut cursor: Option<Vec2> = None;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    session.set_viewport(renderer.viewport());
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    session.set_viewport(renderer.viewport());
                }
                WindowEvent::CursorMoved { position, .. } => {
                    let at = Vec2::new(position.x as f32, position.y as f32);
                    cursor = Some(at);
                    session.pointer_moved(at);
                }
                WindowEvent::CursorLeft { .. } => {
                    cursor = None;
                    session.pointer_left();
                }
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    let Some(at) = cursor else {
                        return;
                    };
                    match state {
                        ElementState::Pressed => session.pointer_down(at),
                        ElementState::Released => {
                            if let Some(name) = session.pointer_up(at) {
                                info!(name = %name, "follow_clicked");
                            }
                        }
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    session.wheel(wheel_lines(delta));
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let Some(action) = action_for_key(event.physical_key) {
                        edges.set(action, event.state == ElementState::Pressed);
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    let now_ms = clock.now_ms();

                    for event in transport.poll() {
                        if let Some(ModelChange::SnapshotReplaced { .. }) =
                            session.handle_event(event, now_ms)
                        {
                            metrics_accumulator.record_snapshot();
                        }
                    }
                    for action in ACTIONS {
                        if !edges.take_pressed(action) {
                            continue;
                        }
                        debug!(?action, "action_pressed");
                        if session.handle_action(action) == SessionControl::Quit {
                            info!(reason = "escape_key", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                    }
                    session.tick(now_ms, &mut transport);

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) = renderer.render(&session.frame(now_ms)) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    metrics_accumulator.record_frame(raw_frame_dt);
                    metrics_accumulator.record_dropped(transport.take_dropped_events());
                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            snapshots_per_sec = snapshot.snapshots_per_sec,
                            dropped_messages = snapshot.dropped_messages,
                            feed = ?session.feed_status(),
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
                transport.shutdown();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn action_for_key(key: PhysicalKey) -> Option<ViewerAction> {
    match key {
        PhysicalKey::Code(KeyCode::Enter | KeyCode::NumpadEnter) => Some(ViewerAction::Confirm),
        PhysicalKey::Code(KeyCode::Escape) => Some(ViewerAction::Cancel),
        PhysicalKey::Code(KeyCode::Tab) => Some(ViewerAction::NextActor),
        PhysicalKey::Code(KeyCode::Backspace) => Some(ViewerAction::StopFollow),
        _ => None,
    }
}

/// Wheel notches with positive meaning "away from the user". Touchpads
/// report pixels, which only contribute their direction.
fn wheel_lines(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) if position.y > 0.0 => 1.0,
        MouseScrollDelta::PixelDelta(position) if position.y < 0.0 => -1.0,
        MouseScrollDelta::PixelDelta(_) => 0.0,
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
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

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}
