use tracing::{debug, info, warn};

use crate::model::{ModelChange, WorldModel, WorldSnapshot};
use crate::net::{TransportEvent, ViewRequest, ViewSink};

use super::rendering::{Banner, FrameInput, HudState, SpriteSet};
use super::{Camera, InputController, Vec2, ViewMode, ViewerAction, Viewport, WorldSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Live,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    Quit,
}

/// All mutable viewer state, owned by the render thread.
///
/// Transport events are folded in through [`Self::handle_event`]; once per
/// frame [`Self::tick`] expires ephemeral state, steps the camera and pushes
/// the view subscription when the visible window moved.
#[derive(Debug)]
pub struct ViewerSession {
    model: WorldModel,
    camera: Camera,
    input: InputController,
    sprites: SpriteSet,
    feed: FeedStatus,
    last_view: Option<ViewRequest>,
}

impl ViewerSession {
    /// Starts in the overview unless a follow target is given, in which case
    /// the viewer goes straight to play mode zoomed in on that actor.
    pub fn new(viewport: Viewport, follow: Option<&str>) -> Self {
        let camera = match follow {
            Some(name) => {
                let mut camera = Camera::new(ViewMode::Play, viewport);
                camera.follow(name, true);
                camera
            }
            None => Camera::new(ViewMode::Overview, viewport),
        };
        Self {
            model: WorldModel::new(),
            camera,
            input: InputController::new(),
            sprites: SpriteSet::default(),
            feed: FeedStatus::Connecting,
            last_view: None,
        }
    }

    pub fn model(&self) -> &WorldModel {
        &self.model
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn sprites(&self) -> &SpriteSet {
        &self.sprites
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed
    }

    pub fn last_view(&self) -> Option<ViewRequest> {
        self.last_view
    }

    pub fn banner(&self) -> Option<Banner> {
        match self.feed {
            FeedStatus::Failed => Some(Banner::ConnectFailed),
            FeedStatus::Closed => Some(Banner::FeedClosed),
            _ if self.model.snapshot().is_none() => Some(Banner::Loading),
            _ => None,
        }
    }

    /// Returns the model change when the event carried world data.
    pub fn handle_event(&mut self, event: TransportEvent, now_ms: u64) -> Option<ModelChange> {
        match event {
            TransportEvent::Connected => {
                self.feed = FeedStatus::Live;
                info!("live_feed_connected");
                None
            }
            TransportEvent::Error { message } => {
                warn!(error = %message, "live_feed_failed");
                self.feed = FeedStatus::Failed;
                None
            }
            TransportEvent::Disconnected { reason } => {
                info!(reason = %reason, "live_feed_closed");
                if self.feed != FeedStatus::Failed {
                    self.feed = FeedStatus::Closed;
                }
                None
            }
            TransportEvent::SpriteLoaded { role, sprite } => {
                debug!(role = ?role, "sprite_ready");
                self.sprites.insert(role, sprite);
                None
            }
            TransportEvent::Message { message, origin } => {
                let change = self.model.apply(message, now_ms);
                if let ModelChange::SnapshotReplaced { first } = change {
                    if first {
                        info!(origin = ?origin, "first_snapshot_received");
                    }
                    self.reconcile_snapshot();
                }
                Some(change)
            }
        }
    }

    fn reconcile_snapshot(&mut self) {
        let Some(snapshot) = self.model.snapshot() else {
            return;
        };
        self.camera.set_world_size(WorldSize::of(snapshot));
        if !self.camera.ensure_initialized(snapshot) {
            self.camera.update_follow(snapshot);
        }
    }

    /// Per-frame update. The view subscription is only remembered once the
    /// sink accepts it, so a dropped send is retried on the next frame.
    pub fn tick(&mut self, now_ms: u64, sink: &mut dyn ViewSink) {
        if self.model.prune(now_ms) {
            debug!(now_ms, "ephemeral_state_pruned");
        }
        self.camera.advance_zoom();
        if let Some(snapshot) = self.model.snapshot() {
            self.camera.update_follow(snapshot);
        }
        self.input.update_hover(&self.camera, self.model.snapshot());

        if !self.camera.is_initialized() {
            return;
        }
        let view = self.camera.view_request();
        if self.last_view == Some(view) {
            return;
        }
        if sink.send_viewport(view) {
            debug!(x = view.x, y = view.y, w = view.w, h = view.h, "view_subscription_sent");
            self.last_view = Some(view);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.camera.set_viewport(viewport);
    }

    pub fn handle_action(&mut self, action: ViewerAction) -> SessionControl {
        match action {
            ViewerAction::Confirm => {
                self.enter_world();
                SessionControl::Continue
            }
            ViewerAction::Cancel => {
                if self.camera.mode() == ViewMode::Overview {
                    self.enter_world();
                    SessionControl::Continue
                } else {
                    info!("quit_requested");
                    SessionControl::Quit
                }
            }
            ViewerAction::NextActor => {
                self.enter_world();
                if let Some(name) = self.next_actor_name() {
                    self.camera.follow(&name, true);
                    if let Some(snapshot) = self.model.snapshot() {
                        self.camera.update_follow(snapshot);
                    }
                }
                SessionControl::Continue
            }
            ViewerAction::StopFollow => {
                self.camera.stop_follow();
                SessionControl::Continue
            }
        }
    }

    fn enter_world(&mut self) {
        let surface_row = self.model.surface_row();
        self.camera.enter_world(self.model.snapshot(), surface_row);
    }

    fn next_actor_name(&self) -> Option<String> {
        let snapshot: &WorldSnapshot = self.model.snapshot()?;
        let names: Vec<&str> = snapshot
            .listed_actors()
            .map(|actor| actor.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return None;
        }
        let current = self.camera.follow_target().and_then(|target| {
            names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(target))
        });
        let next = current.map_or(0, |index| (index + 1) % names.len());
        Some(names[next].to_string())
    }

    pub fn pointer_down(&mut self, at: Vec2) {
        self.input.pointer_down(&mut self.camera, at);
    }

    pub fn pointer_moved(&mut self, at: Vec2) {
        self.input.pointer_moved(&mut self.camera, at);
    }

    pub fn pointer_left(&mut self) {
        self.input.pointer_left();
    }

    pub fn pointer_up(&mut self, at: Vec2) -> Option<String> {
        self.input
            .pointer_up(&mut self.camera, self.model.snapshot(), at)
    }

    pub fn wheel(&mut self, lines: f32) {
        self.input.wheel(&mut self.camera, lines);
    }

    pub fn frame(&self, now_ms: u64) -> FrameInput<'_> {
        FrameInput {
            model: &self.model,
            camera: &self.camera,
            sprites: &self.sprites,
            hud: HudState {
                banner: self.banner(),
                show_intro: self.camera.mode() == ViewMode::Overview,
                hovered_id: self.input.hovered_id(),
            },
            now_ms,
        }
    }
}
