use tracing::{debug, info};

use crate::model::{WorldSnapshot, DEFAULT_WORLD_EXTENT};
use crate::net::ViewRequest;

use super::Viewport;

pub const PLAY_TILE_PX: f32 = 36.0;
pub const OVERVIEW_TILE_PX: f32 = 16.0;
pub const ZOOM_SMOOTHING: f32 = 0.12;
pub const ZOOM_SNAP_EPSILON: f32 = 0.001;
pub const FOLLOW_MIN_TILES: f32 = 30.0;
pub const FREE_MIN_TILES: f32 = 25.0;
pub const OVERVIEW_MIN_TILES: f32 = 200.0;
const MIN_ZOOM_FLOOR: f32 = 0.1;
const INITIAL_ZOOM: f32 = 1.0;
const DEFAULT_FOCUS_HEIGHT_RATIO: f32 = 0.22;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSize {
    pub width: u32,
    pub height: u32,
}

impl WorldSize {
    pub fn of(snapshot: &WorldSnapshot) -> Self {
        Self {
            width: snapshot.width(),
            height: snapshot.height(),
        }
    }
}

impl Default for WorldSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_WORLD_EXTENT,
            height: DEFAULT_WORLD_EXTENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Overview,
    Play,
}

impl ViewMode {
    pub fn base_tile_px(self) -> f32 {
        match self {
            ViewMode::Overview => OVERVIEW_TILE_PX,
            ViewMode::Play => PLAY_TILE_PX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
}

impl ZoomLimits {
    /// `min` fits the whole world on the longer axis; `max` keeps at least
    /// `min_tiles` columns visible. `max` is never below `min`.
    pub fn compute(viewport: Viewport, world: WorldSize, mode: ViewMode, following: bool) -> Self {
        let base = mode.base_tile_px();
        let vw = viewport.width.max(1) as f32;
        let vh = viewport.height.max(1) as f32;
        let world_w = world.width.max(1) as f32;
        let world_h = world.height.max(1) as f32;

        let min = MIN_ZOOM_FLOOR
            .max(vw / (world_w * base))
            .max(vh / (world_h * base));
        let min_tiles = match mode {
            ViewMode::Overview => OVERVIEW_MIN_TILES,
            ViewMode::Play if following => FOLLOW_MIN_TILES,
            ViewMode::Play => FREE_MIN_TILES,
        };
        let max = (vw / (min_tiles * base)).max(min);
        Self { min, max }
    }

    pub fn clamp(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }
}

/// Tiles visible along each axis, `ceil(px / tile_px)` capped to `[1, extent]`.
pub fn visible_span(viewport: Viewport, world: WorldSize, tile_px: f32) -> (u32, u32) {
    let tile_px = if tile_px.is_finite() && tile_px > 0.0 {
        tile_px
    } else {
        1.0
    };
    let span = |px: u32, extent: u32| -> u32 {
        let tiles = (px as f32 / tile_px).ceil();
        (tiles as u32).clamp(1, extent.max(1))
    };
    (
        span(viewport.width, world.width),
        span(viewport.height, world.height),
    )
}

/// Keeps the top-left tile inside `[0, extent - span]` on both axes.
pub fn clamp_pan(pan: Vec2, tile_px: f32, viewport: Viewport, world: WorldSize) -> Vec2 {
    let (span_w, span_h) = visible_span(viewport, world, tile_px);
    let max_x = world.width.saturating_sub(span_w) as f32;
    let max_y = world.height.saturating_sub(span_h) as f32;
    let axis = |value: f32, max: f32| {
        if value.is_finite() {
            value.clamp(0.0, max)
        } else {
            0.0
        }
    };
    Vec2 {
        x: axis(pan.x, max_x),
        y: axis(pan.y, max_y),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ZoomAnchor {
    world: Vec2,
    screen: Vec2,
}

/// Pan/zoom state for the viewer.
///
/// `pan` is the fractional world tile at the top-left pixel. `zoom` eases
/// toward `zoom_target`; both stay inside [`ZoomLimits`] for the current
/// viewport, world size and mode, and `pan` is re-clamped whenever any of
/// those change.
#[derive(Debug, Clone)]
pub struct Camera {
    pan: Vec2,
    zoom: f32,
    zoom_target: f32,
    follow: Option<String>,
    mode: ViewMode,
    viewport: Viewport,
    world: WorldSize,
    anchor: Option<ZoomAnchor>,
    initialized: bool,
}

impl Camera {
    pub fn new(mode: ViewMode, viewport: Viewport) -> Self {
        let mut camera = Self {
            pan: Vec2::default(),
            zoom: INITIAL_ZOOM,
            zoom_target: INITIAL_ZOOM,
            follow: None,
            mode,
            viewport,
            world: WorldSize::default(),
            anchor: None,
            initialized: false,
        };
        camera.reclamp();
        camera
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_target(&self) -> f32 {
        self.zoom_target
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn world_size(&self) -> WorldSize {
        self.world
    }

    pub fn follow_target(&self) -> Option<&str> {
        self.follow.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_zooming(&self) -> bool {
        self.zoom != self.zoom_target
    }

    pub fn tile_px(&self) -> f32 {
        self.tile_px_at(self.zoom)
    }

    fn tile_px_at(&self, zoom: f32) -> f32 {
        (self.mode.base_tile_px() * zoom).max(1.0)
    }

    pub fn limits(&self) -> ZoomLimits {
        ZoomLimits::compute(self.viewport, self.world, self.mode, self.follow.is_some())
    }

    pub fn visible_span(&self) -> (u32, u32) {
        visible_span(self.viewport, self.world, self.tile_px())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport == viewport {
            return;
        }
        self.viewport = viewport;
        self.reclamp();
    }

    pub fn set_world_size(&mut self, world: WorldSize) {
        if self.world == world {
            return;
        }
        self.world = world;
        self.reclamp();
    }

    fn reclamp(&mut self) {
        let limits = self.limits();
        self.zoom = limits.clamp(self.zoom);
        self.zoom_target = limits.clamp(self.zoom_target);
        self.pan = self.clamped(self.pan);
    }

    fn clamped(&self, pan: Vec2) -> Vec2 {
        clamp_pan(pan, self.tile_px(), self.viewport, self.world)
    }

    pub fn pan_to(&mut self, pan: Vec2) {
        self.pan = self.clamped(pan);
    }

    /// Puts `point` at the middle of the visible window, clamped.
    pub fn center_on(&mut self, point: Vec2) {
        let tile_px = self.tile_px();
        let half_w = self.viewport.width as f32 / tile_px * 0.5;
        let half_h = self.viewport.height as f32 / tile_px * 0.5;
        self.pan_to(Vec2::new(point.x - half_w, point.y - half_h));
    }

    /// Sets the zoom target, clipped to the current limits. Returns the value applied.
    pub fn set_zoom_target(&mut self, target: f32) -> f32 {
        self.zoom_target = self.limits().clamp(target);
        self.zoom_target
    }

    /// Nudges the zoom target and, when a cursor is given, keeps the world
    /// point under it fixed on screen while the zoom eases in.
    pub fn zoom_by(&mut self, delta: f32, cursor: Option<Vec2>) {
        let target = self.set_zoom_target(self.zoom_target + delta);
        if let Some(screen) = cursor {
            let tile_px = self.tile_px();
            self.anchor = Some(ZoomAnchor {
                world: Vec2::new(
                    self.pan.x + screen.x / tile_px,
                    self.pan.y + screen.y / tile_px,
                ),
                screen,
            });
        }
        debug!(zoom = self.zoom, zoom_target = target, "zoom_target_changed");
    }

    pub fn clear_zoom_anchor(&mut self) {
        self.anchor = None;
    }

    /// One smoothing step. Returns `true` while the zoom is still moving.
    pub fn advance_zoom(&mut self) -> bool {
        if !self.is_zooming() {
            self.anchor = None;
            return false;
        }
        let mut next = self.zoom + (self.zoom_target - self.zoom) * ZOOM_SMOOTHING;
        if (next - self.zoom_target).abs() < ZOOM_SNAP_EPSILON {
            next = self.zoom_target;
        }
        self.zoom = next;

        match self.anchor {
            Some(anchor) => {
                let tile_px = self.tile_px();
                self.pan_to(Vec2::new(
                    anchor.world.x - anchor.screen.x / tile_px,
                    anchor.world.y - anchor.screen.y / tile_px,
                ));
            }
            None => self.pan = self.clamped(self.pan),
        }
        if !self.is_zooming() {
            self.anchor = None;
        }
        true
    }

    pub fn follow(&mut self, name: &str, zoom_in: bool) {
        self.follow = Some(name.to_string());
        self.reclamp();
        if zoom_in {
            let max = self.limits().max;
            self.set_zoom_target(max);
        }
        info!(target = name, zoom_in, "follow_started");
    }

    pub fn stop_follow(&mut self) {
        if let Some(previous) = self.follow.take() {
            self.reclamp();
            info!(target = %previous, "follow_stopped");
        }
    }

    /// Re-centres on the follow target. A target that is not in the
    /// snapshot leaves the pan untouched.
    pub fn update_follow(&mut self, snapshot: &WorldSnapshot) -> bool {
        let Some(name) = self.follow.as_deref() else {
            return false;
        };
        let Some(focus) = snapshot.find_by_name(name) else {
            return false;
        };
        let (x, y) = focus.position();
        self.center_on(Vec2::new(x, y));
        true
    }

    /// First-snapshot placement; later calls are no-ops.
    pub fn ensure_initialized(&mut self, snapshot: &WorldSnapshot) -> bool {
        if self.initialized {
            return false;
        }
        self.set_world_size(WorldSize::of(snapshot));
        let followed = self
            .follow
            .as_deref()
            .and_then(|name| snapshot.find_by_name(name))
            .map(|focus| focus.position());
        let (x, y) = followed
            .or_else(|| snapshot.default_focus())
            .unwrap_or((
                self.world.width as f32 * 0.5,
                self.world.height as f32 * DEFAULT_FOCUS_HEIGHT_RATIO,
            ));
        self.center_on(Vec2::new(x, y));
        self.initialized = true;
        info!(
            world_width = self.world.width,
            world_height = self.world.height,
            pan_x = self.pan.x,
            pan_y = self.pan.y,
            zoom = self.zoom,
            mode = ?self.mode,
            "camera_initialized"
        );
        true
    }

    /// Leaves the overview for the playable zoom range, framing the first
    /// player horizontally and the surface line vertically.
    pub fn enter_world(&mut self, snapshot: Option<&WorldSnapshot>, surface_row: i64) {
        if self.mode == ViewMode::Play {
            return;
        }
        self.mode = ViewMode::Play;
        self.anchor = None;
        if let Some(snapshot) = snapshot {
            self.world = WorldSize::of(snapshot);
        }
        let limits = self.limits();
        let overview_cap = self.viewport.width.max(1) as f32 / (OVERVIEW_MIN_TILES * PLAY_TILE_PX);
        let target = limits.clamp(overview_cap.min(limits.min.max(self.zoom_target)));
        self.zoom_target = target;
        self.zoom = target;
        self.pan = self.clamped(self.pan);

        if let Some(snapshot) = snapshot {
            let focus_x = snapshot
                .players
                .first()
                .map(|player| player.x)
                .unwrap_or(self.world.width as f32 * 0.5);
            self.center_on(Vec2::new(focus_x, surface_row as f32));
        }
        info!(zoom = self.zoom, pan_x = self.pan.x, pan_y = self.pan.y, "entered_world");
    }

    /// Outbound subscription window, computed from the zoom target so the
    /// server starts sending the area we are easing toward.
    pub fn view_request(&self) -> ViewRequest {
        let tile_px = self.tile_px_at(self.zoom_target);
        let (span_w, span_h) = visible_span(self.viewport, self.world, tile_px);
        let max_x = self.world.width.saturating_sub(span_w) as i64;
        let max_y = self.world.height.saturating_sub(span_h) as i64;
        ViewRequest {
            x: (self.pan.x.floor() as i64).clamp(0, max_x),
            y: (self.pan.y.floor() as i64).clamp(0, max_y),
            w: span_w as i64,
            h: span_h as i64,
        }
    }
}
