use tracing::trace;

use crate::app::{Camera, ViewMode, WorldSize};
use crate::model::{WorldSnapshot, VOID_TILE};

use super::canvas::{hex, with_alpha, Canvas, Color};
use super::scene::FrameInput;
use super::tiles::{tile_color, MINIMAP_VOID_COLOR};

pub const MINIMAP_REFRESH_MS: u64 = 2000;
const MINIMAP_MARGIN: i32 = 10;
const MINIMAP_FIT_WIDTH: f32 = 900.0;
const MINIMAP_FIT_HEIGHT: f32 = 600.0;
const MINIMAP_SCALE: f32 = 0.5;
const FOCUS_COLOR: Color = hex(0xF472B6);

/// World thumbnail with the camera window marked. Redrawn at most every
/// [`MINIMAP_REFRESH_MS`] and blitted unchanged in between.
#[derive(Debug, Default)]
pub struct Minimap {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    rendered_at: Option<u64>,
}

impl Minimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimap pixels per world tile.
    pub fn scale_for(world: WorldSize) -> f32 {
        let width = world.width.max(1) as f32;
        let height = world.height.max(1) as f32;
        (MINIMAP_FIT_WIDTH / width).min(MINIMAP_FIT_HEIGHT / height) * MINIMAP_SCALE
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rendered_at(&self) -> Option<u64> {
        self.rendered_at
    }

    /// Redraws the cache when it is older than the refresh interval.
    /// Returns `true` if it was redrawn.
    pub fn refresh(&mut self, input: &FrameInput<'_>) -> bool {
        if input.camera.mode() == ViewMode::Overview {
            return false;
        }
        let Some(snapshot) = input.model.snapshot() else {
            return false;
        };
        if let Some(at) = self.rendered_at {
            if input.now_ms.saturating_sub(at) < MINIMAP_REFRESH_MS {
                return false;
            }
        }
        self.redraw(snapshot, input.camera, input.model.surface_row());
        self.rendered_at = Some(input.now_ms);
        trace!(width = self.width, height = self.height, "minimap_redrawn");
        true
    }

    fn redraw(&mut self, snapshot: &WorldSnapshot, camera: &Camera, surface_row: i64) {
        let world = WorldSize::of(snapshot);
        let scale = Self::scale_for(world);
        self.width = ((world.width as f32 * scale).ceil() as u32).max(1);
        self.height = ((world.height as f32 * scale).ceil() as u32).max(1);
        self.rgba.clear();
        self.rgba
            .resize(self.width as usize * self.height as usize * 4, 0);

        let (width, height) = (self.width, self.height);
        let mut canvas = Canvas::new(&mut self.rgba, width, height);
        for my in 0..height as i32 {
            let tile_y = (my as f32 / scale).floor() as i64;
            for mx in 0..width as i32 {
                let tile_x = (mx as f32 / scale).floor() as i64;
                let color = match snapshot.tile_at(tile_x, tile_y) {
                    None | Some(VOID_TILE) if tile_y > surface_row => MINIMAP_VOID_COLOR,
                    tile => tile_color(tile.unwrap_or(VOID_TILE)),
                };
                canvas.put(mx, my, color);
            }
        }

        let pan = camera.pan();
        let tile_px = camera.tile_px();
        let viewport = camera.viewport();
        let vx = (pan.x * scale).round() as i32;
        let vy = (pan.y * scale).round() as i32;
        let vw = (viewport.width as f32 / tile_px * scale).round().max(1.0) as i32;
        let vh = (viewport.height as f32 / tile_px * scale).round().max(1.0) as i32;
        let (w, h) = (width as i32, height as i32);
        let shade = with_alpha(hex(0x000000), 0.7);
        canvas.fill_rect(0, 0, w, vy, shade);
        canvas.fill_rect(0, vy + vh, w, h - vy - vh, shade);
        canvas.fill_rect(0, vy, vx, vh, shade);
        canvas.fill_rect(vx + vw, vy, w - vx - vw, vh, shade);
        canvas.stroke_rect(vx, vy, vw, vh, 1, with_alpha(hex(0xFFFFFF), 0.9));

        let focus = camera
            .follow_target()
            .and_then(|name| snapshot.find_by_name(name))
            .map(|focus| focus.position())
            .or_else(|| snapshot.default_focus());
        if let Some((fx, fy)) = focus {
            let mx = (fx * scale).round() as i32 - 1;
            let my = (fy * scale).round() as i32 - 1;
            canvas.fill_rect(mx, my, 3, 3, FOCUS_COLOR);
        }
    }

    /// Copies the cache into the top-right corner of `canvas`.
    pub fn blit(&self, canvas: &mut Canvas<'_>) {
        if self.rendered_at.is_none() {
            return;
        }
        let left = canvas.width() as i32 - self.width as i32 - MINIMAP_MARGIN;
        let top = MINIMAP_MARGIN;
        for (index, pixel) in self.rgba.chunks_exact(4).enumerate() {
            let x = (index % self.width as usize) as i32;
            let y = (index / self.width as usize) as i32;
            canvas.put(left + x, top + y, [pixel[0], pixel[1], pixel[2], 255]);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::{HudState, SpriteSet, Viewport};
    use crate::model::WorldModel;

    fn model() -> WorldModel {
        let snapshot: WorldSnapshot = serde_json::from_value(serde_json::json!({
            "worldWidth": 256, "worldHeight": 256, "tiles": vec![1; 256 * 256],
            "players": [{"id": "p1", "name": "Ada", "x": 128, "y": 64}],
        }))
        .expect("snapshot");
        let mut model = WorldModel::new();
        model.replace_snapshot(Arc::new(snapshot));
        model
    }

    fn input<'a>(
        model: &'a WorldModel,
        camera: &'a Camera,
        sprites: &'a SpriteSet,
        now_ms: u64,
    ) -> FrameInput<'a> {
        FrameInput {
            model,
            camera,
            sprites,
            hud: HudState {
                banner: None,
                show_intro: false,
                hovered_id: None,
            },
            now_ms,
        }
    }

    const VIEW: Viewport = Viewport {
        width: 1200,
        height: 800,
    };

    #[test]
    fn scale_fits_half_of_nine_by_six_hundred() {
        let scale = Minimap::scale_for(WorldSize {
            width: 256,
            height: 256,
        });
        assert_eq!(scale, 1.171875);
        let wide = Minimap::scale_for(WorldSize {
            width: 900,
            height: 100,
        });
        assert_eq!(wide, 0.5);
    }

    #[test]
    fn redraw_is_throttled_to_refresh_interval() {
        let model = model();
        let camera = Camera::new(ViewMode::Play, VIEW);
        let sprites = SpriteSet::default();
        let mut minimap = Minimap::new();

        assert!(minimap.refresh(&input(&model, &camera, &sprites, 10_000)));
        assert_eq!(minimap.size(), (300, 300));
        assert!(!minimap.refresh(&input(&model, &camera, &sprites, 11_999)));
        assert!(minimap.refresh(&input(&model, &camera, &sprites, 12_000)));
        assert_eq!(minimap.rendered_at(), Some(12_000));
    }

    #[test]
    fn overview_and_empty_model_skip_redraw() {
        let model = model();
        let overview = Camera::new(ViewMode::Overview, VIEW);
        let sprites = SpriteSet::default();
        let mut minimap = Minimap::new();
        assert!(!minimap.refresh(&input(&model, &overview, &sprites, 0)));

        let empty = WorldModel::new();
        let camera = Camera::new(ViewMode::Play, VIEW);
        assert!(!minimap.refresh(&input(&empty, &camera, &sprites, 0)));
    }

    #[test]
    fn blit_lands_top_right_with_focus_marker() {
        let model = model();
        let camera = Camera::new(ViewMode::Play, VIEW);
        let sprites = SpriteSet::default();
        let mut minimap = Minimap::new();
        minimap.refresh(&input(&model, &camera, &sprites, 0));

        let (width, height) = (400u32, 320u32);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        let mut canvas = Canvas::new(&mut frame, width, height);
        minimap.blit(&mut canvas);

        assert_eq!(canvas.pixel(89, 10), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(90, 10).map(|pixel| pixel[3]), Some(255));
        // Focus at (128, 64) * 1.171875 = (150, 75).
        assert_eq!(canvas.pixel(90 + 150, 10 + 75), Some(FOCUS_COLOR));
    }

    #[test]
    fn void_is_dark_only_below_the_surface_line() {
        let mut tiles = vec![0u16; 40 * 40];
        for tile in tiles.iter_mut().take(20 * 40) {
            *tile = 6;
        }
        tiles[10 * 40 + 5] = 0;
        let snapshot: WorldSnapshot = serde_json::from_value(serde_json::json!({
            "worldWidth": 40, "worldHeight": 40, "tiles": tiles,
        }))
        .expect("snapshot");
        let mut model = WorldModel::new();
        model.replace_snapshot(Arc::new(snapshot));
        assert_eq!(model.surface_row(), 20);

        let mut camera = Camera::new(
            ViewMode::Play,
            Viewport {
                width: 1440,
                height: 1440,
            },
        );
        camera.set_world_size(WorldSize {
            width: 40,
            height: 40,
        });
        let sprites = SpriteSet::default();
        let mut minimap = Minimap::new();
        assert!(minimap.refresh(&input(&model, &camera, &sprites, 0)));
        assert_eq!(minimap.size(), (300, 300));

        let cached = |x: usize, y: usize| {
            let index = (y * 300 + x) * 4;
            [
                minimap.rgba[index],
                minimap.rgba[index + 1],
                minimap.rgba[index + 2],
                minimap.rgba[index + 3],
            ]
        };
        // Scale is 7.5 px per tile.
        assert_eq!(cached(116, 40), tile_color(6));
        assert_eq!(cached(40, 78), tile_color(VOID_TILE));
        assert_eq!(cached(40, 228), MINIMAP_VOID_COLOR);
    }
}
