mod camera;
mod clock;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod session;

pub use camera::{
    clamp_pan, visible_span, Camera, Vec2, ViewMode, WorldSize, ZoomLimits, FOLLOW_MIN_TILES,
    FREE_MIN_TILES, OVERVIEW_MIN_TILES, OVERVIEW_TILE_PX, PLAY_TILE_PX, ZOOM_SMOOTHING,
    ZOOM_SNAP_EPSILON,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use input::{InputController, ViewerAction, CLICK_SLOP_PX, WHEEL_ZOOM_STEP};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{
    decode_sprite, draw_frame, draw_text, hex, load_sprite_file, screen_to_tile, screen_to_world,
    shaded_tile_color, text_width, tile_color, tile_noise, with_alpha, world_to_screen,
    world_to_screen_px, Banner, Canvas, Color, FrameInput, HudState, LoadedSprite, Minimap,
    Renderer, SpriteError, SpritePlacement, SpriteRole, SpriteSet, Viewport, MINIMAP_REFRESH_MS,
};
pub use session::{FeedStatus, SessionControl, ViewerSession};
