mod canvas;
mod hud;
mod minimap;
mod renderer;
mod scene;
mod sprites;
mod text;
mod tiles;
mod transform;

pub use canvas::{hex, with_alpha, Canvas, Color, SpritePlacement};
pub use hud::{Banner, HudState};
pub use minimap::{Minimap, MINIMAP_REFRESH_MS};
pub use renderer::Renderer;
pub use scene::{draw_frame, FrameInput};
pub use sprites::{
    decode_sprite, load_sprite_file, LoadedSprite, SpriteError, SpriteRole, SpriteSet,
};
pub use text::{draw_text, text_width};
pub use tiles::{shaded_tile_color, tile_color, tile_noise};
pub use transform::{screen_to_tile, screen_to_world, world_to_screen, world_to_screen_px, Viewport};
