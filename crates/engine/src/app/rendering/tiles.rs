use crate::app::{Camera, Vec2};
use crate::model::{WorldSnapshot, SKY_TILE, VOID_TILE};

use super::canvas::{hex, with_alpha, Canvas, Color};
use super::transform::world_to_screen_px;

const TILE_COLORS: [Color; 7] = [
    hex(0x0A0A0A),
    hex(0x6B4423),
    hex(0x5A5A6A),
    hex(0x8A8A9A),
    hex(0x2D5A1E),
    hex(0x3CB043),
    hex(0x87CEEB),
];
pub const CAVE_COLOR: Color = hex(0x0A0E14);
pub const MINIMAP_VOID_COLOR: Color = hex(0x0B0F14);
const DIRT_TILE: u16 = 1;
const STONE_TILE: u16 = 2;
const LIGHT_STONE_TILE: u16 = 3;
const GRASS_TILE: u16 = 4;
const TILE_VARIATION: f32 = 20.0;
const DEPTH_DARKEN: f32 = 40.0;
const CAVE_DARKEN: f32 = 20.0;
const OUTLINE_MIN_TILE_PX: f32 = 4.0;
const DECORATION_MIN_TILE_PX: f32 = 6.0;
const SPARKLE_THRESHOLD: f32 = 0.85;

pub fn tile_color(tile: u16) -> Color {
    TILE_COLORS
        .get(tile as usize)
        .copied()
        .unwrap_or(TILE_COLORS[VOID_TILE as usize])
}

/// Deterministic positional hash in `[0, 1)`.
pub fn tile_noise(x: i64, y: i64) -> f32 {
    let mut hash = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xC4CE_B9FE_1A85_EC53);
    hash ^= hash >> 33;
    (hash >> 40) as f32 / (1u64 << 24) as f32
}

/// Adds `delta` to each colour channel, saturating at 0 and 255.
pub fn adjust_color(color: Color, delta: i32) -> Color {
    let channel = |value: u8| (value as i32 + delta).clamp(0, 255) as u8;
    [channel(color[0]), channel(color[1]), channel(color[2]), color[3]]
}

fn depth_ratio(y: i64, surface_row: i64, world_height: u32) -> f32 {
    let span = world_height as i64 - surface_row;
    if span <= 0 {
        return 0.0;
    }
    ((y - surface_row) as f32 / span as f32).max(0.0)
}

/// Every tile gets positional noise and depth darkening. Void below the
/// surface line starts from the cave colour instead of black.
pub fn shaded_tile_color(tile: u16, x: i64, y: i64, surface_row: i64, world_height: u32) -> Color {
    let ratio = depth_ratio(y, surface_row, world_height);
    let base = if tile == VOID_TILE && y > surface_row {
        adjust_color(CAVE_COLOR, -((ratio * CAVE_DARKEN).floor() as i32))
    } else {
        tile_color(tile)
    };
    let variation = ((tile_noise(x, y) - 0.5) * TILE_VARIATION).floor() as i32;
    let darken = (ratio * DEPTH_DARKEN).floor() as i32;
    adjust_color(base, variation - darken)
}

fn is_open(tile: Option<u16>) -> bool {
    matches!(tile, None | Some(SKY_TILE) | Some(VOID_TILE))
}

/// Visible tile range as `(first_x, first_y, columns, rows)`, starting at
/// the integer tile under the top-left pixel and covering partial edges.
fn visible_tiles(camera: &Camera) -> (i64, i64, i64, i64) {
    let pan = camera.pan();
    let tile_px = camera.tile_px();
    let viewport = camera.viewport();
    let first_x = pan.x.floor() as i64;
    let first_y = pan.y.floor() as i64;
    let columns = (viewport.width as f32 / tile_px).ceil() as i64 + 1;
    let rows = (viewport.height as f32 / tile_px).ceil() as i64 + 1;
    (first_x, first_y, columns, rows)
}

pub(crate) fn draw_tiles(
    canvas: &mut Canvas<'_>,
    snapshot: &WorldSnapshot,
    camera: &Camera,
    surface_row: i64,
) {
    let tile_px = camera.tile_px();
    let size = tile_px.ceil() as i32;
    let outline = with_alpha(hex(0x000000), 0.4);
    let (first_x, first_y, columns, rows) = visible_tiles(camera);

    for y in first_y..first_y + rows {
        for x in first_x..first_x + columns {
            let Some(tile) = snapshot.tile_at(x, y) else {
                continue;
            };
            let (sx, sy) = world_to_screen_px(Vec2::new(x as f32, y as f32), camera);
            let (sx, sy) = (sx.floor() as i32, sy.floor() as i32);
            let color = shaded_tile_color(tile, x, y, surface_row, snapshot.height());
            canvas.fill_rect(sx, sy, size, size, color);
            if tile_px >= OUTLINE_MIN_TILE_PX && !is_open(Some(tile)) {
                canvas.stroke_rect(sx, sy, size, size, 1, outline);
            }
        }
    }
}

pub(crate) fn draw_decorations(
    canvas: &mut Canvas<'_>,
    snapshot: &WorldSnapshot,
    camera: &Camera,
    surface_row: i64,
) {
    let tile_px = camera.tile_px();
    if tile_px < DECORATION_MIN_TILE_PX {
        return;
    }
    let (first_x, first_y, columns, rows) = visible_tiles(camera);
    for y in first_y..first_y + rows {
        for x in first_x..first_x + columns {
            let Some(tile) = snapshot.tile_at(x, y) else {
                continue;
            };
            let (sx, sy) = world_to_screen_px(Vec2::new(x as f32, y as f32), camera);
            match tile {
                DIRT_TILE | GRASS_TILE => {
                    let exposed = is_open(snapshot.tile_at(x, y - 1)) || y <= surface_row;
                    if exposed {
                        draw_grass(canvas, x, y, sx, sy, tile_px);
                    }
                }
                STONE_TILE | LIGHT_STONE_TILE => draw_sparkle(canvas, x, y, sx, sy, tile_px),
                _ => {}
            }
        }
    }
}

fn draw_grass(canvas: &mut Canvas<'_>, x: i64, y: i64, sx: f32, sy: f32, tile_px: f32) {
    let blades = ((tile_px / 4.0).floor() as i64).max(5);
    let blade_width = (tile_px / 10.0).max(1.0).round() as i32;
    for blade in 0..blades {
        let s1 = tile_noise(x * 7 + blade, y * 13);
        let s2 = tile_noise(x * 11 + blade, y * 3);
        let height = tile_px * 0.3 + s2 * tile_px * 0.5;
        let shade = (s1 * 30.0).floor() as u8;
        let color = [50 + shade, 160 + (s2 * 40.0) as u8, 50 + shade, 255];
        let bx = (sx + s1 * (tile_px - blade_width as f32)).floor() as i32;
        let top = (sy - height).floor() as i32;
        canvas.fill_rect(bx, top, blade_width, sy.floor() as i32 - top, color);
    }
}

fn draw_sparkle(canvas: &mut Canvas<'_>, x: i64, y: i64, sx: f32, sy: f32, tile_px: f32) {
    if tile_noise(x * 3, y * 7) <= SPARKLE_THRESHOLD {
        return;
    }
    let room = (tile_px - 2.0).max(0.0);
    let fx = (sx + tile_noise(x * 5, y * 11) * room).floor() as i32;
    let fy = (sy + tile_noise(x * 13, y * 5) * room).floor() as i32;
    canvas.fill_rect(fx, fy, 2, 2, with_alpha(hex(0xFFFFFF), 0.3));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{ViewMode, Viewport, WorldSize};

    #[test]
    fn noise_is_deterministic_and_in_unit_range() {
        for y in -20..20 {
            for x in -20..20 {
                let value = tile_noise(x, y);
                assert!((0.0..1.0).contains(&value), "({x},{y}) -> {value}");
                assert_eq!(value, tile_noise(x, y));
            }
        }
        assert_ne!(tile_noise(1, 2), tile_noise(2, 1));
    }

    #[test]
    fn adjust_color_saturates() {
        assert_eq!(adjust_color([250, 5, 128, 255], 10), [255, 15, 138, 255]);
        assert_eq!(adjust_color([250, 5, 128, 77], -10), [240, 0, 118, 77]);
    }

    #[test]
    fn unknown_tile_codes_use_void_colour() {
        assert_eq!(tile_color(99), tile_color(VOID_TILE));
        assert_eq!(tile_color(1), hex(0x6B4423));
    }

    fn within(color: Color, base: Color, spread: i32) -> bool {
        (0..3).all(|channel| (color[channel] as i32 - base[channel] as i32).abs() <= spread)
    }

    #[test]
    fn shading_varies_by_position_and_darkens_with_depth() {
        let sky = tile_color(SKY_TILE);
        let sky_shades: Vec<Color> = (0..16)
            .map(|x| shaded_tile_color(SKY_TILE, x, 3, 10, 100))
            .collect();
        assert!(sky_shades.iter().any(|shade| *shade != sky_shades[0]));
        assert!(sky_shades.iter().all(|shade| within(*shade, sky, 10)));

        let caves: Vec<Color> = (0..16)
            .map(|x| shaded_tile_color(VOID_TILE, x, 11, 10, 100))
            .collect();
        assert!(caves.iter().any(|shade| *shade != caves[0]));

        let open_air = shaded_tile_color(VOID_TILE, 3, 5, 10, 100);
        assert!(within(open_air, tile_color(VOID_TILE), 10));

        for tile in [SKY_TILE, STONE_TILE] {
            let shallow = shaded_tile_color(tile, 4, 10, 10, 100);
            let deep = shaded_tile_color(tile, 4, 100, 10, 100);
            for channel in 0..3 {
                assert!(deep[channel] < shallow[channel], "tile {tile} channel {channel}");
            }
        }
    }

    #[test]
    fn tiles_fill_the_canvas_under_the_world() {
        let snapshot: WorldSnapshot = serde_json::from_value(serde_json::json!({
            "worldWidth": 8, "worldHeight": 8, "tiles": vec![SKY_TILE; 64],
        }))
        .expect("snapshot");
        let mut camera = Camera::new(ViewMode::Play, Viewport { width: 64, height: 64 });
        camera.set_world_size(WorldSize { width: 8, height: 8 });
        let mut frame = vec![0u8; 64 * 64 * 4];
        let mut canvas = Canvas::new(&mut frame, 64, 64);

        draw_tiles(&mut canvas, &snapshot, &camera, 4);
        for (x, y) in [(0, 0), (60, 60)] {
            let pixel = canvas.pixel(x, y).expect("pixel inside canvas");
            assert!(within(pixel, tile_color(SKY_TILE), 40), "({x},{y}) -> {pixel:?}");
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn exposed_dirt_grows_grass_above_it() {
        let mut tiles = vec![SKY_TILE; 16];
        tiles[4 + 1] = DIRT_TILE;
        let snapshot: WorldSnapshot = serde_json::from_value(serde_json::json!({
            "worldWidth": 4, "worldHeight": 4, "tiles": tiles,
        }))
        .expect("snapshot");
        let mut camera = Camera::new(ViewMode::Play, Viewport { width: 144, height: 144 });
        camera.set_world_size(WorldSize { width: 4, height: 4 });
        let mut frame = vec![0u8; 144 * 144 * 4];
        let mut canvas = Canvas::new(&mut frame, 144, 144);

        draw_decorations(&mut canvas, &snapshot, &camera, 0);
        let tile_px = camera.tile_px() as i32;
        let grass_rows = (0..tile_px).any(|y| {
            (tile_px..2 * tile_px).any(|x| canvas.pixel(x, y).is_some_and(|pixel| pixel[3] == 255))
        });
        assert!(grass_rows, "no grass drawn above the dirt tile");
    }
}
