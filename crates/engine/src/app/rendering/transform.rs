use crate::app::{Camera, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Top-left screen pixel of a world position, rounded to the nearest pixel.
pub fn world_to_screen(world: Vec2, camera: &Camera) -> (i32, i32) {
    let (x, y) = world_to_screen_px(world, camera);
    (x.round() as i32, y.round() as i32)
}

pub fn world_to_screen_px(world: Vec2, camera: &Camera) -> (f32, f32) {
    let tile_px = camera.tile_px();
    let pan = camera.pan();
    ((world.x - pan.x) * tile_px, (world.y - pan.y) * tile_px)
}

pub fn screen_to_world(screen: Vec2, camera: &Camera) -> Vec2 {
    let tile_px = camera.tile_px();
    let pan = camera.pan();
    Vec2::new(pan.x + screen.x / tile_px, pan.y + screen.y / tile_px)
}

/// World tile containing the given screen pixel.
pub fn screen_to_tile(screen: Vec2, camera: &Camera) -> (i64, i64) {
    let world = screen_to_world(screen, camera);
    (world.x.floor() as i64, world.y.floor() as i64)
}
