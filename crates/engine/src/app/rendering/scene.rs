use std::f32::consts::TAU;

use crate::app::{Camera, Vec2, ViewMode};
use crate::model::{Actor, ActorStatus, Creature, Facing, WorldModel};
use crate::net::{EffectKind, EffectMessage};

use super::canvas::{hex, with_alpha, Canvas, Color, SpritePlacement};
use super::hud::{draw_hud, HudState};
use super::minimap::Minimap;
use super::sprites::{SpriteRole, SpriteSet};
use super::text::{draw_text, fit_text, text_width};
use super::tiles::{draw_decorations, draw_tiles};
use super::transform::world_to_screen_px;

const CLEAR_COLOR: Color = hex(0x0A0A0A);
const PLAYER_COLOR: Color = hex(0xF472B6);
const NPC_COLOR: Color = hex(0x22D3EE);
const DAMAGED_COLOR: Color = hex(0xFF4444);
const ANIMAL_COLOR: Color = hex(0xF59E0B);
const ENTITY_OUTLINE: Color = [255, 255, 255, 0x66];
const DAMAGE_TINT: Color = [255, 40, 40, 110];
const TOOL_FALLBACK_COLOR: Color = hex(0xC8C8D2);
const HEALTH_BG: Color = hex(0x333333);
const HEALTH_GOOD: Color = hex(0x4ADE80);
const HEALTH_WARN: Color = hex(0xFACC15);
const HEALTH_LOW: Color = hex(0xEF4444);
const MINE_COLOR: Color = hex(0xFACC15);
const BUILD_COLOR: Color = hex(0x4ADE80);
const ATTACK_COLOR: Color = hex(0xF87171);
const EAT_COLOR: Color = hex(0x22C55E);
const SHAKE_MAX_PX: i64 = 3;
const SHAKE_BUCKET_MS: u64 = 16;
const ANIMAL_SCALE: f32 = 3.0;
const TOOL_SCALE: f32 = 0.4;
const BUBBLE_MAX_WIDTH: i32 = 220;
const BUBBLE_HEIGHT: i32 = 18;
const BUBBLE_PADDING: i32 = 4;
const BUBBLE_TEXT_SCALE: i32 = 2;
const DEBRIS_COUNT: usize = 8;

/// Everything one frame is drawn from.
pub struct FrameInput<'a> {
    pub model: &'a WorldModel,
    pub camera: &'a Camera,
    pub sprites: &'a SpriteSet,
    pub hud: HudState<'a>,
    pub now_ms: u64,
}

/// Draws one frame back to front. Only the minimap cache is carried between
/// frames; it is passed in already refreshed.
pub fn draw_frame(canvas: &mut Canvas<'_>, input: &FrameInput<'_>, minimap: Option<&Minimap>) {
    canvas.clear(CLEAR_COLOR);
    if let Some(snapshot) = input.model.snapshot() {
        let surface_row = input.model.surface_row();
        draw_tiles(canvas, snapshot, input.camera, surface_row);
        draw_decorations(canvas, snapshot, input.camera, surface_row);
        for creature in &snapshot.animals {
            draw_animal(canvas, input, creature);
        }
        for npc in &snapshot.npcs {
            draw_actor(canvas, input, npc, SpriteRole::Npc, NPC_COLOR);
        }
        for player in &snapshot.players {
            draw_actor(canvas, input, player, SpriteRole::Player, PLAYER_COLOR);
        }
        for active in input.model.effects() {
            draw_effect(canvas, input.camera, &active.effect);
        }
        draw_bubbles(canvas, input);
    }
    if let Some(minimap) = minimap.filter(|_| input.camera.mode() == ViewMode::Play) {
        minimap.blit(canvas);
    }
    draw_hud(canvas, input);
}

fn screen_rect(camera: &Camera, x: f32, y: f32) -> (f32, f32, f32) {
    let (sx, sy) = world_to_screen_px(Vec2::new(x, y), camera);
    (sx, sy, camera.tile_px())
}

fn off_canvas(canvas: &Canvas<'_>, sx: f32, sy: f32, width: f32, height: f32) -> bool {
    sx + width < 0.0
        || sy + height < 0.0
        || sx > canvas.width() as f32
        || sy > canvas.height() as f32
}

/// Deterministic jitter in `[-3, 3]` per axis for one 16 ms bucket.
pub(crate) fn shake_offset(id: &str, now_ms: u64) -> (i32, i32) {
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for byte in id.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash ^= now_ms / SHAKE_BUCKET_MS;
    hash = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    hash ^= hash >> 29;
    let span = (SHAKE_MAX_PX * 2 + 1) as u64;
    let dx = (hash % span) as i64 - SHAKE_MAX_PX;
    let dy = ((hash >> 32) % span) as i64 - SHAKE_MAX_PX;
    (dx as i32, dy as i32)
}

pub(crate) fn tool_angle(fighting: bool, now_ms: u64) -> f32 {
    let now = now_ms as f64;
    let swing = if fighting {
        (now / 30.0).sin() * 1.2
    } else {
        (now / 100.0).sin() * 0.4
    };
    (-0.5 + swing) as f32
}

pub(crate) fn health_color(fraction: f32) -> Color {
    if fraction > 0.5 {
        HEALTH_GOOD
    } else if fraction > 0.25 {
        HEALTH_WARN
    } else {
        HEALTH_LOW
    }
}

fn draw_actor(
    canvas: &mut Canvas<'_>,
    input: &FrameInput<'_>,
    actor: &Actor,
    role: SpriteRole,
    color: Color,
) {
    let (mut sx, mut sy, tile) = screen_rect(input.camera, actor.x, actor.y);
    if off_canvas(canvas, sx, sy, tile, tile) {
        return;
    }
    let status = input.model.actor_status(actor, input.now_ms);
    if status.shaking() {
        let (dx, dy) = shake_offset(&actor.id, input.now_ms);
        sx += dx as f32;
        sy += dy as f32;
    }

    match input.sprites.get(role) {
        Some(sprite) => canvas.draw_sprite(
            sprite,
            SpritePlacement {
                center_x: sx + tile * 0.5,
                center_y: sy + tile * 0.5,
                width: tile,
                height: tile,
                flip_x: actor.facing == Facing::Left,
                rotation: 0.0,
                tint: status.damaged.then_some(DAMAGE_TINT),
            },
        ),
        None => {
            let (x, y, size) = (sx.floor() as i32, sy.floor() as i32, tile.ceil() as i32);
            let body = if status.damaged { DAMAGED_COLOR } else { color };
            canvas.fill_rect(x, y, size, size, body);
            canvas.stroke_rect(x, y, size, size, 1, ENTITY_OUTLINE);
        }
    }

    draw_tool(canvas, input, actor, status, sx, sy, tile);
    if let Some(fraction) = actor.health_fraction() {
        draw_health_bar(canvas, sx, sy, tile, fraction);
    }
}

fn draw_tool(
    canvas: &mut Canvas<'_>,
    input: &FrameInput<'_>,
    actor: &Actor,
    status: ActorStatus,
    sx: f32,
    sy: f32,
    tile: f32,
) {
    let role = if status.mining || actor.holds_pick() {
        SpriteRole::Pickaxe
    } else {
        SpriteRole::Sword
    };
    let size = tile * TOOL_SCALE;
    let anchor_x = sx + tile * if actor.facing == Facing::Right { 0.35 } else { 0.65 };
    let anchor_y = sy + tile * 0.5;
    let rotation = tool_angle(status.fighting, input.now_ms) * actor.facing.sign();

    match input.sprites.get(role) {
        Some(sprite) => canvas.draw_sprite(
            sprite,
            SpritePlacement {
                center_x: anchor_x,
                center_y: anchor_y,
                width: size,
                height: size,
                flip_x: actor.facing == Facing::Left,
                rotation,
                tint: None,
            },
        ),
        None => {
            let (sin, cos) = (rotation - std::f32::consts::FRAC_PI_2).sin_cos();
            let tip = (anchor_x + cos * size, anchor_y + sin * size);
            let thickness = (tile / 18.0).max(1.0);
            canvas.stroke_line((anchor_x, anchor_y), tip, thickness, TOOL_FALLBACK_COLOR);
        }
    }
}

fn draw_health_bar(canvas: &mut Canvas<'_>, sx: f32, sy: f32, tile: f32, fraction: f32) {
    let x = sx.floor() as i32;
    let y = sy.floor() as i32 - 4;
    let width = tile.ceil() as i32;
    canvas.fill_rect(x, y, width, 3, HEALTH_BG);
    let filled = (tile * fraction).round() as i32;
    canvas.fill_rect(x, y, filled, 3, health_color(fraction));
}

fn draw_animal(canvas: &mut Canvas<'_>, input: &FrameInput<'_>, creature: &Creature) {
    let (sx, sy, tile) = screen_rect(input.camera, creature.x, creature.y);
    let size = tile * ANIMAL_SCALE;
    let left = sx + tile * 0.5 - size * 0.5;
    let top = sy + tile - size;
    if off_canvas(canvas, left, top, size, size) {
        return;
    }
    match input.sprites.get(SpriteRole::Boar) {
        Some(sprite) => canvas.draw_sprite(
            sprite,
            SpritePlacement {
                center_x: left + size * 0.5,
                center_y: top + size * 0.5,
                width: size,
                height: size,
                flip_x: creature.facing() == Facing::Left,
                rotation: 0.0,
                tint: None,
            },
        ),
        None => {
            let (x, y, edge) = (sx.floor() as i32, sy.floor() as i32, tile.ceil() as i32);
            canvas.fill_rect(x, y, edge, edge, ANIMAL_COLOR);
            canvas.stroke_rect(x, y, edge, edge, 1, ENTITY_OUTLINE);
        }
    }
}

fn tile_center(camera: &Camera, x: f32, y: f32) -> (f32, f32) {
    let (sx, sy) = world_to_screen_px(Vec2::new(x + 0.5, y + 0.5), camera);
    (sx, sy)
}

pub(crate) fn draw_effect(canvas: &mut Canvas<'_>, camera: &Camera, effect: &EffectMessage) {
    let tile = camera.tile_px();
    match effect.kind {
        EffectKind::Mine | EffectKind::Build => {
            let Some((x, y)) = effect.point() else {
                return;
            };
            let (sx, sy) = world_to_screen_px(Vec2::new(x, y), camera);
            let (inset, color) = if effect.kind == EffectKind::Mine {
                (2, MINE_COLOR)
            } else {
                (1, BUILD_COLOR)
            };
            let size = tile.ceil() as i32 - inset * 2;
            let (left, top) = (sx.floor() as i32 + inset, sy.floor() as i32 + inset);
            canvas.stroke_rect(left, top, size, size, 2, color);
        }
        EffectKind::Attack => {
            let Some(((x1, y1), (x2, y2))) = effect.segment() else {
                return;
            };
            let (from, to) = (tile_center(camera, x1, y1), tile_center(camera, x2, y2));
            canvas.stroke_line(from, to, 2.0, ATTACK_COLOR);
        }
        EffectKind::Explode => {
            let Some((x, y)) = effect.point() else {
                return;
            };
            let center = tile_center(camera, x, y);
            canvas.fill_circle(center, tile * 1.6, [255, 90, 0, 204]);
            canvas.fill_circle(center, tile * 0.8, [255, 220, 120, 230]);
            canvas.stroke_circle(center, tile * 2.2, 3.0, with_alpha(hex(0xFFFFFF), 0.9));
            for index in 0..DEBRIS_COUNT {
                let (sin, cos) = (index as f32 * TAU / DEBRIS_COUNT as f32).sin_cos();
                let from = (center.0 + cos * tile * 0.5, center.1 + sin * tile * 0.5);
                let to = (center.0 + cos * tile * 2.6, center.1 + sin * tile * 2.6);
                canvas.stroke_line(from, to, 2.0, [255, 200, 0, 230]);
            }
        }
        EffectKind::Eat => {
            let Some((x, y)) = effect.point() else {
                return;
            };
            canvas.stroke_circle(tile_center(camera, x, y), tile * 0.5, 2.0, EAT_COLOR);
        }
        EffectKind::Other => {}
    }
}

fn draw_bubbles(canvas: &mut Canvas<'_>, input: &FrameInput<'_>) {
    let Some(snapshot) = input.model.snapshot() else {
        return;
    };
    let mut bubbles: Vec<_> = input.model.bubbles().iter().collect();
    bubbles.sort_by(|a, b| a.0.cmp(b.0));
    for (actor_id, bubble) in bubbles {
        let Some(actor) = snapshot.listed_actors().find(|actor| &actor.id == actor_id) else {
            continue;
        };
        let (sx, sy, tile) = screen_rect(input.camera, actor.x, actor.y);
        if off_canvas(canvas, sx, sy, tile, tile) {
            continue;
        }
        let center_x = (sx + tile * 0.5).round() as i32;
        let top = sy.round() as i32;
        let room = BUBBLE_MAX_WIDTH - BUBBLE_PADDING * 2;
        let text = fit_text(&bubble.message, BUBBLE_TEXT_SCALE, room);
        let width =
            (text_width(text, BUBBLE_TEXT_SCALE) + BUBBLE_PADDING * 2).min(BUBBLE_MAX_WIDTH);
        let x = center_x - width / 2;
        let y = top - BUBBLE_HEIGHT - 6;
        canvas.fill_rounded_rect(x, y, width, BUBBLE_HEIGHT, 4, with_alpha(hex(0x000000), 0.7));
        draw_text(
            canvas,
            x + BUBBLE_PADDING,
            y + BUBBLE_PADDING,
            text,
            BUBBLE_TEXT_SCALE,
            hex(0xFFFFFF),
        );
    }
}
