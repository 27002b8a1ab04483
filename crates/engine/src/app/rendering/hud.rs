use crate::model::{Actor, WorldSnapshot};

use super::canvas::{hex, with_alpha, Canvas, Color};
use super::scene::FrameInput;
use super::text::{draw_text, fit_text, line_advance, text_width};

const TEXT_SCALE: i32 = 2;
const PANEL_PADDING: i32 = 8;
const PANEL_MARGIN: i32 = 10;
const PANEL_RADIUS: i32 = 4;
const CHAT_LINES: usize = 12;
const CHAT_MAX_WIDTH: i32 = 460;
const ACTOR_LIST_MAX: usize = 24;
const INFO_PANEL_WIDTH: i32 = 200;
const BANNER_TOP: i32 = 40;
const SYSTEM_PREFIXES: [&str; 2] = ["\u{1F7E1}", "\u{1F7E2}"];
const INTRO_TEXT: &str = "Drag to pan. Scroll to zoom. Enter to start.";

const PANEL_BG: Color = [0, 0, 0, 166];
const TEXT_COLOR: Color = hex(0xFFFFFF);
const DIM_TEXT_COLOR: Color = hex(0xA8B0BC);
const SYSTEM_TEXT_COLOR: Color = hex(0xFACC15);
const FOLLOW_COLOR: Color = hex(0xF472B6);
const ERROR_BG: Color = [185, 28, 28, 230];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Loading,
    ConnectFailed,
    FeedClosed,
}

impl Banner {
    pub fn text(self) -> &'static str {
        match self {
            Banner::Loading => "Loading...",
            Banner::ConnectFailed => "Failed to connect to live world",
            Banner::FeedClosed => "Live feed closed",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, Banner::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HudState<'a> {
    pub banner: Option<Banner>,
    pub show_intro: bool,
    pub hovered_id: Option<&'a str>,
}

pub(crate) fn draw_hud(canvas: &mut Canvas<'_>, input: &FrameInput<'_>) {
    let snapshot = input.model.snapshot();
    draw_top_bar(canvas, input.now_ms, snapshot.and_then(WorldSnapshot::seed_label));

    if let Some(snapshot) = snapshot {
        let follow = input.camera.follow_target();
        draw_actor_list(canvas, snapshot, follow);
        if let Some((actor, following)) = inspected_actor(snapshot, input.hud.hovered_id, follow) {
            draw_info_panel(canvas, &info_lines(actor, following));
        }
    }
    draw_chat(canvas, input.model.chat().iter().map(|line| line.message.as_str()));

    if let Some(banner) = input.hud.banner {
        draw_banner(canvas, banner);
    }
    if input.hud.show_intro {
        draw_intro(canvas);
    }
}

fn draw_panel(canvas: &mut Canvas<'_>, x: i32, y: i32, lines: &[(&str, Color)], background: Color) {
    let width = lines
        .iter()
        .map(|(text, _)| text_width(text, TEXT_SCALE))
        .max()
        .unwrap_or(0)
        + PANEL_PADDING * 2;
    let height = panel_height(lines.len());
    canvas.fill_rounded_rect(x, y, width, height, PANEL_RADIUS, background);
    let mut line_y = y + PANEL_PADDING;
    for (text, color) in lines {
        draw_text(canvas, x + PANEL_PADDING, line_y, text, TEXT_SCALE, *color);
        line_y += line_advance(TEXT_SCALE);
    }
}

fn panel_height(lines: usize) -> i32 {
    lines as i32 * line_advance(TEXT_SCALE) - TEXT_SCALE * 2 + PANEL_PADDING * 2
}

fn centered_x(canvas: &Canvas<'_>, text: &str) -> i32 {
    (canvas.width() as i32 - text_width(text, TEXT_SCALE)) / 2 - PANEL_PADDING
}

fn draw_top_bar(canvas: &mut Canvas<'_>, now_ms: u64, seed: Option<String>) {
    let mut text = format_clock(now_ms);
    if let Some(seed) = seed {
        text.push_str(&format!(" · seed {seed}"));
    }
    let x = centered_x(canvas, &text);
    draw_panel(canvas, x, 6, &[(text.as_str(), TEXT_COLOR)], PANEL_BG);
}

fn draw_banner(canvas: &mut Canvas<'_>, banner: Banner) {
    let text = banner.text();
    let background = if banner.is_error() { ERROR_BG } else { PANEL_BG };
    let x = centered_x(canvas, text);
    draw_panel(canvas, x, BANNER_TOP, &[(text, TEXT_COLOR)], background);
}

fn draw_intro(canvas: &mut Canvas<'_>) {
    let x = centered_x(canvas, INTRO_TEXT);
    let y = canvas.height() as i32 / 2 - panel_height(1) / 2;
    draw_panel(canvas, x, y, &[(INTRO_TEXT, TEXT_COLOR)], with_alpha(hex(0x000000), 0.75));
}

fn draw_actor_list(canvas: &mut Canvas<'_>, snapshot: &WorldSnapshot, follow: Option<&str>) {
    let mut lines: Vec<(&str, Color)> = vec![("Actors", DIM_TEXT_COLOR)];
    for actor in snapshot.listed_actors().take(ACTOR_LIST_MAX) {
        let followed = follow.is_some_and(|name| actor.name.eq_ignore_ascii_case(name));
        let color = if followed { FOLLOW_COLOR } else { TEXT_COLOR };
        lines.push((actor.name.as_str(), color));
    }
    if lines.len() > 1 {
        draw_panel(canvas, PANEL_MARGIN, BANNER_TOP, &lines, PANEL_BG);
    }
}

fn draw_info_panel(canvas: &mut Canvas<'_>, lines: &[String]) {
    let height = panel_height(lines.len());
    let x = canvas.width() as i32 - INFO_PANEL_WIDTH - PANEL_MARGIN;
    let y = canvas.height() as i32 - height - PANEL_MARGIN;
    canvas.fill_rounded_rect(x, y, INFO_PANEL_WIDTH, height, PANEL_RADIUS, PANEL_BG);
    let mut line_y = y + PANEL_PADDING;
    for (index, line) in lines.iter().enumerate() {
        let color = if index == 0 { FOLLOW_COLOR } else { TEXT_COLOR };
        let line = fit_text(line, TEXT_SCALE, INFO_PANEL_WIDTH - PANEL_PADDING * 2);
        draw_text(canvas, x + PANEL_PADDING, line_y, line, TEXT_SCALE, color);
        line_y += line_advance(TEXT_SCALE);
    }
}

fn draw_chat<'m>(canvas: &mut Canvas<'_>, messages: impl ExactSizeIterator<Item = &'m str>) {
    let skip = messages.len().saturating_sub(CHAT_LINES);
    let lines: Vec<(&str, Color)> = messages
        .skip(skip)
        .map(|message| {
            let (text, system) = chat_line_style(message);
            let color = if system { SYSTEM_TEXT_COLOR } else { TEXT_COLOR };
            (fit_text(text, TEXT_SCALE, CHAT_MAX_WIDTH), color)
        })
        .collect();
    if lines.is_empty() {
        return;
    }
    let y = canvas.height() as i32 - panel_height(lines.len()) - PANEL_MARGIN;
    draw_panel(canvas, PANEL_MARGIN, y, &lines, PANEL_BG);
}

/// Hovered actor first, then the followed one. The flag is set when the
/// returned actor is the follow target.
pub(crate) fn inspected_actor<'s>(
    snapshot: &'s WorldSnapshot,
    hovered_id: Option<&str>,
    follow: Option<&str>,
) -> Option<(&'s Actor, bool)> {
    let is_followed =
        |actor: &Actor| follow.is_some_and(|name| actor.name.eq_ignore_ascii_case(name));
    let hovered = hovered_id.and_then(|id| snapshot.listed_actors().find(|actor| actor.id == id));
    hovered
        .or_else(|| snapshot.listed_actors().find(|actor| is_followed(*actor)))
        .map(|actor| (actor, is_followed(actor)))
}

pub(crate) fn info_lines(actor: &Actor, following: bool) -> Vec<String> {
    let stats = actor.stats.clone().unwrap_or_default();
    let kd = stats.kills as f64 / stats.deaths.max(1) as f64;
    vec![
        if following { "Following" } else { "Player" }.to_string(),
        actor.name.clone(),
        format!("Kills: {}", stats.kills),
        format!("Deaths: {}", stats.deaths),
        format!("K/D: {kd:.2}"),
        format!("Mined: {}", stats.blocks_mined),
        format!("Crafted: {}", stats.items_crafted),
        format!("Playtime: {}m", stats.playtime_ms / 60_000),
    ]
}

/// UTC wall clock as `h:mm AM`.
pub(crate) fn format_clock(now_ms: u64) -> String {
    let seconds = now_ms / 1000;
    let minutes = (seconds / 60) % 60;
    let hours = (seconds / 3600) % 24;
    let hour12 = match hours % 12 {
        0 => 12,
        hour => hour,
    };
    let suffix = if hours < 12 { "AM" } else { "PM" };
    format!("{hour12}:{minutes:02} {suffix}")
}

/// Strips a system-line marker. Returns the text and whether it was a system line.
pub(crate) fn chat_line_style(message: &str) -> (&str, bool) {
    for prefix in SYSTEM_PREFIXES {
        if let Some(rest) = message.strip_prefix(prefix) {
            return (rest.trim_start(), true);
        }
    }
    (message, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WorldSnapshot {
        serde_json::from_str(
            r#"{"tiles":[],
                "players":[{"id":"p1","name":"Ada","x":1,"y":1,
                    "stats":{"kills":7,"deaths":2,"blocksMined":40,
                             "itemsCrafted":3,"playtimeMs":185000}}],
                "npcs":[{"id":"n1","name":"Bob","x":2,"y":2}]}"#,
        )
        .expect("snapshot")
    }

    #[test]
    fn clock_is_twelve_hour_utc() {
        assert_eq!(format_clock(0), "12:00 AM");
        assert_eq!(format_clock((13 * 3600 + 7 * 60) * 1000), "1:07 PM");
        assert_eq!(format_clock((12 * 3600 + 59 * 60 + 59) * 1000), "12:59 PM");
        assert_eq!(format_clock((23 * 3600) * 1000 + 86_400_000), "11:00 PM");
    }

    #[test]
    fn system_chat_prefix_is_stripped() {
        assert_eq!(chat_line_style("\u{1F7E1} Server restarting"), ("Server restarting", true));
        assert_eq!(chat_line_style("\u{1F7E2}joined"), ("joined", true));
        assert_eq!(chat_line_style("Ada: hi"), ("Ada: hi", false));
    }

    #[test]
    fn info_lines_show_stats_and_floor_deaths_at_one() {
        let snapshot = snapshot();
        let lines = info_lines(&snapshot.players[0], true);
        assert_eq!(lines[0], "Following");
        assert_eq!(lines[4], "K/D: 3.50");
        assert_eq!(lines[7], "Playtime: 3m");

        let bob = info_lines(&snapshot.npcs[0], false);
        assert_eq!(bob[0], "Player");
        assert_eq!(bob[4], "K/D: 0.00");
    }

    #[test]
    fn hover_wins_over_follow_for_inspection() {
        let snapshot = snapshot();
        let (actor, following) =
            inspected_actor(&snapshot, Some("n1"), Some("ada")).expect("hovered");
        assert_eq!((actor.name.as_str(), following), ("Bob", false));

        let (actor, following) = inspected_actor(&snapshot, None, Some("ada")).expect("followed");
        assert_eq!((actor.name.as_str(), following), ("Ada", true));

        assert!(inspected_actor(&snapshot, Some("ghost"), None).is_none());
    }

    #[test]
    fn banners_carry_their_text() {
        assert_eq!(Banner::Loading.text(), "Loading...");
        assert!(Banner::ConnectFailed.is_error());
        assert!(!Banner::Loading.is_error());
    }

    #[test]
    fn chat_panel_draws_without_panicking_on_tiny_canvas() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        let mut canvas = Canvas::new(&mut frame, 8, 8);
        let messages = vec!["a".repeat(200); 20];
        draw_chat(&mut canvas, messages.iter().map(String::as_str));
        draw_banner(&mut canvas, Banner::FeedClosed);
        draw_intro(&mut canvas);
    }
}
