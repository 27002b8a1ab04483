use tracing::debug;

use crate::model::WorldSnapshot;

use super::rendering::screen_to_tile;
use super::{Camera, Vec2, ViewMode};

pub const CLICK_SLOP_PX: f32 = 5.0;
pub const WHEEL_ZOOM_STEP: f32 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerAction {
    Confirm,
    Cancel,
    NextActor,
    StopFollow,
}

const ACTION_COUNT: usize = 4;

impl ViewerAction {
    const fn index(self) -> usize {
        match self {
            ViewerAction::Confirm => 0,
            ViewerAction::Cancel => 1,
            ViewerAction::NextActor => 2,
            ViewerAction::StopFollow => 3,
        }
    }
}

/// Edge-triggered key state: a held key reports one press until released.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionEdges {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionEdges {
    pub(crate) fn set(&mut self, action: ViewerAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn take_pressed(&mut self, action: ViewerAction) -> bool {
        std::mem::take(&mut self.pressed[action.index()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    start: Vec2,
    start_pan: Vec2,
}

/// Pointer state between window events: drag-to-pan, click-to-follow,
/// wheel zoom anchored at the cursor, and hover.
#[derive(Debug, Default)]
pub struct InputController {
    cursor: Option<Vec2>,
    drag: Option<DragState>,
    hovered: Option<String>,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Id of the actor under the cursor as of the last [`Self::update_hover`].
    pub fn hovered_id(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn pointer_down(&mut self, camera: &mut Camera, at: Vec2) {
        self.cursor = Some(at);
        if camera.mode() == ViewMode::Overview {
            return;
        }
        camera.clear_zoom_anchor();
        self.drag = Some(DragState {
            start: at,
            start_pan: camera.pan(),
        });
    }

    pub fn pointer_moved(&mut self, camera: &mut Camera, at: Vec2) {
        self.cursor = Some(at);
        let Some(drag) = self.drag else {
            return;
        };
        let tile_px = camera.tile_px();
        camera.pan_to(Vec2::new(
            drag.start_pan.x - (at.x - drag.start.x) / tile_px,
            drag.start_pan.y - (at.y - drag.start.y) / tile_px,
        ));
    }

    pub fn pointer_left(&mut self) {
        self.cursor = None;
    }

    /// Ends a drag. A release within [`CLICK_SLOP_PX`] of the press is a
    /// click; clicking an occupied tile follows that actor and returns its name.
    pub fn pointer_up(
        &mut self,
        camera: &mut Camera,
        snapshot: Option<&WorldSnapshot>,
        at: Vec2,
    ) -> Option<String> {
        self.cursor = Some(at);
        let drag = self.drag.take()?;
        let moved_x = (at.x - drag.start.x).abs();
        let moved_y = (at.y - drag.start.y).abs();
        if moved_x >= CLICK_SLOP_PX || moved_y >= CLICK_SLOP_PX {
            return None;
        }

        let (tile_x, tile_y) = screen_to_tile(at, camera);
        let actor = snapshot?.actor_on_tile(tile_x, tile_y)?;
        let name = actor.name.clone();
        debug!(tile_x, tile_y, actor = %name, "click_selected_actor");
        camera.follow(&name, false);
        Some(name)
    }

    /// `lines > 0` is the wheel rolled away from the user, which zooms in.
    pub fn wheel(&mut self, camera: &mut Camera, lines: f32) {
        if lines == 0.0 || !lines.is_finite() {
            return;
        }
        let delta = if lines > 0.0 {
            WHEEL_ZOOM_STEP
        } else {
            -WHEEL_ZOOM_STEP
        };
        camera.zoom_by(delta, self.cursor);
    }

    pub fn update_hover(&mut self, camera: &Camera, snapshot: Option<&WorldSnapshot>) {
        self.hovered = match (self.cursor, snapshot) {
            (Some(cursor), Some(snapshot)) => {
                let (tile_x, tile_y) = screen_to_tile(cursor, camera);
                snapshot
                    .actor_on_tile(tile_x, tile_y)
                    .map(|actor| actor.id.clone())
            }
            _ => None,
        };
    }
}
