use std::collections::HashMap;
use std::sync::Arc;

use crate::net::{EffectMessage, InboundMessage, MineState, NpcChat};

use super::snapshot::{Actor, ChatLine, WorldKey, WorldSnapshot, SKY_TILE};

pub const EFFECT_TTL_MS: u64 = 800;
pub const ACTED_FLAG_TTL_MS: u64 = 400;
pub const MINING_FLAG_TTL_MS: u64 = 600;
const SURFACE_SAMPLE_STRIDE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBubble {
    pub message: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffect {
    pub effect: EffectMessage,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStatus {
    pub damaged: bool,
    pub fighting: bool,
    pub mining: bool,
    pub just_acted: bool,
}

impl ActorStatus {
    pub fn shaking(&self) -> bool {
        self.damaged || self.just_acted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChange {
    SnapshotReplaced { first: bool },
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SurfaceLine {
    key: WorldKey,
    row: i64,
}

/// Latest snapshot plus the out-of-band state that arrives between snapshots.
///
/// Ephemeral maps are keyed by actor id and are independent of snapshot
/// identity, so they survive snapshot replacement.
#[derive(Debug, Default)]
pub struct WorldModel {
    snapshot: Option<Arc<WorldSnapshot>>,
    chat: Vec<ChatLine>,
    bubbles: HashMap<String, SpeechBubble>,
    effects: Vec<ActiveEffect>,
    acted_until: HashMap<String, u64>,
    mining_until: HashMap<String, u64>,
    surface: Option<SurfaceLine>,
}

impl WorldModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&WorldSnapshot> {
        self.snapshot.as_deref()
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    pub fn bubbles(&self) -> &HashMap<String, SpeechBubble> {
        &self.bubbles
    }

    pub fn effects(&self) -> &[ActiveEffect] {
        &self.effects
    }

    pub fn apply(&mut self, message: InboundMessage, now_ms: u64) -> ModelChange {
        match message {
            InboundMessage::Snapshot(snapshot) => self.replace_snapshot(snapshot),
            InboundMessage::NpcChat(chat) => {
                self.upsert_bubble(chat, now_ms);
                ModelChange::Ephemeral
            }
            InboundMessage::Fx(effect) => {
                self.push_effect(effect, now_ms);
                ModelChange::Ephemeral
            }
            InboundMessage::MineState(state) => {
                self.set_mining(state, now_ms);
                ModelChange::Ephemeral
            }
        }
    }

    pub fn replace_snapshot(&mut self, snapshot: Arc<WorldSnapshot>) -> ModelChange {
        let first = self.snapshot.is_none();
        if let Some(chat) = snapshot.chat.as_ref() {
            self.chat = chat.clone();
        }
        let key = snapshot.world_key();
        if self.surface.as_ref().map(|surface| &surface.key) != Some(&key) {
            let row = compute_surface_row(&snapshot);
            tracing::debug!(surface_row = row, world = ?key, "surface_line_computed");
            self.surface = Some(SurfaceLine { key, row });
        }
        self.snapshot = Some(snapshot);
        ModelChange::SnapshotReplaced { first }
    }

    fn upsert_bubble(&mut self, chat: NpcChat, now_ms: u64) {
        let expires_at = now_ms.saturating_add(chat.effective_ttl_ms());
        self.bubbles.insert(
            chat.npc_id,
            SpeechBubble {
                message: chat.message,
                expires_at,
            },
        );
    }

    fn push_effect(&mut self, effect: EffectMessage, now_ms: u64) {
        if let Some(actor_id) = effect.actor_id.as_ref() {
            self.acted_until
                .insert(actor_id.clone(), now_ms.saturating_add(ACTED_FLAG_TTL_MS));
        }
        self.effects.push(ActiveEffect {
            effect,
            expires_at: now_ms.saturating_add(EFFECT_TTL_MS),
        });
    }

    fn set_mining(&mut self, state: MineState, now_ms: u64) {
        if state.active {
            self.mining_until
                .insert(state.actor_id, now_ms.saturating_add(MINING_FLAG_TTL_MS));
        } else {
            self.mining_until.remove(&state.actor_id);
        }
    }

    /// Drops every entry whose expiry is at or before `now_ms`.
    ///
    /// Returns `true` only when at least one entry was removed.
    pub fn prune(&mut self, now_ms: u64) -> bool {
        let before = self.ephemeral_len();
        self.effects.retain(|effect| effect.expires_at > now_ms);
        self.bubbles.retain(|_, bubble| bubble.expires_at > now_ms);
        self.acted_until.retain(|_, until| *until > now_ms);
        self.mining_until.retain(|_, until| *until > now_ms);
        self.ephemeral_len() < before
    }

    fn ephemeral_len(&self) -> usize {
        self.effects.len() + self.bubbles.len() + self.acted_until.len() + self.mining_until.len()
    }

    pub fn actor_status(&self, actor: &Actor, now_ms: u64) -> ActorStatus {
        let live = |until: Option<u64>| until.is_some_and(|until| until > now_ms);
        ActorStatus {
            damaged: live(actor.damaged_until),
            fighting: live(actor.fighting_until),
            mining: live(actor.mining_until) || live(self.mining_until.get(&actor.id).copied()),
            just_acted: live(self.acted_until.get(&actor.id).copied()),
        }
    }

    /// Cached approximate ground row for depth shading.
    pub fn surface_row(&self) -> i64 {
        match (self.surface.as_ref(), self.snapshot.as_ref()) {
            (Some(surface), _) => surface.row,
            (None, Some(snapshot)) => snapshot.height() as i64 / 3,
            (None, None) => 0,
        }
    }
}

fn compute_surface_row(snapshot: &WorldSnapshot) -> i64 {
    let width = snapshot.width() as i64;
    let height = snapshot.height() as i64;
    let mut sum = 0i64;
    let mut count = 0i64;
    for x in (0..width).step_by(SURFACE_SAMPLE_STRIDE) {
        // Missing cells count as ground.
        let first_solid = (0..height).find(|&y| snapshot.tile_at(x, y) != Some(SKY_TILE));
        if let Some(y) = first_solid {
            sum += y;
            count += 1;
        }
    }
    if count == 0 {
        height / 3
    } else {
        sum / count
    }
}
