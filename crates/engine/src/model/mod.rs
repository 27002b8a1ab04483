mod snapshot;
mod world;

pub use snapshot::{
    Actor, ActorStats, ChatLine, Creature, Facing, FocusRef, TileGrid, WorldKey, WorldSnapshot,
    DEFAULT_MAX_HP, DEFAULT_WORLD_EXTENT, SKY_TILE, VOID_TILE,
};
pub(crate) use snapshot::{de_id, de_opt_id};
pub use world::{
    ActiveEffect, ActorStatus, ModelChange, SpeechBubble, WorldModel, ACTED_FLAG_TTL_MS,
    EFFECT_TTL_MS, MINING_FLAG_TTL_MS,
};
