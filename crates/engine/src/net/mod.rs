mod bridge;
mod protocol;

pub use bridge::{
    spawn_transport, MessageOrigin, TransportCommand, TransportError, TransportEvent,
    TransportHandle, ViewSink,
};
pub use protocol::{
    decode_message, decode_snapshot, inflate_base64, EffectKind, EffectMessage, InboundMessage,
    MineState, NpcChat, ProtocolError, ViewRequest, DEFAULT_BUBBLE_TTL_MS,
};
