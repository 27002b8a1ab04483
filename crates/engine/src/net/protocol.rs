use std::io::Read;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{de_id, de_opt_id, WorldSnapshot};

pub const DEFAULT_BUBBLE_TTL_MS: u64 = 6000;
const DEFLATE_ENCODING: &str = "deflate";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not valid json: {0}")]
    Json(#[source] serde_json::Error),
    #[error("compressed payload is not valid base64: {0}")]
    Base64(#[source] base64::DecodeError),
    #[error("compressed payload failed to inflate: {0}")]
    Inflate(#[source] std::io::Error),
    #[error("unsupported compression '{0}'")]
    UnsupportedCompression(String),
    #[error("snapshot invalid at {path}: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{kind}' message invalid: {source}")]
    Event {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unrecognized message shape")]
    Unrecognized,
}

#[derive(Debug, Clone)]
pub enum InboundMessage {
    Snapshot(Arc<WorldSnapshot>),
    NpcChat(NpcChat),
    Fx(EffectMessage),
    MineState(MineState),
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Snapshot(_) => "snapshot",
            InboundMessage::NpcChat(_) => "npcChat",
            InboundMessage::Fx(_) => "fx",
            InboundMessage::MineState(_) => "mineState",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcChat {
    #[serde(deserialize_with = "de_id")]
    pub npc_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl NpcChat {
    /// A missing or zero TTL falls back to the default bubble lifetime.
    pub fn effective_ttl_ms(&self) -> u64 {
        self.ttl_ms
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_BUBBLE_TTL_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Mine,
    Build,
    Attack,
    Explode,
    Eat,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectMessage {
    pub kind: EffectKind,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub x1: Option<f32>,
    #[serde(default)]
    pub y1: Option<f32>,
    #[serde(default)]
    pub x2: Option<f32>,
    #[serde(default)]
    pub y2: Option<f32>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub actor_id: Option<String>,
}

impl EffectMessage {
    pub fn point(&self) -> Option<(f32, f32)> {
        Some((self.x?, self.y?))
    }

    pub fn segment(&self) -> Option<((f32, f32), (f32, f32))> {
        Some(((self.x1?, self.y1?), (self.x2?, self.y2?)))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineState {
    #[serde(deserialize_with = "de_id")]
    pub actor_id: String,
    #[serde(default)]
    pub active: bool,
}

/// Outbound view subscription: integer top-left tile and visible span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "view")]
pub struct ViewRequest {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl ViewRequest {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn decode_message(text: &str) -> Result<InboundMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::Json)?;
    let value = unwrap_envelope(value)?;
    classify(value)
}

fn unwrap_envelope(value: Value) -> Result<Value, ProtocolError> {
    let Some(encoding) = value.get("compressed").and_then(Value::as_str) else {
        return Ok(value);
    };
    if encoding != DEFLATE_ENCODING {
        return Err(ProtocolError::UnsupportedCompression(encoding.to_string()));
    }
    let Some(data) = value.get("data").and_then(Value::as_str) else {
        return Err(ProtocolError::Unrecognized);
    };
    let json = inflate_base64(data)?;
    serde_json::from_str(&json).map_err(ProtocolError::Json)
}

/// Decodes a base64 raw-deflate (no zlib header) payload into text.
pub fn inflate_base64(data: &str) -> Result<String, ProtocolError> {
    let bytes = BASE64.decode(data.trim()).map_err(ProtocolError::Base64)?;
    let mut json = String::new();
    DeflateDecoder::new(bytes.as_slice())
        .read_to_string(&mut json)
        .map_err(ProtocolError::Inflate)?;
    Ok(json)
}

fn classify(value: Value) -> Result<InboundMessage, ProtocolError> {
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        return decode_snapshot(value)
            .map(|snapshot| InboundMessage::Snapshot(Arc::new(snapshot)));
    }

    match value.get("type").and_then(Value::as_str) {
        Some("npcChat") => {
            let chat: NpcChat = decode_event("npcChat", value)?;
            if chat.npc_id.is_empty() {
                return Err(ProtocolError::Unrecognized);
            }
            Ok(InboundMessage::NpcChat(chat))
        }
        Some("fx") => decode_event("fx", value).map(InboundMessage::Fx),
        Some("mineState") => decode_event("mineState", value).map(InboundMessage::MineState),
        _ => Err(ProtocolError::Unrecognized),
    }
}

pub fn decode_snapshot(value: Value) -> Result<WorldSnapshot, ProtocolError> {
    serde_path_to_error::deserialize(value).map_err(|error| {
        let path = error.path().to_string();
        ProtocolError::Snapshot {
            path,
            source: error.into_inner(),
        }
    })
}

fn decode_event<T>(kind: &'static str, value: Value) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value).map_err(|source| ProtocolError::Event { kind, source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    use super::*;
    use crate::model::TileGrid;

    fn deflate_base64(text: &str) -> String {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("write");
        let bytes = encoder.finish().expect("finish");
        BASE64.encode(bytes)
    }

    const SNAPSHOT_JSON: &str = r#"{"ok":true,"worldWidth":4,"worldHeight":2,
        "tiles":[6,6,6,6,1,2,3,4],
        "players":[{"id":"p1","name":"Ada","x":1.5,"y":0.25,"look":0,"hp":40}],
        "npcs":[],"animals":[{"id":"b","type":"boar","x":3,"y":0,"vx":-1}],
        "chat":[{"ts":1,"message":"hello"}],"worldSeedInt":42}"#;

    #[test]
    fn decodes_plain_snapshot() {
        let message = decode_message(SNAPSHOT_JSON).expect("decode");
        let InboundMessage::Snapshot(snapshot) = message else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.width(), 4);
        assert_eq!(snapshot.players[0].name, "Ada");
        assert_eq!(snapshot.tile_at(3, 1), Some(4));
        assert!(matches!(snapshot.tiles, TileGrid::Flat(_)));
    }

    #[test]
    fn deflate_envelope_yields_the_inner_object() {
        let inner = r#"{"type":"npcChat","npcId":"n7","message":"well met","ttlMs":2500}"#;
        let envelope = serde_json::json!({
            "compressed": "deflate",
            "data": deflate_base64(inner),
        })
        .to_string();

        let decoded = decode_message(&envelope).expect("decode");
        let InboundMessage::NpcChat(chat) = decoded else {
            panic!("expected npc chat");
        };
        assert_eq!(
            chat,
            NpcChat {
                npc_id: "n7".to_string(),
                message: "well met".to_string(),
                ttl_ms: Some(2500),
            }
        );
    }

    #[test]
    fn inflate_round_trips_exact_text() {
        let original = r#"{"a":[1,2,3],"b":"ü"}"#;
        let inflated = inflate_base64(&deflate_base64(original)).expect("inflate");
        let expected: Value = serde_json::from_str(original).expect("json");
        let actual: Value = serde_json::from_str(&inflated).expect("json");
        assert_eq!(actual, expected);
    }

    #[test]
    fn compressed_snapshot_decodes() {
        let envelope = serde_json::json!({
            "compressed": "deflate",
            "data": deflate_base64(SNAPSHOT_JSON),
        })
        .to_string();
        assert!(matches!(
            decode_message(&envelope),
            Ok(InboundMessage::Snapshot(_))
        ));
    }

    #[test]
    fn bad_base64_is_an_error() {
        let envelope = r#"{"compressed":"deflate","data":"!!not base64!!"}"#;
        assert!(matches!(
            decode_message(envelope),
            Err(ProtocolError::Base64(_))
        ));
    }

    #[test]
    fn corrupt_deflate_stream_is_an_error() {
        let garbage = BASE64.encode([0xff_u8, 0xff, 0xff, 0xff, 0x00, 0x13]);
        let envelope = format!(r#"{{"compressed":"deflate","data":"{garbage}"}}"#);
        assert!(matches!(
            decode_message(&envelope),
            Err(ProtocolError::Inflate(_))
        ));
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let envelope = r#"{"compressed":"gzip","data":"AAAA"}"#;
        assert!(matches!(
            decode_message(envelope),
            Err(ProtocolError::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn fx_and_mine_state_decode() {
        let fx = decode_message(
            r#"{"type":"fx","kind":"attack","x1":1,"y1":2,"x2":3,"y2":4,"actorId":"p1"}"#,
        )
        .expect("fx");
        let InboundMessage::Fx(effect) = fx else {
            panic!("expected fx");
        };
        assert_eq!(effect.kind, EffectKind::Attack);
        assert_eq!(effect.segment(), Some(((1.0, 2.0), (3.0, 4.0))));
        assert_eq!(effect.point(), None);
        assert_eq!(effect.actor_id.as_deref(), Some("p1"));

        let mine = decode_message(r#"{"type":"mineState","actorId":"p1","active":true}"#)
            .expect("mine state");
        assert!(matches!(
            mine,
            InboundMessage::MineState(MineState { active: true, .. })
        ));
    }

    #[test]
    fn fx_actor_id_may_be_numeric() {
        let fx = decode_message(r#"{"type":"fx","kind":"mine","x":5,"y":6,"actorId":7}"#)
            .expect("fx with numeric actor");
        let InboundMessage::Fx(effect) = fx else {
            panic!("expected fx");
        };
        assert_eq!(effect.actor_id.as_deref(), Some("7"));
        assert_eq!(effect.point(), Some((5.0, 6.0)));
    }

    #[test]
    fn unknown_fx_kind_is_kept_as_other() {
        let fx = decode_message(r#"{"type":"fx","kind":"sparkle","x":1,"y":1}"#).expect("fx");
        assert!(matches!(
            fx,
            InboundMessage::Fx(EffectMessage {
                kind: EffectKind::Other,
                ..
            })
        ));
    }

    #[test]
    fn missing_ttl_uses_default() {
        let chat = decode_message(r#"{"type":"npcChat","npcId":"n","message":"x"}"#).expect("chat");
        let InboundMessage::NpcChat(chat) = chat else {
            panic!("expected npc chat");
        };
        assert_eq!(chat.effective_ttl_ms(), DEFAULT_BUBBLE_TTL_MS);
    }

    #[test]
    fn unrecognized_and_malformed_messages_error() {
        assert!(matches!(
            decode_message(r#"{"type":"weather"}"#),
            Err(ProtocolError::Unrecognized)
        ));
        assert!(matches!(
            decode_message(r#"{"ok":false}"#),
            Err(ProtocolError::Unrecognized)
        ));
        assert!(matches!(
            decode_message("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_message(r#"{"type":"mineState","active":true}"#),
            Err(ProtocolError::Event { kind: "mineState", .. })
        ));
    }

    #[test]
    fn snapshot_errors_report_the_json_path() {
        let error = decode_message(
            r#"{"ok":true,"tiles":[],"players":[{"id":"p","name":"a","x":"left","y":0}]}"#,
        )
        .expect_err("bad snapshot");
        match error {
            ProtocolError::Snapshot { path, .. } => assert_eq!(path, "players[0].x"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn view_request_serializes_with_type_tag() {
        let view = ViewRequest {
            x: 3,
            y: 4,
            w: 34,
            h: 23,
        };
        let value: Value = serde_json::from_str(&view.to_json()).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"type":"view","x":3,"y":4,"w":34,"h":23})
        );
    }
}
