// P2Pong sync wire protocol
// Messages exchanged over the transport channel during a match

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::WireCodec;
use crate::error::CodecError;
use crate::game::{Ball, Score, Side};

/// Message kind tag; fully determines the payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    PaddleUpdate,
    BallUpdate,
    ScoreUpdate,
    GameOver,
    Heartbeat,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::PaddleUpdate => "paddle_update",
            MessageKind::BallUpdate => "ball_update",
            MessageKind::ScoreUpdate => "score_update",
            MessageKind::GameOver => "game_over",
            MessageKind::Heartbeat => "heartbeat",
        }
    }
}

/// Sender's own paddle position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    pub y: f32,
    pub sequence: u64, // Monotonic per sender, lets receivers drop stale updates
}

/// Ball physics state (sent by host)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub sequence: u64,
}

impl BallState {
    pub fn from_ball(ball: &Ball, sequence: u64) -> Self {
        Self {
            x: ball.x,
            y: ball.y,
            vx: ball.vx,
            vy: ball.vy,
            sequence,
        }
    }

    pub fn to_ball(&self) -> Ball {
        Ball::new(self.x, self.y, self.vx, self.vy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverState {
    pub winner: Side,
}

/// Kind-specific payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SyncPayload {
    PaddleUpdate(PaddleState),
    BallUpdate(BallState),
    ScoreUpdate(Score),
    GameOver(GameOverState),
    Heartbeat,
}

/// One unit on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub payload: SyncPayload,
    /// Sender wall clock (ms since epoch), liveness bookkeeping only
    pub sent_at: u64,
}

/// JSON framing: `{"kind": ..., "payload": ..., "sent_at": ...}`.
/// The payload is decoded only after the kind is known so a wrong shape is
/// rejected as a whole.
#[derive(Debug, Serialize, Deserialize)]
struct JsonEnvelope {
    kind: MessageKind,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    sent_at: u64,
}

impl SyncMessage {
    pub fn new(payload: SyncPayload) -> Self {
        Self {
            payload,
            sent_at: unix_millis(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(SyncPayload::Heartbeat)
    }

    pub fn kind(&self) -> MessageKind {
        match self.payload {
            SyncPayload::PaddleUpdate(_) => MessageKind::PaddleUpdate,
            SyncPayload::BallUpdate(_) => MessageKind::BallUpdate,
            SyncPayload::ScoreUpdate(_) => MessageKind::ScoreUpdate,
            SyncPayload::GameOver(_) => MessageKind::GameOver,
            SyncPayload::Heartbeat => MessageKind::Heartbeat,
        }
    }

    /// Serialize message to bytes for transmission
    pub fn encode(&self, codec: WireCodec) -> Result<Vec<u8>, CodecError> {
        match codec {
            WireCodec::Json => {
                let payload = match &self.payload {
                    SyncPayload::PaddleUpdate(p) => serde_json::to_value(p)?,
                    SyncPayload::BallUpdate(b) => serde_json::to_value(b)?,
                    SyncPayload::ScoreUpdate(s) => serde_json::to_value(s)?,
                    SyncPayload::GameOver(g) => serde_json::to_value(g)?,
                    SyncPayload::Heartbeat => serde_json::Value::Null,
                };
                let envelope = JsonEnvelope {
                    kind: self.kind(),
                    payload,
                    sent_at: self.sent_at,
                };
                Ok(serde_json::to_vec(&envelope)?)
            }
            WireCodec::Bincode => Ok(bincode::serialize(self)?),
        }
    }

    /// Deserialize and validate a frame. Either the whole message is well
    /// formed or an error comes back; nothing is partially decoded.
    pub fn decode(bytes: &[u8], codec: WireCodec) -> Result<Self, CodecError> {
        let msg = match codec {
            WireCodec::Json => {
                let envelope: JsonEnvelope = serde_json::from_slice(bytes)?;
                let payload = match envelope.kind {
                    MessageKind::PaddleUpdate => {
                        SyncPayload::PaddleUpdate(serde_json::from_value(envelope.payload)?)
                    }
                    MessageKind::BallUpdate => {
                        SyncPayload::BallUpdate(serde_json::from_value(envelope.payload)?)
                    }
                    MessageKind::ScoreUpdate => {
                        SyncPayload::ScoreUpdate(serde_json::from_value(envelope.payload)?)
                    }
                    MessageKind::GameOver => {
                        SyncPayload::GameOver(serde_json::from_value(envelope.payload)?)
                    }
                    MessageKind::Heartbeat => SyncPayload::Heartbeat,
                };
                SyncMessage {
                    payload,
                    sent_at: envelope.sent_at,
                }
            }
            WireCodec::Bincode => bincode::deserialize(bytes)?,
        };

        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<(), CodecError> {
        let kind = self.kind().as_str();
        match &self.payload {
            SyncPayload::PaddleUpdate(p) if !p.y.is_finite() => Err(CodecError::Malformed {
                kind,
                reason: format!("non-finite paddle position {}", p.y),
            }),
            SyncPayload::BallUpdate(b) if !b.to_ball().is_finite() => Err(CodecError::Malformed {
                kind,
                reason: "non-finite ball component".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Milliseconds since the unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_msg() -> SyncMessage {
        SyncMessage::new(SyncPayload::BallUpdate(BallState {
            x: 1.0,
            y: 2.0,
            vx: 3.0,
            vy: 4.0,
            sequence: 9,
        }))
    }

    #[test]
    fn test_json_wire_shape() {
        let msg = SyncMessage {
            payload: SyncPayload::PaddleUpdate(PaddleState {
                y: 120.5,
                sequence: 3,
            }),
            sent_at: 77,
        };
        let bytes = msg.encode(WireCodec::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["kind"], "paddle_update");
        assert_eq!(value["payload"]["y"], 120.5);
        assert_eq!(value["payload"]["sequence"], 3);
        assert_eq!(value["sent_at"], 77);
        assert_eq!(SyncMessage::decode(&bytes, WireCodec::Json).unwrap(), msg);
    }

    #[test]
    fn test_heartbeat_serialization() {
        for codec in [WireCodec::Json, WireCodec::Bincode] {
            let msg = SyncMessage::heartbeat();
            let bytes = msg.encode(codec).unwrap();
            let decoded = SyncMessage::decode(&bytes, codec).unwrap();

            match decoded.payload {
                SyncPayload::Heartbeat => {}
                _ => panic!("Heartbeat didn't round-trip correctly, got: {:?}", decoded),
            }
        }

        // A bare heartbeat without payload or timestamp is still a heartbeat
        let bare = br#"{"kind":"heartbeat"}"#;
        let decoded = SyncMessage::decode(bare, WireCodec::Json).unwrap();
        assert_eq!(decoded.kind(), MessageKind::Heartbeat);
    }

    #[test]
    fn test_paddle_missing_field_is_rejected() {
        let frame = br#"{"kind":"paddle_update","payload":{"sequence":1},"sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());

        let frame = br#"{"kind":"paddle_update","payload":{},"sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());

        let frame = br#"{"kind":"paddle_update","sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());
    }

    #[test]
    fn test_payload_of_wrong_kind_is_rejected() {
        // Score shape under a ball tag
        let frame = br#"{"kind":"ball_update","payload":{"left":1,"right":2},"sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());

        let frame = br#"{"kind":"game_over","payload":{"winner":"middle"},"sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());

        let frame = br#"{"kind":"score_update","payload":{"left":-1,"right":2}}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());
    }

    #[test]
    fn test_unknown_kind_and_garbage_rejected() {
        let frame = br#"{"kind":"teleport","payload":{},"sent_at":5}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());
        assert!(SyncMessage::decode(b"\x00\x01garbage", WireCodec::Json).is_err());
        assert!(SyncMessage::decode(b"\xff\xff\xff\xff", WireCodec::Bincode).is_err());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut msg = ball_msg();
        if let SyncPayload::BallUpdate(ref mut b) = msg.payload {
            b.vx = f32::NAN;
        }
        let bytes = msg.encode(WireCodec::Bincode).unwrap();
        match SyncMessage::decode(&bytes, WireCodec::Bincode) {
            Err(CodecError::Malformed { kind, .. }) => assert_eq!(kind, "ball_update"),
            other => panic!("expected malformed ball, got {:?}", other),
        }

        // JSON cannot carry NaN at all; it arrives as null and fails to parse
        let frame = br#"{"kind":"paddle_update","payload":{"y":null,"sequence":1}}"#;
        assert!(SyncMessage::decode(frame, WireCodec::Json).is_err());
    }

    #[test]
    fn test_all_kinds_survive_both_codecs() {
        let messages = vec![
            SyncMessage::new(SyncPayload::PaddleUpdate(PaddleState {
                y: 10.0,
                sequence: 1,
            })),
            ball_msg(),
            SyncMessage::new(SyncPayload::ScoreUpdate(Score { left: 2, right: 1 })),
            SyncMessage::new(SyncPayload::GameOver(GameOverState {
                winner: Side::Right,
            })),
            SyncMessage::heartbeat(),
        ];

        for codec in [WireCodec::Json, WireCodec::Bincode] {
            for msg in &messages {
                let bytes = msg.encode(codec).unwrap();
                assert_eq!(&SyncMessage::decode(&bytes, codec).unwrap(), msg);
            }
        }
    }
}
