//! The request/response envelopes and their typed payloads.
//!
//! Every frame on the wire has the same outer shape:
//!
//! ```text
//! { "op": <int>, "payload": <op-specific JSON> }
//! ```
//!
//! Decoding happens in two stages. First the outer [`Frame`] is parsed,
//! leaving the payload as an untyped [`serde_json::Value`]. Then the
//! integer `op` is turned into an [`Op`] and the payload is decoded into
//! the one struct that op calls for. An unknown op, or a payload of the
//! wrong shape, is a [`ProtocolError`], never a panic.
//!
//! Inbound (client → coordinator) and outbound (coordinator → client)
//! frames are separate sum types, [`Request`] and [`Response`], because
//! the same op code can mean different payloads in each direction
//! (`Message` is `{body_md}` inbound but a full [`ChatLogEntry`] outbound).

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{ChatStatus, Op, ProtocolError, ServerId, SteamId};

// ---------------------------------------------------------------------------
// Frame: stage one
// ---------------------------------------------------------------------------

/// The raw envelope, before the payload is interpreted.
///
/// `op` is kept as a wide integer so an out-of-range code surfaces as
/// [`ProtocolError::UnknownOp`] rather than a generic decode failure.
/// A missing `payload` decodes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub op: i64,
    #[serde(default)]
    pub payload: Value,
}

fn payload<T: DeserializeOwned>(
    op: Op,
    value: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value)
        .map_err(|source| ProtocolError::Payload { op, source })
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// `JoinQueue` / `LeaveQueue` payload: the lobbies to enter or leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePayload {
    pub servers: Vec<ServerId>,
}

/// Inbound `Message` payload: a chat line in markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub body_md: String,
}

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    JoinQueue(QueuePayload),
    LeaveQueue(QueuePayload),
    Message(MessagePayload),
}

impl Request {
    /// The operation code of this request.
    pub fn op(&self) -> Op {
        match self {
            Self::JoinQueue(_) => Op::JoinQueue,
            Self::LeaveQueue(_) => Op::LeaveQueue,
            Self::Message(_) => Op::Message,
        }
    }
}

impl TryFrom<Frame> for Request {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let op = Op::try_from(frame.op)?;
        match op {
            Op::JoinQueue => Ok(Self::JoinQueue(payload(op, frame.payload)?)),
            Op::LeaveQueue => {
                Ok(Self::LeaveQueue(payload(op, frame.payload)?))
            }
            Op::Message => Ok(Self::Message(payload(op, frame.payload)?)),
            other => Err(ProtocolError::UnexpectedOp(other)),
        }
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut frame = serializer.serialize_struct("Request", 2)?;
        frame.serialize_field("op", &self.op())?;
        match self {
            Self::JoinQueue(p) | Self::LeaveQueue(p) => {
                frame.serialize_field("payload", p)?
            }
            Self::Message(p) => frame.serialize_field("payload", p)?,
        }
        frame.end()
    }
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let frame = Frame::deserialize(deserializer)?;
        Self::try_from(frame).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// A connected user as shown in the user list and in match rosters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub steam_id: SteamId,
    pub hash: String,
}

/// The queued members of one lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyState {
    pub server_id: ServerId,
    pub members: Vec<SteamId>,
}

/// `StateUpdate` payload.
///
/// A *partial* update has `update_users == false` and an empty `users`
/// list; clients keep their previous user list in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdatePayload {
    pub update_users: bool,
    pub update_servers: bool,
    pub servers: Vec<LobbyState>,
    pub users: Vec<Member>,
}

/// Where matched players should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyServer {
    pub name: String,
    pub short_name: String,
    pub cc: String,
    pub connect_url: String,
    pub connect_command: String,
}

/// `StartGame` payload, sent only to the matched players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartPayload {
    pub server: LobbyServer,
    pub users: Vec<Member>,
}

/// `Purge` payload: message ids removed from the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgePayload {
    pub message_ids: Vec<i64>,
}

/// `ChatStatusChange` payload, sent only to the affected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStatusChangePayload {
    pub status: ChatStatus,
    pub reason: String,
}

/// `Bye` payload, broadcast at shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByePayload {
    pub message: String,
}

/// One chat line, as stored and as broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub message_id: i64,
    pub steam_id: SteamId,
    pub created_on: DateTime<Utc>,
    pub personaname: String,
    pub avatarhash: String,
    pub permission_level: i32,
    pub body_md: String,
    #[serde(default)]
    pub deleted: bool,
}

/// A frame sent by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    StateUpdate(StateUpdatePayload),
    StartGame(GameStartPayload),
    Message(ChatLogEntry),
    Purge(PurgePayload),
    Bye(ByePayload),
    ChatStatusChange(ChatStatusChangePayload),
}

impl Response {
    /// The operation code of this response.
    pub fn op(&self) -> Op {
        match self {
            Self::StateUpdate(_) => Op::StateUpdate,
            Self::StartGame(_) => Op::StartGame,
            Self::Message(_) => Op::Message,
            Self::Purge(_) => Op::Purge,
            Self::Bye(_) => Op::Bye,
            Self::ChatStatusChange(_) => Op::ChatStatusChange,
        }
    }
}

impl TryFrom<Frame> for Response {
    type Error = ProtocolError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let op = Op::try_from(frame.op)?;
        let value = frame.payload;
        Ok(match op {
            Op::StateUpdate => Self::StateUpdate(payload(op, value)?),
            Op::StartGame => Self::StartGame(payload(op, value)?),
            Op::Message => Self::Message(payload(op, value)?),
            Op::Purge => Self::Purge(payload(op, value)?),
            Op::Bye => Self::Bye(payload(op, value)?),
            Op::ChatStatusChange => {
                Self::ChatStatusChange(payload(op, value)?)
            }
            other => return Err(ProtocolError::UnexpectedOp(other)),
        })
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut frame = serializer.serialize_struct("Response", 2)?;
        frame.serialize_field("op", &self.op())?;
        match self {
            Self::StateUpdate(p) => frame.serialize_field("payload", p)?,
            Self::StartGame(p) => frame.serialize_field("payload", p)?,
            Self::Message(p) => frame.serialize_field("payload", p)?,
            Self::Purge(p) => frame.serialize_field("payload", p)?,
            Self::Bye(p) => frame.serialize_field("payload", p)?,
            Self::ChatStatusChange(p) => frame.serialize_field("payload", p)?,
        }
        frame.end()
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let frame = Frame::deserialize(deserializer)?;
        Self::try_from(frame).map_err(de::Error::custom)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client parses these frames, so the tests pin the exact
    //! JSON shapes rather than only checking that values survive a trip.

    use serde_json::json;

    use super::*;

    fn decode_request(raw: &str) -> Result<Request, ProtocolError> {
        let frame: Frame =
            serde_json::from_str(raw).map_err(ProtocolError::Decode)?;
        Request::try_from(frame)
    }

    // =====================================================================
    // Request: two-stage decode
    // =====================================================================

    #[test]
    fn test_request_join_queue_decodes_servers() {
        let req = decode_request(r#"{"op":0,"payload":{"servers":[1,7]}}"#)
            .unwrap();
        assert_eq!(
            req,
            Request::JoinQueue(QueuePayload {
                servers: vec![ServerId(1), ServerId(7)]
            })
        );
    }

    #[test]
    fn test_request_message_decodes_body() {
        let req = decode_request(r#"{"op":2,"payload":{"body_md":"hi"}}"#)
            .unwrap();
        assert_eq!(
            req,
            Request::Message(MessagePayload {
                body_md: "hi".into()
            })
        );
    }

    #[test]
    fn test_request_unknown_op_returns_unknown_op() {
        let err = decode_request(r#"{"op":42,"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownOp(42)));
    }

    #[test]
    fn test_request_outbound_op_returns_unexpected_op() {
        let err =
            decode_request(r#"{"op":4,"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedOp(Op::StartGame)));
    }

    #[test]
    fn test_request_wrong_payload_shape_returns_payload_error() {
        let err = decode_request(r#"{"op":0,"payload":{"servers":"all"}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Payload {
                op: Op::JoinQueue,
                ..
            }
        ));
    }

    #[test]
    fn test_request_missing_payload_returns_payload_error() {
        let err = decode_request(r#"{"op":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload { .. }));
    }

    #[test]
    fn test_request_garbage_returns_decode_error() {
        let err = decode_request("not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_request_serializes_as_envelope() {
        let req = Request::LeaveQueue(QueuePayload {
            servers: vec![ServerId(3)],
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"op": 1, "payload": {"servers": [3]}}));
    }

    // =====================================================================
    // Response: JSON shapes
    // =====================================================================

    #[test]
    fn test_response_state_update_json_format() {
        let resp = Response::StateUpdate(StateUpdatePayload {
            update_users: true,
            update_servers: true,
            servers: vec![LobbyState {
                server_id: ServerId(7),
                members: vec![SteamId::from_account(1)],
            }],
            users: vec![Member {
                name: "alice".into(),
                steam_id: SteamId::from_account(1),
                hash: "abc".into(),
            }],
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            json!({
                "op": 3,
                "payload": {
                    "update_users": true,
                    "update_servers": true,
                    "servers": [{"server_id": 7, "members": ["76561197960265729"]}],
                    "users": [{"name": "alice", "steam_id": "76561197960265729", "hash": "abc"}]
                }
            })
        );
    }

    #[test]
    fn test_response_start_game_json_format() {
        let resp = Response::StartGame(GameStartPayload {
            server: LobbyServer {
                name: "Uncletopia | Seattle".into(),
                short_name: "sea-1".into(),
                cc: "us".into(),
                connect_url: "steam://connect/10.0.0.1:27015".into(),
                connect_command: "connect sea-1.example:27015".into(),
            },
            users: vec![],
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["op"], 4);
        assert_eq!(json["payload"]["server"]["short_name"], "sea-1");
        assert_eq!(
            json["payload"]["server"]["connect_url"],
            "steam://connect/10.0.0.1:27015"
        );
    }

    #[test]
    fn test_response_message_carries_full_chat_log_entry() {
        let created_on = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let resp = Response::Message(ChatLogEntry {
            message_id: 5,
            steam_id: SteamId::from_account(2),
            created_on,
            personaname: "bob".into(),
            avatarhash: "ff".into(),
            permission_level: 10,
            body_md: "gg".into(),
            deleted: false,
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["op"], 2);
        assert_eq!(json["payload"]["message_id"], 5);
        assert_eq!(json["payload"]["steam_id"], "76561197960265730");
        assert_eq!(json["payload"]["created_on"], "2024-05-01T12:00:00Z");
        assert_eq!(json["payload"]["body_md"], "gg");
        assert_eq!(json["payload"]["deleted"], false);
    }

    #[test]
    fn test_response_purge_and_status_change_json_format() {
        let purge = serde_json::to_value(Response::Purge(PurgePayload {
            message_ids: vec![5, 6, 7],
        }))
        .unwrap();
        assert_eq!(purge, json!({"op": 5, "payload": {"message_ids": [5, 6, 7]}}));

        let status = serde_json::to_value(Response::ChatStatusChange(
            ChatStatusChangePayload {
                status: ChatStatus::Readonly,
                reason: "spam".into(),
            },
        ))
        .unwrap();
        assert_eq!(
            status,
            json!({"op": 7, "payload": {"status": "readonly", "reason": "spam"}})
        );
    }

    #[test]
    fn test_response_decodes_by_op() {
        let resp: Response =
            serde_json::from_str(r#"{"op":6,"payload":{"message":"bye"}}"#)
                .unwrap();
        assert_eq!(
            resp,
            Response::Bye(ByePayload {
                message: "bye".into()
            })
        );
    }

    #[test]
    fn test_response_inbound_op_is_rejected() {
        let result: Result<Response, _> =
            serde_json::from_str(r#"{"op":0,"payload":{"servers":[]}}"#);
        assert!(result.is_err());
    }
}
