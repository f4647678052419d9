//! Realtime protocol message types
//!
//! Phoenix channel frames exchanged with the realtime endpoint, JSON encoded.
//! Every frame is `{topic, event, payload, ref}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ChangeKind;

/// Protocol version appended to the socket URL
pub const PROTOCOL_VSN: &str = "1.0.0";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

/// A raw Phoenix frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    /// Join the task change channel for one user
    pub fn join(topic: &str, user_id: &str, access_token: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": "tasks",
                        "filter": format!("user_id=eq.{}", user_id),
                    }],
                },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
        }
    }

    /// Keep-alive on the reserved `phoenix` topic
    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Channel topic for a user's task changes
pub fn task_topic(user_id: &str) -> String {
    format!("realtime:tasks:{}", user_id)
}

/// Interpreted server frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Reply to a frame we sent
    Reply {
        reference: Option<String>,
        ok: bool,
        response: Value,
    },
    /// A row in the subscribed table changed
    Change {
        kind: ChangeKind,
        task_id: Option<String>,
    },
    /// The channel crashed server-side
    Error(String),
    /// The server closed the channel
    Close,
    /// Anything else (presence, system notices)
    Other,
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_frame(Frame::decode(text)?))
    }

    pub fn from_frame(frame: Frame) -> Self {
        match frame.event.as_str() {
            EVENT_REPLY => ServerEvent::Reply {
                ok: frame.payload.get("status").and_then(Value::as_str) == Some("ok"),
                response: frame.payload.get("response").cloned().unwrap_or(Value::Null),
                reference: frame.reference,
            },
            EVENT_POSTGRES_CHANGES => {
                let data = frame.payload.get("data").unwrap_or(&frame.payload);
                let kind = data
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(ChangeKind::from_wire)
                    .unwrap_or(ChangeKind::Update);
                // Deletes only carry the old record
                let task_id = ["record", "old_record"]
                    .iter()
                    .filter_map(|key| data.get(key)?.get("id")?.as_str())
                    .next()
                    .map(str::to_string);
                ServerEvent::Change { kind, task_id }
            }
            EVENT_ERROR => ServerEvent::Error(frame.payload.to_string()),
            EVENT_CLOSE => ServerEvent::Close,
            _ => ServerEvent::Other,
        }
    }
}
