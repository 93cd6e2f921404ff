use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};
use crate::packet::Packet;

/// Event: socket-level connect carrying client params.
pub const EVENT_CONNECT: &str = "connect";
/// Event: join a topic.
pub const EVENT_JOIN: &str = "join";
/// Event: leave a topic.
pub const EVENT_LEAVE: &str = "leave";
/// Event: reply to a referenced push.
pub const EVENT_REPLY: &str = "reply";

/// Topic used for socket-level messages.
pub const SOCKET_TOPIC: &str = "socket";

/// Structured message sent as a text packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub event: String,
    #[serde(rename = "ref")]
    pub reference: Option<u64>,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        reference: Option<u64>,
        payload: Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            reference,
            payload,
        }
    }

    /// Create a reply envelope for a referenced push.
    pub fn reply(topic: impl Into<String>, reference: u64, reply: &Reply) -> Self {
        Self {
            topic: topic.into(),
            event: EVENT_REPLY.to_string(),
            reference: Some(reference),
            payload: serde_json::json!({
                "status": reply.status(),
                "response": reply.response(),
            }),
        }
    }

    /// Serialize into a text packet.
    pub fn to_packet(&self) -> Result<Packet> {
        Ok(Packet::Text(serde_json::to_string(self)?))
    }

    /// Parse from the body of a text packet.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Interpret this envelope as a reply.
    pub fn as_reply(&self) -> Result<Reply> {
        if self.event != EVENT_REPLY {
            return Err(ChannelError::Protocol(format!(
                "expected '{}' event, got '{}'",
                EVENT_REPLY, self.event
            )));
        }
        let payload: ReplyPayload = serde_json::from_value(self.payload.clone())?;
        Ok(payload.into())
    }
}

/// Status field of a reply payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    status: ReplyStatus,
    #[serde(default)]
    response: Value,
}

impl From<ReplyPayload> for Reply {
    fn from(payload: ReplyPayload) -> Self {
        match payload.status {
            ReplyStatus::Ok => Reply::Ok(payload.response),
            ReplyStatus::Error => Reply::Error(payload.response),
        }
    }
}

/// Single-shot completion outcome of a join or push.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Value),
    Error(Value),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }

    pub fn status(&self) -> ReplyStatus {
        match self {
            Reply::Ok(_) => ReplyStatus::Ok,
            Reply::Error(_) => ReplyStatus::Error,
        }
    }

    pub fn response(&self) -> &Value {
        match self {
            Reply::Ok(value) | Reply::Error(value) => value,
        }
    }
}

/// Routing context carried as the first element of binary frame metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushContext {
    pub topic: String,
    pub event: String,
    #[serde(rename = "ref")]
    pub reference: Option<u64>,
}
