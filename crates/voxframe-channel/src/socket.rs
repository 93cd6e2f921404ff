use std::collections::{HashMap, VecDeque};

use serde_json::{json, Map, Value};
use voxframe_frame::{transport_encode, Encoded, Outbound};

use crate::envelope::{
    Envelope, PushContext, Reply, EVENT_CONNECT, EVENT_JOIN, EVENT_LEAVE, EVENT_REPLY,
    SOCKET_TOPIC,
};
use crate::error::{ChannelError, Result};
use crate::packet::Packet;
use crate::transport::Transport;

/// Connect param carrying the page's CSRF token.
pub const CSRF_PARAM: &str = "_csrf_token";

/// Completion callback for a join or push, fired once with the server's reply.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send>;

/// Join state of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Join sent, reply not yet received.
    Joining,
    /// Join acknowledged; pushes are allowed.
    Joined,
    /// Join rejected; the topic may be joined again.
    Errored,
}

/// Parameters sent with the socket-level connect.
#[derive(Debug, Clone, Default)]
pub struct SocketConfig {
    pub params: Map<String, Value>,
}

impl SocketConfig {
    /// Add a connect param.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add the CSRF token param.
    pub fn with_csrf_token(self, token: impl Into<String>) -> Self {
        self.with_param(CSRF_PARAM, token.into())
    }
}

/// A server-initiated event on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

enum PendingKind {
    Join,
    Push,
}

struct Pending {
    topic: String,
    kind: PendingKind,
    callback: Option<ReplyCallback>,
}

/// Client end of a push channel connection.
///
/// The socket never reads on its own: callers drive it with [`Socket::poll`],
/// which fires reply callbacks and hands back server events.
pub struct Socket<T> {
    transport: T,
    next_ref: u64,
    channels: HashMap<String, ChannelState>,
    pending: HashMap<u64, Pending>,
    backlog: VecDeque<Incoming>,
}

impl<T: Transport> Socket<T> {
    /// Open the socket by sending the connect message with `config.params`.
    pub fn connect(mut transport: T, config: SocketConfig) -> Result<Self> {
        let param_count = config.params.len();
        let env = Envelope::new(
            SOCKET_TOPIC,
            EVENT_CONNECT,
            None,
            Value::Object(config.params),
        );
        transport.send(env.to_packet()?)?;
        tracing::info!(params = param_count, "socket connected");

        Ok(Self {
            transport,
            next_ref: 1,
            channels: HashMap::new(),
            pending: HashMap::new(),
            backlog: VecDeque::new(),
        })
    }

    /// Join `topic`. `on_reply` fires once when the server answers.
    ///
    /// Returns the join's ref.
    pub fn join<F>(&mut self, topic: &str, payload: Value, on_reply: F) -> Result<u64>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        if matches!(
            self.channels.get(topic),
            Some(ChannelState::Joining | ChannelState::Joined)
        ) {
            return Err(ChannelError::AlreadyJoined(topic.to_string()));
        }

        let reference = self.take_ref();
        let env = Envelope::new(topic, EVENT_JOIN, Some(reference), payload);
        self.transport.send(env.to_packet()?)?;

        self.channels
            .insert(topic.to_string(), ChannelState::Joining);
        self.pending.insert(
            reference,
            Pending {
                topic: topic.to_string(),
                kind: PendingKind::Join,
                callback: Some(Box::new(on_reply)),
            },
        );
        tracing::info!(topic, reference, "joining topic");
        Ok(reference)
    }

    /// Push an event on a joined topic without waiting for a reply.
    pub fn push(&mut self, topic: &str, event: &str, outbound: Outbound) -> Result<u64> {
        self.push_inner(topic, event, outbound, None)
    }

    /// Push an event and register a completion callback for its reply.
    pub fn push_with_reply<F>(
        &mut self,
        topic: &str,
        event: &str,
        outbound: Outbound,
        on_reply: F,
    ) -> Result<u64>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        self.push_inner(topic, event, outbound, Some(Box::new(on_reply)))
    }

    /// Leave a topic. Outstanding callbacks for it are dropped unfired.
    pub fn leave(&mut self, topic: &str) -> Result<()> {
        if self.channels.remove(topic).is_none() {
            return Err(ChannelError::NotJoined(topic.to_string()));
        }
        self.pending.retain(|_, pending| pending.topic != topic);

        let reference = self.take_ref();
        let env = Envelope::new(topic, EVENT_LEAVE, Some(reference), Value::Null);
        self.transport.send(env.to_packet()?)?;
        tracing::info!(topic, "left topic");
        Ok(())
    }

    /// Receive and dispatch one packet (blocking).
    ///
    /// Replies fire their callbacks and yield `None`; other server events are
    /// returned to the caller.
    pub fn poll(&mut self) -> Result<Option<Incoming>> {
        if let Some(incoming) = self.backlog.pop_front() {
            return Ok(Some(incoming));
        }

        match self.transport.recv()? {
            Packet::Text(text) => {
                let env = Envelope::from_text(&text)?;
                if env.event == EVENT_REPLY {
                    self.dispatch_reply(env)?;
                    return Ok(None);
                }
                Ok(Some(Incoming {
                    topic: env.topic,
                    event: env.event,
                    payload: env.payload,
                }))
            }
            Packet::Binary(frame) => {
                tracing::warn!(size = frame.len(), "dropping binary packet from server");
                Ok(None)
            }
        }
    }

    /// Poll until the join on `topic` is answered.
    ///
    /// Server events received meanwhile are queued and returned by later
    /// [`Socket::poll`] calls.
    pub fn poll_until_settled(&mut self, topic: &str) -> Result<ChannelState> {
        loop {
            match self.channels.get(topic) {
                None => return Err(ChannelError::NotJoined(topic.to_string())),
                Some(ChannelState::Joining) => {}
                Some(state) => return Ok(*state),
            }

            let incoming = match self.transport.recv()? {
                Packet::Text(text) => {
                    let env = Envelope::from_text(&text)?;
                    if env.event == EVENT_REPLY {
                        self.dispatch_reply(env)?;
                        continue;
                    }
                    Incoming {
                        topic: env.topic,
                        event: env.event,
                        payload: env.payload,
                    }
                }
                Packet::Binary(frame) => {
                    tracing::warn!(size = frame.len(), "dropping binary packet from server");
                    continue;
                }
            };
            self.backlog.push_back(incoming);
        }
    }

    /// Join state of `topic`, if it has been joined.
    pub fn channel_state(&self, topic: &str) -> Option<ChannelState> {
        self.channels.get(topic).copied()
    }

    /// Number of joins/pushes still waiting for a reply callback.
    pub fn pending_replies(&self) -> usize {
        self.pending.len()
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the socket and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn take_ref(&mut self) -> u64 {
        let reference = self.next_ref;
        self.next_ref = self.next_ref.wrapping_add(1);
        reference
    }

    fn push_inner(
        &mut self,
        topic: &str,
        event: &str,
        outbound: Outbound,
        callback: Option<ReplyCallback>,
    ) -> Result<u64> {
        if self.channels.get(topic) != Some(&ChannelState::Joined) {
            return Err(ChannelError::NotJoined(topic.to_string()));
        }

        let reference = self.take_ref();
        let outbound = match outbound {
            Outbound::Binary { metadata, payload } => {
                let context = PushContext {
                    topic: topic.to_string(),
                    event: event.to_string(),
                    reference: Some(reference),
                };
                Outbound::Binary {
                    metadata: json!([context, metadata]),
                    payload,
                }
            }
            structured => structured,
        };

        let packet = match transport_encode(outbound)? {
            Encoded::Binary(frame) => Packet::Binary(frame),
            Encoded::Structured(value) => {
                Envelope::new(topic, event, Some(reference), value).to_packet()?
            }
        };
        let size = packet.body().len();
        self.transport.send(packet)?;

        if let Some(callback) = callback {
            self.pending.insert(
                reference,
                Pending {
                    topic: topic.to_string(),
                    kind: PendingKind::Push,
                    callback: Some(callback),
                },
            );
        }
        tracing::debug!(topic, event, reference, size, "pushed");
        Ok(reference)
    }

    fn dispatch_reply(&mut self, env: Envelope) -> Result<()> {
        let Some(reference) = env.reference else {
            return Err(ChannelError::Protocol("reply without ref".to_string()));
        };
        let Some(pending) = self.pending.remove(&reference) else {
            tracing::debug!(topic = %env.topic, reference, "reply for unknown ref dropped");
            return Ok(());
        };

        let reply = env.as_reply()?;
        if let PendingKind::Join = pending.kind {
            if reply.is_ok() {
                tracing::info!(topic = %pending.topic, "joined topic");
                self.channels
                    .insert(pending.topic.clone(), ChannelState::Joined);
            } else {
                tracing::warn!(topic = %pending.topic, response = %reply.response(), "join rejected");
                self.channels
                    .insert(pending.topic.clone(), ChannelState::Errored);
            }
        }

        if let Some(callback) = pending.callback {
            callback(reply);
        }
        Ok(())
    }
}
