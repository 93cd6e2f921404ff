use std::collections::BTreeSet;

use bytes::Bytes;
use serde_json::{Map, Value};
use voxframe_frame::{decode_as, FrameConfig};

use crate::envelope::{
    Envelope, PushContext, Reply, EVENT_CONNECT, EVENT_JOIN, EVENT_LEAVE,
};
use crate::error::{ChannelError, Result};
use crate::packet::Packet;
use crate::transport::Transport;

/// Decides whether a join is accepted. Receives the topic and join payload.
pub type JoinPolicy = Box<dyn FnMut(&str, &Value) -> Reply + Send>;

/// A client message surfaced by [`ServerConn::next_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A structured push.
    Structured(Envelope),
    /// A binary push, split into routing context, caller info and payload.
    Binary {
        context: PushContext,
        info: Value,
        payload: Bytes,
    },
}

/// Server end of a push channel connection.
///
/// Handles connect/join/leave bookkeeping itself and yields every other
/// client message.
pub struct ServerConn<T> {
    transport: T,
    frame_config: FrameConfig,
    join_policy: JoinPolicy,
    joined: BTreeSet<String>,
    params: Map<String, Value>,
}

impl<T: Transport> ServerConn<T> {
    /// Wrap a transport, accepting every join.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            frame_config: FrameConfig::default(),
            join_policy: Box::new(|_, _| Reply::Ok(Value::Object(Map::new()))),
            joined: BTreeSet::new(),
            params: Map::new(),
        }
    }

    /// Set the frame decoding limits.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Set the join policy.
    pub fn with_join_policy<F>(mut self, policy: F) -> Self
    where
        F: FnMut(&str, &Value) -> Reply + Send + 'static,
    {
        self.join_policy = Box::new(policy);
        self
    }

    /// Receive until a client push arrives (blocking).
    pub fn next_event(&mut self) -> Result<ServerEvent> {
        loop {
            match self.transport.recv()? {
                Packet::Text(text) => {
                    let env = Envelope::from_text(&text)?;
                    match env.event.as_str() {
                        EVENT_CONNECT => self.on_connect(env),
                        EVENT_JOIN => self.on_join(env)?,
                        EVENT_LEAVE => {
                            tracing::info!(topic = %env.topic, "client left");
                            self.joined.remove(&env.topic);
                        }
                        _ => {
                            self.ensure_joined(&env.topic)?;
                            return Ok(ServerEvent::Structured(env));
                        }
                    }
                }
                Packet::Binary(frame) => {
                    let ((context, info), payload): ((PushContext, Value), Bytes) =
                        decode_as(&frame, self.frame_config.max_metadata_size)?;
                    self.ensure_joined(&context.topic)?;
                    tracing::debug!(
                        topic = %context.topic,
                        event = %context.event,
                        size = payload.len(),
                        "binary push"
                    );
                    return Ok(ServerEvent::Binary {
                        context,
                        info,
                        payload,
                    });
                }
            }
        }
    }

    /// Answer a referenced push.
    pub fn reply(&mut self, topic: &str, reference: u64, reply: &Reply) -> Result<()> {
        let env = Envelope::reply(topic, reference, reply);
        self.transport.send(env.to_packet()?)
    }

    /// Send a server event on a topic.
    pub fn broadcast(&mut self, topic: &str, event: &str, payload: Value) -> Result<()> {
        let env = Envelope::new(topic, event, None, payload);
        self.transport.send(env.to_packet()?)
    }

    /// Topics the client currently has joined.
    pub fn joined_topics(&self) -> impl Iterator<Item = &str> {
        self.joined.iter().map(String::as_str)
    }

    /// Params the client sent on connect.
    pub fn connect_params(&self) -> &Map<String, Value> {
        &self.params
    }

    fn on_connect(&mut self, env: Envelope) {
        if let Value::Object(params) = env.payload {
            self.params = params;
        }
        tracing::info!(params = self.params.len(), "client connected");
    }

    fn on_join(&mut self, env: Envelope) -> Result<()> {
        let reference = env
            .reference
            .ok_or_else(|| ChannelError::Protocol("join without ref".to_string()))?;
        let reply = (self.join_policy)(&env.topic, &env.payload);

        if reply.is_ok() {
            tracing::info!(topic = %env.topic, "client joined");
            self.joined.insert(env.topic.clone());
        } else {
            tracing::warn!(topic = %env.topic, "join refused");
        }
        self.reply(&env.topic, reference, &reply)
    }

    fn ensure_joined(&self, topic: &str) -> Result<()> {
        if self.joined.contains(topic) {
            Ok(())
        } else {
            Err(ChannelError::NotJoined(topic.to_string()))
        }
    }
}
