//! Outbound message routing: binary payloads are framed, everything else is
//! passed through as a structured value.

use bytes::Bytes;
use serde_json::Value;

use crate::codec::encode;
use crate::error::Result;

/// A message about to be handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Metadata paired with a binary payload. Always length-prefix framed.
    Binary { metadata: Value, payload: Bytes },
    /// A plain structured message.
    Structured(Value),
}

impl Outbound {
    /// Build a binary message from explicit metadata and payload.
    pub fn binary(metadata: Value, payload: impl Into<Bytes>) -> Self {
        Self::Binary {
            metadata,
            payload: payload.into(),
        }
    }

    /// Build a structured message.
    pub fn structured(value: Value) -> Self {
        Self::Structured(value)
    }

    /// Whether this message takes the framed binary path.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }
}

/// The transport-ready form of an [`Outbound`].
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// A length-prefixed frame.
    Binary(Bytes),
    /// A structured value, to be wrapped in the transport's text envelope.
    Structured(Value),
}

/// Route an outbound message to the framer or the structured path.
pub fn transport_encode(outbound: Outbound) -> Result<Encoded> {
    match outbound {
        Outbound::Binary { metadata, payload } => encode(&metadata, &payload).map(Encoded::Binary),
        Outbound::Structured(value) => Ok(Encoded::Structured(value)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::{decode, DEFAULT_MAX_METADATA};

    #[test]
    fn binary_takes_framed_path() {
        let meta = json!([{"topic": "lobby"}, {"info": "foo"}]);
        let out = Outbound::binary(meta.clone(), vec![1u8, 2, 3]);
        assert!(out.is_binary());

        let Encoded::Binary(frame) = transport_encode(out).unwrap() else {
            panic!("expected a framed message");
        };
        let decoded = decode(&frame, DEFAULT_MAX_METADATA).unwrap();
        assert_eq!(decoded.metadata, meta);
        assert_eq!(decoded.payload.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn structured_passes_through() {
        let value = json!({"slide": 3});
        let out = Outbound::structured(value.clone());
        assert!(!out.is_binary());

        assert_eq!(
            transport_encode(out).unwrap(),
            Encoded::Structured(value)
        );
    }

    #[test]
    fn empty_binary_payload_still_framed() {
        let encoded = transport_encode(Outbound::binary(json!({}), Bytes::new())).unwrap();
        assert_eq!(encoded, Encoded::Binary(Bytes::from_static(b"\0\0\0\x02{}")));
    }
}
