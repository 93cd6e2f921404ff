use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChannelError, Result};

/// Packet header: magic (2) + kind (1) + reserved (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "VX" (0x56 0x58).
pub const MAGIC: [u8; 2] = [0x56, 0x58];

/// Kind byte for a UTF-8 JSON envelope.
pub const KIND_TEXT: u8 = 0x01;

/// Kind byte for a binary frame.
pub const KIND_BINARY: u8 = 0x02;

/// Default maximum packet body size: 16 MiB.
pub const DEFAULT_MAX_PACKET: usize = 16 * 1024 * 1024;

/// One transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A structured JSON envelope.
    Text(String),
    /// A length-prefixed binary frame.
    Binary(Bytes),
}

impl Packet {
    /// The kind byte written on the wire.
    pub fn kind(&self) -> u8 {
        match self {
            Packet::Text(_) => KIND_TEXT,
            Packet::Binary(_) => KIND_BINARY,
        }
    }

    /// The packet body.
    pub fn body(&self) -> &[u8] {
        match self {
            Packet::Text(text) => text.as_bytes(),
            Packet::Binary(bytes) => bytes.as_ref(),
        }
    }

    /// The total wire size of this packet (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body().len()
    }
}

/// Encode a packet into the stream wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────┬──────────┬───────────┬──────────────┐
/// │ Magic (2B) │ Kind     │ Reserved │ Length    │ Body         │
/// │ 0x56 0x58  │ (1B)     │ (1B, 0)  │ (4B BE)   │ (Length B)   │
/// │ "VX"       │          │          │           │              │
/// └────────────┴──────────┴──────────┴───────────┴──────────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    let body = packet.body();
    let len = u32::try_from(body.len()).map_err(|_| ChannelError::PacketTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(packet.kind());
    dst.put_u8(0);
    dst.put_u32(len);
    dst.put_slice(body);
    Ok(())
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut, max_body: usize) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(ChannelError::InvalidMagic);
    }

    let kind = src[2];
    if kind != KIND_TEXT && kind != KIND_BINARY {
        return Err(ChannelError::UnknownPacketKind(kind));
    }
    if src[3] != 0 {
        return Err(ChannelError::Protocol(format!(
            "reserved header byte set (0x{:02x})",
            src[3]
        )));
    }

    let mut len_bytes = &src[4..8];
    let body_len = len_bytes.get_u32() as usize;

    if body_len > max_body {
        return Err(ChannelError::PacketTooLarge {
            size: body_len,
            max: max_body,
        });
    }

    if src.len() < HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len).freeze();

    let packet = if kind == KIND_TEXT {
        let text = std::str::from_utf8(&body)?;
        Packet::Text(text.to_owned())
    } else {
        Packet::Binary(body)
    };

    Ok(Some(packet))
}

/// Configuration for packet streams.
#[derive(Debug, Clone)]
pub struct PacketConfig {
    /// Maximum packet body size in bytes. Default: 16 MiB.
    pub max_packet_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_binary_roundtrip() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::Text("{\"event\":\"join\"}".into()), &mut buf).unwrap();
        encode_packet(&Packet::Binary(Bytes::from_static(b"\x00\x01")), &mut buf).unwrap();

        let first = decode_packet(&mut buf, DEFAULT_MAX_PACKET).unwrap().unwrap();
        let second = decode_packet(&mut buf, DEFAULT_MAX_PACKET).unwrap().unwrap();

        assert_eq!(first, Packet::Text("{\"event\":\"join\"}".into()));
        assert_eq!(second, Packet::Binary(Bytes::from_static(b"\x00\x01")));
        assert!(buf.is_empty());
    }

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::Binary(Bytes::from_static(b"abc")), &mut buf).unwrap();

        assert_eq!(&buf[..HEADER_SIZE], &[0x56, 0x58, 0x02, 0x00, 0, 0, 0, 3]);
        assert_eq!(
            Packet::Binary(Bytes::from_static(b"abc")).wire_size(),
            buf.len()
        );
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x56, 0x58, 0x01][..]);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_PACKET).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::Text("hello".into()), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_packet(&mut buf, DEFAULT_MAX_PACKET).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x01, 0x00, 0, 0, 0, 0][..]);
        let result = decode_packet(&mut buf, DEFAULT_MAX_PACKET);
        assert!(matches!(result, Err(ChannelError::InvalidMagic)));
    }

    #[test]
    fn decode_unknown_kind() {
        let mut buf = BytesMut::from(&[0x56, 0x58, 0x07, 0x00, 0, 0, 0, 0][..]);
        let result = decode_packet(&mut buf, DEFAULT_MAX_PACKET);
        assert!(matches!(result, Err(ChannelError::UnknownPacketKind(0x07))));
    }

    #[test]
    fn decode_body_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(KIND_BINARY);
        buf.put_u8(0);
        buf.put_u32(1024);

        let result = decode_packet(&mut buf, 16);
        assert!(matches!(
            result,
            Err(ChannelError::PacketTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn decode_text_must_be_utf8() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(KIND_TEXT);
        buf.put_u8(0);
        buf.put_u32(2);
        buf.put_slice(&[0xC3, 0x28]);

        let result = decode_packet(&mut buf, DEFAULT_MAX_PACKET);
        assert!(matches!(result, Err(ChannelError::InvalidText(_))));
    }

    #[test]
    fn empty_bodies() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::Text(String::new()), &mut buf).unwrap();

        let packet = decode_packet(&mut buf, DEFAULT_MAX_PACKET).unwrap().unwrap();
        assert_eq!(packet, Packet::Text(String::new()));
    }
}
