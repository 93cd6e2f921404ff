use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};

use crate::error::{ChannelError, Result};
use crate::packet::{decode_packet, Packet, PacketConfig, HEADER_SIZE, MAGIC};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Pulls whole packets off a `Read` stream.
///
/// A malformed header is reported once; the reader then skips ahead so the
/// following packets can still be read:
///
/// - oversized bodies are discarded by their declared length,
/// - any other header error drops bytes up to the next `"VX"` magic.
pub struct PacketReader<R> {
    inner: R,
    pending: BytesMut,
    /// Stream bytes still to be thrown away before the next header.
    discard: u64,
    config: PacketConfig,
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, PacketConfig::default())
    }

    pub fn with_config(inner: R, config: PacketConfig) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            discard: 0,
            config,
        }
    }

    /// Block until the next packet is complete.
    ///
    /// EOF yields `ChannelError::ConnectionClosed`.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            self.drop_discarded();
            if self.discard == 0 {
                match decode_packet(&mut self.pending, self.config.max_packet_size) {
                    Ok(Some(packet)) => return Ok(packet),
                    Ok(None) => {}
                    Err(err) => {
                        self.skip_bad_header(&err);
                        return Err(err);
                    }
                }
            }
            self.fill()?;
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn config(&self) -> &PacketConfig {
        &self.config
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(ChannelError::ConnectionClosed),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }

    fn drop_discarded(&mut self) {
        let n = usize::try_from(self.discard)
            .unwrap_or(usize::MAX)
            .min(self.pending.len());
        self.pending.advance(n);
        self.discard -= n as u64;
    }

    fn skip_bad_header(&mut self, err: &ChannelError) {
        match err {
            ChannelError::PacketTooLarge { size, .. } => {
                self.discard = (HEADER_SIZE + size) as u64;
                tracing::warn!(size, "discarding oversized packet");
            }
            ChannelError::InvalidMagic
            | ChannelError::UnknownPacketKind(_)
            | ChannelError::Protocol(_) => {
                let skipped = resync_offset(&self.pending);
                self.pending.advance(skipped);
                tracing::warn!(skipped, "skipped bytes after bad packet header");
            }
            // Body errors leave the buffer positioned at the next packet.
            _ => {}
        }
    }
}

/// Bytes to drop so the buffer starts at the next candidate header. A
/// trailing first magic byte is kept in case the rest is still in flight.
fn resync_offset(buf: &[u8]) -> usize {
    match buf
        .get(1..)
        .and_then(|rest| rest.windows(MAGIC.len()).position(|w| w == &MAGIC[..]))
    {
        Some(pos) => pos + 1,
        None if buf.last() == Some(&MAGIC[0]) && buf.len() > 1 => buf.len() - 1,
        None => buf.len(),
    }
}

#[cfg(unix)]
impl PacketReader<std::os::unix::net::UnixStream> {
    /// Create a packet reader for a Unix stream and apply read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: PacketConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, Bytes, BytesMut};

    use super::*;
    use crate::packet::{encode_packet, KIND_TEXT, MAGIC};

    fn wire(packets: &[Packet]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for packet in packets {
            encode_packet(packet, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_multiple_packets() {
        let bytes = wire(&[
            Packet::Text("one".into()),
            Packet::Binary(Bytes::from_static(b"two")),
        ]);
        let mut reader = PacketReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_packet().unwrap(), Packet::Text("one".into()));
        assert_eq!(
            reader.read_packet().unwrap(),
            Packet::Binary(Bytes::from_static(b"two"))
        );
        assert!(matches!(
            reader.read_packet(),
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[test]
    fn large_binary_spans_many_reads() {
        let body = Bytes::from(vec![0x5A; 64 * 1024]);
        let bytes = wire(&[Packet::Binary(body.clone())]);
        let mut reader = PacketReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_packet().unwrap(), Packet::Binary(body));
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[Packet::Text("slow".into())]);
        let mut reader = PacketReader::new(ByteByByteReader { bytes, pos: 0 });

        assert_eq!(reader.read_packet().unwrap(), Packet::Text("slow".into()));
    }

    #[test]
    fn connection_closed_mid_packet() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u8(KIND_TEXT);
        partial.put_u8(0);
        partial.put_u32(16);
        partial.put_slice(b"only-part");

        let mut reader = PacketReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionClosed));
    }

    #[test]
    fn oversized_packet_in_stream() {
        let bytes = wire(&[Packet::Binary(Bytes::from(vec![0u8; 64]))]);
        let cfg = PacketConfig {
            max_packet_size: 16,
            ..PacketConfig::default()
        };
        let mut reader = PacketReader::with_config(Cursor::new(bytes), cfg);

        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, ChannelError::PacketTooLarge { size: 64, max: 16 }));
    }

    #[test]
    fn bad_magic_reported_once_then_next_packet_read() {
        let mut bytes = vec![0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend(wire(&[Packet::Text("after".into())]));
        let mut reader = PacketReader::new(Cursor::new(bytes));

        assert!(matches!(reader.read_packet(), Err(ChannelError::InvalidMagic)));
        assert_eq!(reader.read_packet().unwrap(), Packet::Text("after".into()));
        assert!(matches!(
            reader.read_packet(),
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[test]
    fn unknown_kind_and_reserved_byte_skip_ahead() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&[0x09, 0x00, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&[KIND_TEXT, 0x01, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend(wire(&[Packet::Binary(Bytes::from_static(b"ok"))]));
        let mut reader = PacketReader::new(Cursor::new(bytes));

        assert!(matches!(
            reader.read_packet(),
            Err(ChannelError::UnknownPacketKind(0x09))
        ));
        assert!(matches!(reader.read_packet(), Err(ChannelError::Protocol(_))));
        assert_eq!(
            reader.read_packet().unwrap(),
            Packet::Binary(Bytes::from_static(b"ok"))
        );
    }

    #[test]
    fn oversized_body_is_discarded_across_reads() {
        let mut bytes = wire(&[Packet::Binary(Bytes::from(vec![b'V'; 40 * 1024]))]);
        bytes.extend(wire(&[Packet::Text("next".into())]));
        let cfg = PacketConfig {
            max_packet_size: 1024,
            ..PacketConfig::default()
        };
        let mut reader = PacketReader::with_config(Cursor::new(bytes), cfg);

        assert!(matches!(
            reader.read_packet(),
            Err(ChannelError::PacketTooLarge { size: 40960, max: 1024 })
        ));
        assert_eq!(reader.read_packet().unwrap(), Packet::Text("next".into()));
    }

    #[test]
    fn resync_keeps_split_magic() {
        assert_eq!(resync_offset(b"\xFF\xFFabcVX"), 5);
        assert_eq!(resync_offset(b"\xFF\xFFabcdV"), 6);
        assert_eq!(resync_offset(b"\xFF\xFFabcdef"), 8);
        assert_eq!(resync_offset(b"VXVX\x09\x00"), 2);
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[Packet::Text("ok".into())]);
        let mut reader = PacketReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes),
        });

        assert_eq!(reader.read_packet().unwrap(), Packet::Text("ok".into()));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::PacketWriter::new(left);
        let mut reader = PacketReader::with_config_unix(right, PacketConfig::default()).unwrap();

        writer.write_packet(&Packet::Text("ping".into())).unwrap();
        assert_eq!(reader.read_packet().unwrap(), Packet::Text("ping".into()));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
