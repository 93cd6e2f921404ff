use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{ChannelError, Result};
use crate::packet::{encode_packet, Packet, PacketConfig};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete packets to any `Write` stream.
pub struct PacketWriter<W> {
    inner: W,
    buf: BytesMut,
    config: PacketConfig,
}

impl<W: Write> PacketWriter<W> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, PacketConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: W, config: PacketConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write one packet and flush (blocking).
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let size = packet.body().len();
        if size > self.config.max_packet_size {
            return Err(ChannelError::PacketTooLarge {
                size,
                max: self.config.max_packet_size,
            });
        }

        self.buf.clear();
        encode_packet(packet, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(ChannelError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(unix)]
impl PacketWriter<std::os::unix::net::UnixStream> {
    /// Create a packet writer for a Unix stream and apply write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: PacketConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::packet::{decode_packet, DEFAULT_MAX_PACKET};

    #[test]
    fn written_packets_decode() {
        let mut writer = PacketWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_packet(&Packet::Text("a".into())).unwrap();
        writer
            .write_packet(&Packet::Binary(Bytes::from_static(b"\x01\x02")))
            .unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        assert_eq!(
            decode_packet(&mut wire, DEFAULT_MAX_PACKET).unwrap(),
            Some(Packet::Text("a".into()))
        );
        assert_eq!(
            decode_packet(&mut wire, DEFAULT_MAX_PACKET).unwrap(),
            Some(Packet::Binary(Bytes::from_static(b"\x01\x02")))
        );
    }

    #[test]
    fn packet_too_large_rejected() {
        let cfg = PacketConfig {
            max_packet_size: 4,
            ..PacketConfig::default()
        };
        let mut writer = PacketWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer
            .write_packet(&Packet::Text("oversized".into()))
            .unwrap_err();
        assert!(matches!(err, ChannelError::PacketTooLarge { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn retries_interrupted_and_would_block() {
        let sink = FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            flush_failures: vec![ErrorKind::Interrupted],
            data: Vec::new(),
        };
        let mut writer = PacketWriter::new(sink);
        writer.write_packet(&Packet::Text("retry".into())).unwrap();

        assert_eq!(writer.into_inner().data.len(), 8 + 5);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = PacketWriter::new(ZeroWriter);
        let err = writer.write_packet(&Packet::Text("x".into())).unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionClosed));
    }

    #[test]
    fn broken_pipe_propagates() {
        let sink = FlakyWriter {
            failures: vec![ErrorKind::BrokenPipe],
            flush_failures: Vec::new(),
            data: Vec::new(),
        };
        let mut writer = PacketWriter::new(sink);
        let err = writer.write_packet(&Packet::Text("x".into())).unwrap_err();
        assert!(matches!(err, ChannelError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        flush_failures: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.failures.is_empty() {
                return Err(std::io::Error::from(self.failures.remove(0)));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_failures.is_empty() {
                return Err(std::io::Error::from(self.flush_failures.remove(0)));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
