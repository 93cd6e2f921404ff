use std::io::{Read, Write};
use std::sync::mpsc;

use crate::error::{ChannelError, Result};
use crate::packet::{Packet, PacketConfig};
use crate::reader::PacketReader;
use crate::writer::PacketWriter;

/// A bidirectional packet transport.
pub trait Transport {
    /// Send one packet.
    fn send(&mut self, packet: Packet) -> Result<()>;

    /// Receive the next packet (blocking).
    ///
    /// Returns `Err(ChannelError::ConnectionClosed)` once the peer is gone.
    fn recv(&mut self) -> Result<Packet>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, packet: Packet) -> Result<()> {
        (**self).send(packet)
    }

    fn recv(&mut self) -> Result<Packet> {
        (**self).recv()
    }
}

/// Packet transport over a byte stream split into read and write halves.
pub struct StreamTransport<R, W> {
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    /// Create a transport with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, PacketConfig::default())
    }

    /// Create a transport with explicit configuration.
    pub fn with_config(reader: R, writer: W, config: PacketConfig) -> Self {
        Self {
            reader: PacketReader::with_config(reader, config.clone()),
            writer: PacketWriter::with_config(writer, config),
        }
    }

    /// Split back into the packet reader and writer.
    pub fn into_parts(self) -> (PacketReader<R>, PacketWriter<W>) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W: Write> Transport for StreamTransport<R, W> {
    fn send(&mut self, packet: Packet) -> Result<()> {
        tracing::trace!(kind = packet.kind(), size = packet.body().len(), "send packet");
        self.writer.write_packet(&packet)
    }

    fn recv(&mut self) -> Result<Packet> {
        let packet = self.reader.read_packet()?;
        tracing::trace!(kind = packet.kind(), size = packet.body().len(), "recv packet");
        Ok(packet)
    }
}

#[cfg(unix)]
pub type UnixTransport =
    StreamTransport<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream>;

#[cfg(unix)]
impl StreamTransport<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream> {
    /// Connect to a Unix socket path.
    pub fn connect_unix(
        path: impl AsRef<std::path::Path>,
        config: PacketConfig,
    ) -> Result<UnixTransport> {
        let stream = std::os::unix::net::UnixStream::connect(path)?;
        Self::from_unix(stream, config)
    }

    /// Wrap an already connected Unix stream, applying the configured timeouts.
    pub fn from_unix(
        stream: std::os::unix::net::UnixStream,
        config: PacketConfig,
    ) -> Result<UnixTransport> {
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            reader: PacketReader::with_config_unix(reader_stream, config.clone())?,
            writer: PacketWriter::with_config_unix(stream, config)?,
        })
    }
}

/// In-process transport; one end of a connected pair.
pub struct MemoryTransport {
    tx: mpsc::Sender<Packet>,
    rx: mpsc::Receiver<Packet>,
}

impl MemoryTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel();
        let (right_tx, left_rx) = mpsc::channel();
        (
            Self {
                tx: left_tx,
                rx: left_rx,
            },
            Self {
                tx: right_tx,
                rx: right_rx,
            },
        )
    }

    /// Receive a packet if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<Packet>> {
        match self.rx.try_recv() {
            Ok(packet) => Ok(Some(packet)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(ChannelError::ConnectionClosed),
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, packet: Packet) -> Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| ChannelError::ConnectionClosed)
    }

    fn recv(&mut self) -> Result<Packet> {
        self.rx.recv().map_err(|_| ChannelError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;

    use super::*;

    #[test]
    fn memory_pair_is_bidirectional() {
        let (mut left, mut right) = MemoryTransport::pair();

        left.send(Packet::Text("hi".into())).unwrap();
        right.send(Packet::Binary(Bytes::from_static(b"\x00"))).unwrap();

        assert_eq!(right.recv().unwrap(), Packet::Text("hi".into()));
        assert_eq!(
            left.recv().unwrap(),
            Packet::Binary(Bytes::from_static(b"\x00"))
        );
        assert_eq!(left.try_recv().unwrap(), None);
    }

    #[test]
    fn memory_recv_after_peer_drop() {
        let (mut left, right) = MemoryTransport::pair();
        drop(right);

        assert!(matches!(left.recv(), Err(ChannelError::ConnectionClosed)));
        assert!(matches!(
            left.send(Packet::Text("x".into())),
            Err(ChannelError::ConnectionClosed)
        ));
    }

    #[test]
    fn stream_transport_writes_and_reads() {
        let mut out = StreamTransport::new(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new());
        out.send(Packet::Text("{}".into())).unwrap();
        let (_, writer) = out.into_parts();
        let wire = writer.into_inner();

        let mut back = StreamTransport::new(Cursor::new(wire), std::io::sink());
        assert_eq!(back.recv().unwrap(), Packet::Text("{}".into()));
        assert!(matches!(back.recv(), Err(ChannelError::ConnectionClosed)));
    }

    #[test]
    #[cfg(unix)]
    fn unix_transport_roundtrip() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut client = UnixTransport::from_unix(left, PacketConfig::default()).unwrap();
        let mut server = UnixTransport::from_unix(right, PacketConfig::default()).unwrap();

        client
            .send(Packet::Binary(Bytes::from_static(b"pcm")))
            .unwrap();
        assert_eq!(
            server.recv().unwrap(),
            Packet::Binary(Bytes::from_static(b"pcm"))
        );
    }
}
