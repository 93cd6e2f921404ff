//! Push channel client for streaming framed audio.
//!
//! Connect a [`Socket`] over any [`Transport`], join a topic, and push
//! either structured events or binary audio frames. Binary pushes are
//! framed by `voxframe-frame` with `[context, info]` metadata so the
//! server can route them without a text envelope.
//!
//! Over byte streams every message travels in a small packet header that
//! marks it as text or binary; see [`packet`].

pub mod envelope;
pub mod error;
pub mod packet;
pub mod reader;
pub mod server;
pub mod session;
pub mod slides;
pub mod socket;
pub mod transport;
pub mod writer;

pub use envelope::{Envelope, PushContext, Reply, ReplyStatus};
pub use error::{ChannelError, Result};
pub use packet::{decode_packet, encode_packet, Packet, PacketConfig, DEFAULT_MAX_PACKET};
pub use reader::PacketReader;
pub use server::{ServerConn, ServerEvent};
pub use session::{
    bytes_to_samples, samples_to_bytes, CaptureConfig, CaptureSession, CaptureState,
    DEFAULT_AUDIO_EVENT, DEFAULT_CHUNK_SAMPLES, DEFAULT_SAMPLE_RATE,
};
pub use slides::{PresentationConfig, Presenter, SlideCommand};
pub use socket::{ChannelState, Incoming, Socket, SocketConfig, CSRF_PARAM};
#[cfg(unix)]
pub use transport::UnixTransport;
pub use transport::{MemoryTransport, StreamTransport, Transport};
pub use writer::PacketWriter;
