/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] voxframe_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The packet header contains an invalid magic number.
    #[error("invalid packet magic (expected 0x5658 \"VX\")")]
    InvalidMagic,

    /// The packet header names an unknown packet kind.
    #[error("unknown packet kind 0x{0:02x}")]
    UnknownPacketKind(u8),

    /// The packet body exceeds the configured maximum size.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// A text packet body is not valid UTF-8.
    #[error("text packet is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    /// The connection was closed before a complete packet was received.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,

    /// The peer sent something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The topic has not been joined (or its join was rejected).
    #[error("topic '{0}' is not joined")]
    NotJoined(String),

    /// The topic is already joined or a join is in flight.
    #[error("topic '{0}' is already joined")]
    AlreadyJoined(String),

    /// The operation is not valid in the current session state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An audio chunk with no samples was offered for framing.
    #[error("audio chunk is empty")]
    EmptyChunk,

    /// An audio chunk holds more samples than the capture's chunk size.
    #[error("audio chunk too large ({samples} samples, max {max})")]
    ChunkTooLarge { samples: usize, max: usize },

    /// A server event carried a malformed payload.
    #[error("invalid '{event}' event: {reason}")]
    InvalidEvent { event: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
