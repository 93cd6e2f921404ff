//! Framed audio streaming over push channels.
//!
//! voxframe packs JSON metadata and a binary payload into a single
//! length-prefixed frame, and streams microphone audio as such frames over
//! a topic-based push channel.
//!
//! # Crate Structure
//!
//! - [`frame`]: frame encoding/decoding and transport dispatch
//! - [`channel`]: packets, transports, the channel socket, capture
//!   sessions and slide commands

/// Re-export frame types.
pub mod frame {
    pub use voxframe_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use voxframe_channel::*;
}
