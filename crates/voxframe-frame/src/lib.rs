//! Length-prefixed framing of JSON metadata plus a binary payload.
//!
//! Every binary message is framed as:
//! - A 4-byte big-endian metadata length `M`
//! - `M` bytes of UTF-8 JSON metadata
//! - The payload, which runs to the end of the frame
//!
//! The payload carries no length of its own. Structured (non-binary)
//! messages bypass framing entirely; see [`transport_encode`].

pub mod codec;
pub mod dispatch;
pub mod error;
mod finite;

pub use codec::{
    decode, decode_as, encode, encode_into, DecodedFrame, FrameConfig, DEFAULT_MAX_METADATA,
    LENGTH_PREFIX_SIZE,
};
pub use dispatch::{transport_encode, Encoded, Outbound};
pub use error::{FrameError, Result};
