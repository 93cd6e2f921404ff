use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FrameError, Result};
use crate::finite;

/// Size of the metadata length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum metadata size accepted when decoding: 64 KiB.
pub const DEFAULT_MAX_METADATA: usize = 64 * 1024;

/// A frame split back into its metadata and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Parsed JSON metadata.
    pub metadata: serde_json::Value,
    /// Byte length of the metadata segment as declared on the wire.
    pub metadata_len: usize,
    /// The payload (zero-copy slice of the source frame).
    pub payload: Bytes,
}

impl DecodedFrame {
    /// The total wire size of this frame (prefix + metadata + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.metadata_len + self.payload.len()
    }
}

/// Encode metadata and payload into a fresh frame.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┬─────────────────────┐
/// │ Length (4B)  │ Metadata         │ Payload             │
/// │ u32 BE = M   │ (M bytes, JSON)  │ (remaining bytes)   │
/// └──────────────┴──────────────────┴─────────────────────┘
/// ```
pub fn encode<M: Serialize + ?Sized>(metadata: &M, payload: &[u8]) -> Result<Bytes> {
    let meta = serialize_metadata(metadata)?;
    let mut dst = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + meta.len() + payload.len());
    put_frame(&meta, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode a frame, appending it to `dst`.
///
/// On error nothing is written to `dst`.
pub fn encode_into<M: Serialize + ?Sized>(
    metadata: &M,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let meta = serialize_metadata(metadata)?;
    put_frame(&meta, payload, dst)
}

/// Decode a complete frame.
///
/// The whole buffer is one frame: everything after the metadata is payload.
pub fn decode(frame: &Bytes, max_metadata: usize) -> Result<DecodedFrame> {
    let (metadata_len, meta) = split_metadata(frame, max_metadata)?;
    let metadata = serde_json::from_slice(meta).map_err(FrameError::InvalidMetadata)?;
    let payload = frame.slice(LENGTH_PREFIX_SIZE + metadata_len..);

    Ok(DecodedFrame {
        metadata,
        metadata_len,
        payload,
    })
}

/// Decode a frame, deserializing the metadata into `M`.
pub fn decode_as<M: DeserializeOwned>(frame: &Bytes, max_metadata: usize) -> Result<(M, Bytes)> {
    let (metadata_len, meta) = split_metadata(frame, max_metadata)?;
    let metadata = serde_json::from_slice(meta).map_err(FrameError::InvalidMetadata)?;
    Ok((metadata, frame.slice(LENGTH_PREFIX_SIZE + metadata_len..)))
}

fn serialize_metadata<M: Serialize + ?Sized>(metadata: &M) -> Result<Vec<u8>> {
    if let Some(value) = finite::first_non_finite(metadata) {
        return Err(FrameError::NonFiniteFloat(value));
    }
    serde_json::to_vec(metadata).map_err(FrameError::Serialization)
}

fn put_frame(meta: &[u8], payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(meta.len()).map_err(|_| FrameError::MetadataTooLarge {
        size: meta.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(LENGTH_PREFIX_SIZE + meta.len() + payload.len());
    dst.put_u32(len);
    dst.put_slice(meta);
    dst.put_slice(payload);

    tracing::trace!(
        metadata_len = meta.len(),
        payload_len = payload.len(),
        "encoded frame"
    );
    Ok(())
}

fn split_metadata(frame: &Bytes, max_metadata: usize) -> Result<(usize, &[u8])> {
    if frame.len() < LENGTH_PREFIX_SIZE {
        return Err(FrameError::Truncated {
            needed: LENGTH_PREFIX_SIZE,
            available: frame.len(),
        });
    }

    let mut prefix = &frame[..LENGTH_PREFIX_SIZE];
    let metadata_len = prefix.get_u32() as usize;

    if metadata_len > max_metadata {
        return Err(FrameError::MetadataTooLarge {
            size: metadata_len,
            max: max_metadata,
        });
    }

    let end = LENGTH_PREFIX_SIZE + metadata_len;
    if frame.len() < end {
        return Err(FrameError::Truncated {
            needed: end,
            available: frame.len(),
        });
    }

    Ok((metadata_len, &frame[LENGTH_PREFIX_SIZE..end]))
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum metadata size in bytes accepted on decode. Default: 64 KiB.
    pub max_metadata_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_metadata_size: DEFAULT_MAX_METADATA,
        }
    }
}
