//! Microphone capture session.
//!
//! A session is either idle or capturing. While capturing, each chunk of
//! mono f32 samples becomes one binary push whose info carries the capture
//! format and a sequence number.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use voxframe_frame::Outbound;

use crate::error::{ChannelError, Result};
use crate::socket::Socket;
use crate::transport::Transport;

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default number of samples per chunk.
pub const DEFAULT_CHUNK_SAMPLES: usize = 4096;

/// Default event name for audio pushes.
pub const DEFAULT_AUDIO_EVENT: &str = "microphone_input";

/// Bytes per encoded sample (f32).
pub const BYTES_PER_SAMPLE: usize = 4;

/// Capture parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Topic the audio is pushed on.
    pub topic: String,
    /// Event name for each chunk.
    pub event: String,
    pub sample_rate: u32,
    /// Samples per chunk.
    pub chunk_samples: usize,
    /// Caller info merged into every chunk's metadata.
    pub info: Value,
}

impl CaptureConfig {
    /// Defaults for the given topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event: DEFAULT_AUDIO_EVENT.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            info: Value::Object(Map::new()),
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing {
        config: CaptureConfig,
        chunks_sent: u64,
    },
}

/// One audio capture session, owned by the caller.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    state: CaptureState,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing { .. })
    }

    /// Start capturing. Fails unless idle.
    pub fn start(&mut self, config: CaptureConfig) -> Result<()> {
        if self.is_capturing() {
            return Err(ChannelError::InvalidState(
                "capture already running".to_string(),
            ));
        }
        if config.sample_rate == 0 {
            return Err(ChannelError::InvalidState(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        if config.chunk_samples == 0 {
            return Err(ChannelError::InvalidState(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        tracing::info!(
            topic = %config.topic,
            sample_rate = config.sample_rate,
            chunk_samples = config.chunk_samples,
            "capture started"
        );
        self.state = CaptureState::Capturing {
            config,
            chunks_sent: 0,
        };
        Ok(())
    }

    /// Stop capturing. Returns the number of chunks framed.
    pub fn stop(&mut self) -> Result<u64> {
        match std::mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::Capturing { chunks_sent, .. } => {
                tracing::info!(chunks = chunks_sent, "capture stopped");
                Ok(chunks_sent)
            }
            CaptureState::Idle => Err(not_running()),
        }
    }

    /// Turn one chunk of samples into a binary message and count it as sent.
    ///
    /// For callers that deliver the message themselves; prefer
    /// [`CaptureSession::push_chunk`] when a socket is at hand.
    pub fn frame_chunk(&mut self, samples: &[f32]) -> Result<Outbound> {
        let outbound = self.build_chunk(samples)?;
        self.commit_chunk();
        Ok(outbound)
    }

    /// Frame a chunk and push it on the configured topic.
    ///
    /// The chunk only counts (and `seq` only advances) once the push went out.
    pub fn push_chunk<T: Transport>(
        &mut self,
        socket: &mut Socket<T>,
        samples: &[f32],
    ) -> Result<u64> {
        let outbound = self.build_chunk(samples)?;
        let CaptureState::Capturing { config, .. } = &self.state else {
            return Err(not_running());
        };
        let reference = socket.push(&config.topic, &config.event, outbound)?;
        self.commit_chunk();
        Ok(reference)
    }

    fn build_chunk(&self, samples: &[f32]) -> Result<Outbound> {
        let CaptureState::Capturing {
            config,
            chunks_sent,
        } = &self.state
        else {
            return Err(not_running());
        };
        if samples.is_empty() {
            return Err(ChannelError::EmptyChunk);
        }
        if samples.len() > config.chunk_samples {
            return Err(ChannelError::ChunkTooLarge {
                samples: samples.len(),
                max: config.chunk_samples,
            });
        }

        let mut info = match &config.info {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("info".to_string(), other.clone());
                map
            }
        };
        info.insert("sample_rate".to_string(), config.sample_rate.into());
        info.insert("channels".to_string(), Value::from(1u8));
        info.insert("samples".to_string(), samples.len().into());
        info.insert("seq".to_string(), (*chunks_sent).into());

        Ok(Outbound::binary(
            Value::Object(info),
            samples_to_bytes(samples),
        ))
    }

    fn commit_chunk(&mut self) {
        if let CaptureState::Capturing { chunks_sent, .. } = &mut self.state {
            *chunks_sent += 1;
        }
    }
}

fn not_running() -> ChannelError {
    ChannelError::InvalidState("capture not running".to_string())
}

/// Encode samples as little-endian f32 bytes.
pub fn samples_to_bytes(samples: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        buf.put_f32_le(*sample);
    }
    buf.freeze()
}

/// Decode little-endian f32 bytes back into samples.
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(ChannelError::Protocol(format!(
            "audio payload of {} bytes is not a whole number of f32 samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use voxframe_frame::{decode, Encoded, DEFAULT_MAX_METADATA};

    use super::*;
    use crate::envelope::Envelope;
    use crate::packet::Packet;
    use crate::socket::SocketConfig;
    use crate::transport::MemoryTransport;

    #[test]
    fn lifecycle_idle_capturing_idle() {
        let mut session = CaptureSession::new();
        assert_eq!(session.state(), &CaptureState::Idle);

        session.start(CaptureConfig::new("room:1")).unwrap();
        assert!(session.is_capturing());
        assert!(matches!(
            session.start(CaptureConfig::new("room:1")),
            Err(ChannelError::InvalidState(_))
        ));

        session.frame_chunk(&[0.0; 4]).unwrap();
        session.frame_chunk(&[0.0; 4]).unwrap();
        assert_eq!(session.stop().unwrap(), 2);
        assert!(!session.is_capturing());
        assert!(matches!(session.stop(), Err(ChannelError::InvalidState(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut session = CaptureSession::new();
        let zero_rate = CaptureConfig {
            sample_rate: 0,
            ..CaptureConfig::new("t")
        };
        let zero_chunk = CaptureConfig {
            chunk_samples: 0,
            ..CaptureConfig::new("t")
        };

        assert!(session.start(zero_rate).is_err());
        assert!(session.start(zero_chunk).is_err());
        assert!(!session.is_capturing());
    }

    #[test]
    fn idle_session_never_frames() {
        let mut session = CaptureSession::new();
        assert!(matches!(
            session.frame_chunk(&[0.5]),
            Err(ChannelError::InvalidState(_))
        ));
    }

    #[test]
    fn empty_chunk_rejected() {
        let mut session = CaptureSession::new();
        session.start(CaptureConfig::new("t")).unwrap();
        assert!(matches!(
            session.frame_chunk(&[]),
            Err(ChannelError::EmptyChunk)
        ));
        assert_eq!(session.stop().unwrap(), 0);
    }

    #[test]
    fn chunk_metadata_and_payload() {
        let mut session = CaptureSession::new();
        session
            .start(CaptureConfig {
                info: json!({"info": "foo"}),
                ..CaptureConfig::new("room:1")
            })
            .unwrap();

        session.frame_chunk(&[0.25]).unwrap();
        let Outbound::Binary { metadata, payload } = session.frame_chunk(&[1.0, -0.5]).unwrap()
        else {
            panic!("audio chunks are binary");
        };

        assert_eq!(
            metadata,
            json!({"info": "foo", "sample_rate": 16000, "channels": 1, "samples": 2, "seq": 1})
        );
        assert_eq!(
            payload.as_ref(),
            &[0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0xBF]
        );
    }

    #[test]
    fn scalar_info_is_wrapped() {
        let mut session = CaptureSession::new();
        session
            .start(CaptureConfig {
                info: json!("foo"),
                ..CaptureConfig::new("t")
            })
            .unwrap();

        let out = session.frame_chunk(&[0.0]).unwrap();
        let Encoded::Binary(frame) = voxframe_frame::transport_encode(out).unwrap() else {
            panic!("audio chunks are binary");
        };
        let decoded = decode(&frame, DEFAULT_MAX_METADATA).unwrap();
        assert_eq!(decoded.metadata["info"], json!("foo"));
        assert_eq!(decoded.metadata["seq"], json!(0));
    }

    #[test]
    fn push_chunk_over_socket() {
        let (client, mut server) = MemoryTransport::pair();
        let mut socket = Socket::connect(client, SocketConfig::default()).unwrap();
        let reference = socket.join("room:1", Value::Null, |_| {}).unwrap();
        server
            .send(
                Envelope::reply("room:1", reference, &crate::envelope::Reply::Ok(Value::Null))
                    .to_packet()
                    .unwrap(),
            )
            .unwrap();
        socket.poll().unwrap();

        let mut session = CaptureSession::new();
        session.start(CaptureConfig::new("room:1")).unwrap();
        session.push_chunk(&mut socket, &[0.1, 0.2, 0.3]).unwrap();

        // connect + join precede the audio frame
        server.recv().unwrap();
        server.recv().unwrap();
        let Packet::Binary(frame) = server.recv().unwrap() else {
            panic!("expected audio frame");
        };
        let decoded = decode(&frame, DEFAULT_MAX_METADATA).unwrap();
        assert_eq!(decoded.metadata[0]["event"], json!(DEFAULT_AUDIO_EVENT));
        assert_eq!(decoded.metadata[1]["samples"], json!(3));
        assert_eq!(
            bytes_to_samples(&decoded.payload).unwrap(),
            vec![0.1f32, 0.2, 0.3]
        );
    }

    #[test]
    fn push_chunk_before_join_fails() {
        let (client, _server) = MemoryTransport::pair();
        let mut socket = Socket::connect(client, SocketConfig::default()).unwrap();

        let mut session = CaptureSession::new();
        session.start(CaptureConfig::new("room:1")).unwrap();
        assert!(matches!(
            session.push_chunk(&mut socket, &[0.0]),
            Err(ChannelError::NotJoined(_))
        ));
        assert_eq!(session.stop().unwrap(), 0);
    }

    #[test]
    fn failed_push_leaves_no_sequence_gap() {
        let (client, mut server) = MemoryTransport::pair();
        let mut socket = Socket::connect(client, SocketConfig::default()).unwrap();

        let mut session = CaptureSession::new();
        session.start(CaptureConfig::new("room:1")).unwrap();
        assert!(session.push_chunk(&mut socket, &[0.0]).is_err());

        let reference = socket.join("room:1", Value::Null, |_| {}).unwrap();
        server
            .send(
                Envelope::reply("room:1", reference, &crate::envelope::Reply::Ok(Value::Null))
                    .to_packet()
                    .unwrap(),
            )
            .unwrap();
        socket.poll().unwrap();
        session.push_chunk(&mut socket, &[0.5]).unwrap();

        server.recv().unwrap();
        server.recv().unwrap();
        let Packet::Binary(frame) = server.recv().unwrap() else {
            panic!("expected audio frame");
        };
        let decoded = decode(&frame, DEFAULT_MAX_METADATA).unwrap();
        assert_eq!(decoded.metadata[1]["seq"], json!(0));
        assert_eq!(session.stop().unwrap(), 1);
    }

    #[test]
    fn chunk_over_configured_size_rejected() {
        let mut session = CaptureSession::new();
        session
            .start(CaptureConfig {
                chunk_samples: 4,
                ..CaptureConfig::new("t")
            })
            .unwrap();

        assert!(session.frame_chunk(&[0.0; 4]).is_ok());
        assert!(session.frame_chunk(&[0.0; 3]).is_ok());
        assert!(matches!(
            session.frame_chunk(&[0.0; 5]),
            Err(ChannelError::ChunkTooLarge { samples: 5, max: 4 })
        ));
        assert_eq!(session.stop().unwrap(), 2);
    }

    #[test]
    fn odd_length_payload_rejected() {
        assert!(bytes_to_samples(&[0, 0, 0]).is_err());
        assert_eq!(bytes_to_samples(&[]).unwrap(), Vec::<f32>::new());
    }
}
