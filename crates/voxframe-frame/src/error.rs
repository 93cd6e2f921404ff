/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The metadata could not be serialized to JSON.
    #[error("metadata serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The metadata contains a NaN or infinite float, which JSON cannot represent.
    #[error("metadata contains a non-finite float ({0})")]
    NonFiniteFloat(f64),

    /// The metadata segment exceeds the representable or configured size.
    #[error("metadata too large ({size} bytes, max {max})")]
    MetadataTooLarge { size: usize, max: usize },

    /// The buffer ends before the declared metadata does.
    #[error("truncated frame (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// The metadata segment is not valid UTF-8 JSON.
    #[error("invalid frame metadata: {0}")]
    InvalidMetadata(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
