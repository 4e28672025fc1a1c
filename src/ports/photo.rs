use crate::domain::Photo;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotoError {
    #[error("Could not read photo: {0}")]
    Read(String),

    #[error("Unsupported or corrupt image: {0}")]
    InvalidImage(String),

    #[error("Failed to encode photo: {0}")]
    Encode(String),
}

/// Turns raw image bytes into an upload-ready photo (resized, recompressed,
/// base64 data URI).
pub trait PhotoEncoder: Send + Sync {
    fn encode(&self, input: &[u8]) -> Result<Photo, PhotoError>;
}
