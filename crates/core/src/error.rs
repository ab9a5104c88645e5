use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("decryption failed")]
    Decryption,

    #[error("encryption failed")]
    Encryption,

    #[error("invalid room key: {0}")]
    InvalidKey(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
