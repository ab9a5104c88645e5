use roomstore_core::CoreError;
use roomstore_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend client or credentials missing. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Wrong room key or corrupted record. Not retried.
    #[error("could not decrypt scene for room {room_id}")]
    Decryption { room_id: String },

    #[error("storage read failed: {0}")]
    StorageRead(#[source] StorageError),

    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl EngineError {
    pub(crate) fn read(err: StorageError) -> Self {
        if err.is_unavailable() {
            Self::Configuration(err.to_string())
        } else {
            Self::StorageRead(err)
        }
    }

    pub(crate) fn write(err: StorageError) -> Self {
        if err.is_unavailable() {
            Self::Configuration(err.to_string())
        } else {
            Self::StorageWrite(err)
        }
    }

    pub(crate) fn decrypt(err: CoreError, room_id: &roomstore_core::RoomId) -> Self {
        match err {
            CoreError::Decryption => Self::Decryption {
                room_id: room_id.to_string(),
            },
            other => Self::Core(other),
        }
    }
}
