use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend has no client/credentials configured.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),
}

impl StorageError {
    /// True when trying another backend could succeed where this one cannot.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
