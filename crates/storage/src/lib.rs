pub mod error;
pub mod fallback;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use fallback::{FallbackBlobBackend, FallbackRecordBackend};
pub use memory::{MemoryBlobBackend, MemoryRecordBackend};
pub use sqlite::SqliteBackend;
pub use traits::*;
