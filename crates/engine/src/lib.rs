pub mod config;
pub mod error;
pub mod file_store;
pub mod portal;
pub mod reconcile;
pub mod room_storage;
pub mod scene_store;
pub mod version_cache;

pub use config::{BackendConfig, StorageConfig};
pub use error::EngineError;
pub use file_store::{
    BinaryFileData, FileBlobStore, FileUpload, LoadFilesResult, SaveFilesResult,
};
pub use portal::{Portal, RoomContext};
pub use reconcile::reconcile;
pub use room_storage::{Backends, RoomStorage};
pub use scene_store::{LoadOptions, SceneStore};
pub use version_cache::VersionCache;
