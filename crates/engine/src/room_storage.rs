use std::sync::Arc;

use tracing::info;

use roomstore_core::{
    AppState, Clock, ConnectionId, Element, FileId, RoomId, RoomKey, SyncableElements,
    SystemClock,
};
use roomstore_storage::{
    BlobBackend, FallbackBlobBackend, FallbackRecordBackend, MemoryBlobBackend,
    MemoryRecordBackend, RecordBackend, SqliteBackend,
};

use crate::config::{BackendConfig, StorageConfig};
use crate::error::EngineError;
use crate::file_store::{FileBlobStore, FileUpload, LoadFilesResult, SaveFilesResult};
use crate::portal::Portal;
use crate::scene_store::{LoadOptions, SceneStore};

/// Record and blob backends built from one [`BackendConfig`].
pub struct Backends {
    pub records: Arc<dyn RecordBackend>,
    pub blobs: Arc<dyn BlobBackend>,
}

impl Backends {
    pub fn from_config(config: &BackendConfig) -> Result<Self, EngineError> {
        match config {
            BackendConfig::Memory => Ok(Self {
                records: Arc::new(MemoryRecordBackend::new()),
                blobs: Arc::new(MemoryBlobBackend::new()),
            }),
            BackendConfig::Sqlite { path } => {
                if path.trim().is_empty() {
                    return Err(EngineError::Configuration(
                        "sqlite backend selected without a path".into(),
                    ));
                }
                let backend = Arc::new(SqliteBackend::open(path).map_err(|e| {
                    EngineError::Configuration(format!("cannot open {path}: {e}"))
                })?);
                Ok(Self {
                    records: backend.clone(),
                    blobs: backend,
                })
            }
            BackendConfig::Fallback { chain } => {
                if chain.is_empty() {
                    return Err(EngineError::Configuration("fallback chain is empty".into()));
                }
                let mut records = Vec::with_capacity(chain.len());
                let mut blobs = Vec::with_capacity(chain.len());
                for entry in chain {
                    let built = Self::from_config(entry)?;
                    records.push(built.records);
                    blobs.push(built.blobs);
                }
                Ok(Self {
                    records: Arc::new(FallbackRecordBackend::new(records)),
                    blobs: Arc::new(FallbackBlobBackend::new(blobs)),
                })
            }
        }
    }
}

/// The operations the collaboration layer calls: scene save/load and file
/// save/load for a room.
pub struct RoomStorage {
    scenes: SceneStore,
    files: FileBlobStore,
}

impl RoomStorage {
    /// Resolve backends once from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let backends = Backends::from_config(&config.backend)?;
        info!(backend = ?config.backend, "room storage ready");
        Ok(Self::with_backends(config, backends, Arc::new(SystemClock)))
    }

    pub fn with_backends(config: &StorageConfig, backends: Backends, clock: Arc<dyn Clock>) -> Self {
        Self {
            scenes: SceneStore::new(
                backends.records,
                config.scenes_table.clone(),
                config.tombstone_ttl_ms,
                clock.clone(),
            ),
            files: FileBlobStore::new(
                backends.blobs,
                config.files_bucket.clone(),
                config.cache_control(),
                clock,
            ),
        }
    }

    pub fn scenes(&self) -> &SceneStore {
        &self.scenes
    }

    pub fn files(&self) -> &FileBlobStore {
        &self.files
    }

    pub async fn save_scene(
        &self,
        portal: &Portal,
        elements: &SyncableElements,
        app_state: &AppState,
    ) -> Result<Option<SyncableElements>, EngineError> {
        self.scenes.save(portal, elements, app_state).await
    }

    pub async fn load_scene(
        &self,
        room_id: &RoomId,
        room_key: &RoomKey,
        connection: Option<ConnectionId>,
    ) -> Result<Option<SyncableElements>, EngineError> {
        self.scenes
            .load(room_id, room_key, connection, LoadOptions::for_display())
            .await
    }

    pub fn is_scene_saved(&self, portal: &Portal, elements: &[Element]) -> bool {
        self.scenes.is_saved(portal, elements)
    }

    pub async fn save_files(
        &self,
        prefix: &str,
        files: &[FileUpload],
    ) -> Result<SaveFilesResult, EngineError> {
        self.files.save_files(prefix, files).await
    }

    pub async fn load_files(
        &self,
        prefix: &str,
        decryption_key: &RoomKey,
        file_ids: &[FileId],
    ) -> LoadFilesResult {
        self.files.load_files(prefix, decryption_key, file_ids).await
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        self.scenes.disconnect(connection);
    }
}
