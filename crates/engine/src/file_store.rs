use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, error, warn};

use roomstore_core::codec::decode_file_payload;
use roomstore_core::{Clock, CoreError, FileId, RoomKey};
use roomstore_storage::{BlobBackend, StorageError, UploadOptions};

use crate::error::EngineError;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// An already-encoded file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub id: FileId,
    pub buffer: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveFilesResult {
    pub saved_files: Vec<FileId>,
    pub errored_files: Vec<FileId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFileData {
    pub id: FileId,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub created: i64,
    pub last_retrieved: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilesResult {
    pub loaded_files: Vec<BinaryFileData>,
    pub errored_files: BTreeSet<FileId>,
}

#[derive(Debug, Error)]
enum FileLoadError {
    #[error("download failed: {0}")]
    Storage(StorageError),

    #[error("decode failed: {0}")]
    Decode(CoreError),
}

/// Per-file upload and download of encrypted blobs under `{prefix}/{id}`.
///
/// Files in one call are transferred concurrently and fail independently.
pub struct FileBlobStore {
    blobs: Arc<dyn BlobBackend>,
    bucket: String,
    cache_control: String,
    clock: Arc<dyn Clock>,
}

impl FileBlobStore {
    pub fn new(
        blobs: Arc<dyn BlobBackend>,
        bucket: impl Into<String>,
        cache_control: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blobs,
            bucket: bucket.into(),
            cache_control: cache_control.into(),
            clock,
        }
    }

    pub fn path(prefix: &str, id: &FileId) -> String {
        format!("{prefix}/{id}")
    }

    /// Upload every file, upserting. Each input id ends up in exactly one of
    /// `saved_files` or `errored_files`. A repeated id is uploaded once, with
    /// its last buffer.
    ///
    /// A backend that is not configured at all fails the whole call with
    /// [`EngineError::Configuration`] instead of erroring every file.
    pub async fn save_files(
        &self,
        prefix: &str,
        files: &[FileUpload],
    ) -> Result<SaveFilesResult, EngineError> {
        let mut seen = HashSet::new();
        let unique: Vec<&FileUpload> = files
            .iter()
            .rev()
            .filter(|file| seen.insert(file.id.clone()))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let options = UploadOptions {
            cache_control: self.cache_control.clone(),
            upsert: true,
        };
        let uploads = unique.into_iter().map(|file| {
            let options = &options;
            async move {
                let path = Self::path(prefix, &file.id);
                let outcome = self
                    .blobs
                    .upload(&self.bucket, &path, &file.buffer, options)
                    .await;
                (file.id.clone(), outcome)
            }
        });

        let mut result = SaveFilesResult::default();
        for (id, outcome) in join_all(uploads).await {
            match outcome {
                Ok(()) => result.saved_files.push(id),
                Err(e) if e.is_unavailable() => {
                    error!(prefix, error = %e, "file storage not configured");
                    return Err(EngineError::Configuration(e.to_string()));
                }
                Err(e) => {
                    error!(file_id = %id, error = %e, "error saving file");
                    result.errored_files.push(id);
                }
            }
        }
        debug!(
            prefix,
            saved = result.saved_files.len(),
            errored = result.errored_files.len(),
            "saved files"
        );
        Ok(result)
    }

    /// Download and decode files. Repeated ids cost one fetch. Without a
    /// configured backend both sets come back empty.
    pub async fn load_files(
        &self,
        prefix: &str,
        decryption_key: &RoomKey,
        file_ids: &[FileId],
    ) -> LoadFilesResult {
        let mut seen = HashSet::new();
        let fetches = file_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .map(|id| async move {
                let outcome = self.load_one(prefix, decryption_key, id).await;
                (id.clone(), outcome)
            });

        let mut result = LoadFilesResult::default();
        for (id, outcome) in join_all(fetches).await {
            match outcome {
                Ok(file) => result.loaded_files.push(file),
                Err(FileLoadError::Storage(e)) if e.is_unavailable() => {
                    warn!(prefix, error = %e, "file storage not configured, nothing to load");
                    return LoadFilesResult::default();
                }
                Err(e) => {
                    warn!(file_id = %id, error = %e, "error loading file");
                    result.errored_files.insert(id);
                }
            }
        }
        result
    }

    async fn load_one(
        &self,
        prefix: &str,
        key: &RoomKey,
        id: &FileId,
    ) -> Result<BinaryFileData, FileLoadError> {
        let path = Self::path(prefix, id);
        let bytes = self
            .blobs
            .download(&self.bucket, &path)
            .await
            .map_err(FileLoadError::Storage)?;
        let (data, metadata) = decode_file_payload(key, &bytes).map_err(FileLoadError::Decode)?;

        let created = metadata.created.unwrap_or_else(|| self.clock.now_ms());
        Ok(BinaryFileData {
            id: id.clone(),
            mime_type: metadata
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            data,
            created,
            last_retrieved: created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomstore_core::codec::encode_file_payload;
    use roomstore_core::{FileMetadata, FixedClock};
    use roomstore_storage::{FallbackBlobBackend, MemoryBlobBackend};

    const NOW: i64 = 1_700_000_000_000;
    const BUCKET: &str = "excalidraw-files";

    fn store(blobs: Arc<MemoryBlobBackend>) -> FileBlobStore {
        FileBlobStore::new(
            blobs,
            BUCKET,
            "public, max-age=31536000",
            Arc::new(FixedClock::new(NOW)),
        )
    }

    fn upload(key: &RoomKey, id: &str, data: &[u8], metadata: FileMetadata) -> FileUpload {
        FileUpload {
            id: id.into(),
            buffer: encode_file_payload(key, data, &metadata).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let blobs = Arc::new(MemoryBlobBackend::new());
        let files = store(blobs.clone());
        let key = RoomKey::generate();
        let metadata = FileMetadata {
            mime_type: Some("image/png".into()),
            created: Some(NOW - 5),
        };

        let saved = files
            .save_files("room-1", &[upload(&key, "f1", b"png bytes", metadata)])
            .await
            .unwrap();
        assert_eq!(saved.saved_files, vec![FileId::from("f1")]);
        assert!(saved.errored_files.is_empty());

        let stored = blobs.get(BUCKET, "room-1/f1").await.unwrap();
        assert_eq!(stored.cache_control, "public, max-age=31536000");

        let loaded = files.load_files("room-1", &key, &["f1".into()]).await;
        assert!(loaded.errored_files.is_empty());
        assert_eq!(
            loaded.loaded_files,
            vec![BinaryFileData {
                id: "f1".into(),
                mime_type: "image/png".into(),
                data: b"png bytes".to_vec(),
                created: NOW - 5,
                last_retrieved: NOW - 5,
            }]
        );
    }

    #[tokio::test]
    async fn metadata_defaults_apply() {
        let blobs = Arc::new(MemoryBlobBackend::new());
        let files = store(blobs);
        let key = RoomKey::generate();
        files
            .save_files("r", &[upload(&key, "bare", b"x", FileMetadata::default())])
            .await
            .unwrap();

        let loaded = files.load_files("r", &key, &["bare".into()]).await;
        let file = &loaded.loaded_files[0];
        assert_eq!(file.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(file.created, NOW);
        assert_eq!(file.last_retrieved, NOW);
    }

    #[tokio::test]
    async fn missing_and_undecodable_files_are_errored() {
        let blobs = Arc::new(MemoryBlobBackend::new());
        let files = store(blobs);
        let key = RoomKey::generate();
        files
            .save_files(
                "r",
                &[
                    upload(&key, "good", b"ok", FileMetadata::default()),
                    FileUpload {
                        id: "junk".into(),
                        buffer: b"not a payload".to_vec(),
                    },
                ],
            )
            .await
            .unwrap();

        let loaded = files
            .load_files("r", &key, &["good".into(), "junk".into(), "absent".into()])
            .await;
        assert_eq!(loaded.loaded_files.len(), 1);
        assert_eq!(
            loaded.errored_files,
            BTreeSet::from([FileId::from("absent"), FileId::from("junk")])
        );
    }

    #[tokio::test]
    async fn wrong_key_errors_per_file() {
        let files = store(Arc::new(MemoryBlobBackend::new()));
        let key = RoomKey::generate();
        files
            .save_files("r", &[upload(&key, "f", b"secret", FileMetadata::default())])
            .await
            .unwrap();
        let loaded = files.load_files("r", &RoomKey::generate(), &["f".into()]).await;
        assert!(loaded.loaded_files.is_empty());
        assert!(loaded.errored_files.contains(&FileId::from("f")));
    }

    #[tokio::test]
    async fn repeated_upload_keeps_last_buffer() {
        let blobs = Arc::new(MemoryBlobBackend::new());
        let files = store(blobs.clone());
        let result = files
            .save_files(
                "r",
                &[
                    FileUpload {
                        id: "f".into(),
                        buffer: b"first".to_vec(),
                    },
                    FileUpload {
                        id: "f".into(),
                        buffer: b"second".to_vec(),
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.saved_files, vec![FileId::from("f")]);
        assert_eq!(blobs.get(BUCKET, "r/f").await.unwrap().bytes, b"second");
    }

    #[tokio::test]
    async fn unconfigured_backend_aborts_save_and_loads_nothing() {
        let files = FileBlobStore::new(
            Arc::new(FallbackBlobBackend::new(Vec::new())),
            BUCKET,
            "public, max-age=1",
            Arc::new(FixedClock::new(NOW)),
        );
        let key = RoomKey::generate();
        let err = files
            .save_files("r", &[upload(&key, "f", b"x", FileMetadata::default())])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));

        let loaded = files.load_files("r", &key, &["f".into(), "g".into()]).await;
        assert_eq!(loaded, LoadFilesResult::default());
    }
}
