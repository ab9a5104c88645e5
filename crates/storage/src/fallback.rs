//! Ordered backend chains.
//!
//! Each call goes to the first backend; the next one is tried only when the
//! error says the backend itself is unavailable. Lookups and updates also
//! move on when a backend has no row for the room. Any other error is the
//! answer and is returned as-is.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use roomstore_core::RoomId;

use crate::error::StorageError;
use crate::traits::{
    BlobBackend, RecordBackend, SceneRecordUpdate, StoredSceneRecord, UploadOptions,
};

pub struct FallbackRecordBackend {
    chain: Vec<Arc<dyn RecordBackend>>,
}

impl FallbackRecordBackend {
    pub fn new(chain: Vec<Arc<dyn RecordBackend>>) -> Self {
        Self { chain }
    }
}

fn exhausted() -> StorageError {
    StorageError::Unavailable("no backend in the fallback chain is available".into())
}

#[async_trait]
impl RecordBackend for FallbackRecordBackend {
    /// A backend that answers "no record" does not end the search: an older
    /// backend further down the chain may still hold the room.
    async fn select_one(
        &self,
        table: &str,
        room_id: &RoomId,
    ) -> Result<Option<StoredSceneRecord>, StorageError> {
        let mut last_err = None;
        let mut answered = false;
        for (position, backend) in self.chain.iter().enumerate() {
            match backend.select_one(table, room_id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => answered = true,
                Err(e) if e.is_unavailable() => {
                    warn!(position, %room_id, error = %e, "record backend unavailable, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        if answered {
            return Ok(None);
        }
        Err(last_err.unwrap_or_else(exhausted))
    }

    async fn insert(&self, table: &str, record: &StoredSceneRecord) -> Result<(), StorageError> {
        let mut last_err = None;
        for (position, backend) in self.chain.iter().enumerate() {
            match backend.insert(table, record).await {
                Err(e) if e.is_unavailable() => {
                    warn!(position, room_id = %record.room_id, error = %e, "record backend unavailable, trying next");
                    last_err = Some(e);
                }
                other => return other,
            }
        }
        Err(last_err.unwrap_or_else(exhausted))
    }

    /// Mirrors `select_one`: the row is updated in whichever backend holds
    /// it, so a room found further down the chain stays writable.
    async fn update(
        &self,
        table: &str,
        room_id: &RoomId,
        fields: &SceneRecordUpdate,
    ) -> Result<(), StorageError> {
        let mut not_found = None;
        let mut last_err = None;
        for (position, backend) in self.chain.iter().enumerate() {
            match backend.update(table, room_id, fields).await {
                Err(e @ StorageError::NotFound(_)) => {
                    debug!(position, %room_id, "no row to update, trying next");
                    not_found = Some(e);
                }
                Err(e) if e.is_unavailable() => {
                    warn!(position, %room_id, error = %e, "record backend unavailable, trying next");
                    last_err = Some(e);
                }
                other => return other,
            }
        }
        Err(not_found.or(last_err).unwrap_or_else(exhausted))
    }
}

pub struct FallbackBlobBackend {
    chain: Vec<Arc<dyn BlobBackend>>,
}

impl FallbackBlobBackend {
    pub fn new(chain: Vec<Arc<dyn BlobBackend>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl BlobBackend for FallbackBlobBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let mut last_err = None;
        for (position, backend) in self.chain.iter().enumerate() {
            match backend.upload(bucket, path, bytes, options).await {
                Err(e) if e.is_unavailable() => {
                    warn!(position, bucket, path, error = %e, "blob backend unavailable, trying next");
                    last_err = Some(e);
                }
                other => return other,
            }
        }
        Err(last_err.unwrap_or_else(exhausted))
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut last_err = None;
        for (position, backend) in self.chain.iter().enumerate() {
            match backend.download(bucket, path).await {
                Err(e) if e.is_unavailable() => {
                    warn!(position, bucket, path, error = %e, "blob backend unavailable, trying next");
                    last_err = Some(e);
                }
                other => return other,
            }
        }
        Err(last_err.unwrap_or_else(exhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBlobBackend, MemoryRecordBackend};
    use roomstore_core::SceneVersion;

    const TABLE: &str = "scenes";

    /// A backend with no client configured.
    struct Offline;

    #[async_trait]
    impl RecordBackend for Offline {
        async fn select_one(
            &self,
            _table: &str,
            _room_id: &RoomId,
        ) -> Result<Option<StoredSceneRecord>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        async fn insert(&self, _table: &str, _record: &StoredSceneRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        async fn update(
            &self,
            _table: &str,
            _room_id: &RoomId,
            _fields: &SceneRecordUpdate,
        ) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    #[async_trait]
    impl BlobBackend for Offline {
        async fn upload(
            &self,
            _bucket: &str,
            _path: &str,
            _bytes: &[u8],
            _options: &UploadOptions,
        ) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        async fn download(&self, _bucket: &str, _path: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    fn record(room: &str) -> StoredSceneRecord {
        StoredSceneRecord {
            room_id: room.into(),
            scene_version: SceneVersion::from_i64(1),
            iv: vec![0; 24],
            ciphertext: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn unavailable_backend_is_skipped() {
        let secondary = Arc::new(MemoryRecordBackend::new());
        let backends: Vec<Arc<dyn RecordBackend>> = vec![Arc::new(Offline), secondary.clone()];
        let chain = FallbackRecordBackend::new(backends);

        chain.insert(TABLE, &record("r")).await.unwrap();
        assert_eq!(secondary.len().await, 1);
        assert!(chain.select_one(TABLE, &"r".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn other_errors_stop_the_chain() {
        let primary = Arc::new(MemoryRecordBackend::new());
        let secondary = Arc::new(MemoryRecordBackend::new());
        primary.insert(TABLE, &record("taken")).await.unwrap();
        let backends: Vec<Arc<dyn RecordBackend>> = vec![primary, secondary.clone()];
        let chain = FallbackRecordBackend::new(backends);

        let err = chain.insert(TABLE, &record("taken")).await.unwrap_err();
        assert!(matches!(err, StorageError::Write(_)));
        assert!(secondary.is_empty().await);
    }

    #[tokio::test]
    async fn update_missing_everywhere_is_not_found() {
        let backends: Vec<Arc<dyn RecordBackend>> = vec![
            Arc::new(MemoryRecordBackend::new()),
            Arc::new(Offline),
            Arc::new(MemoryRecordBackend::new()),
        ];
        let chain = FallbackRecordBackend::new(backends);

        let err = chain
            .update(TABLE, &"missing".into(), &record("missing").update_fields())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_reaches_row_in_later_backend() {
        let primary = Arc::new(MemoryRecordBackend::new());
        let legacy = Arc::new(MemoryRecordBackend::new());
        legacy.insert(TABLE, &record("old-room")).await.unwrap();
        let backends: Vec<Arc<dyn RecordBackend>> = vec![primary.clone(), legacy.clone()];
        let chain = FallbackRecordBackend::new(backends);

        let mut newer = record("old-room");
        newer.scene_version = SceneVersion::from_i64(2);
        chain
            .update(TABLE, &"old-room".into(), &newer.update_fields())
            .await
            .unwrap();

        assert!(primary.is_empty().await);
        let stored = legacy.select_one(TABLE, &"old-room".into()).await.unwrap();
        assert_eq!(stored, Some(newer));
    }

    #[tokio::test]
    async fn select_falls_through_empty_backend() {
        let primary = Arc::new(MemoryRecordBackend::new());
        let legacy = Arc::new(MemoryRecordBackend::new());
        legacy.insert(TABLE, &record("old-room")).await.unwrap();
        let backends: Vec<Arc<dyn RecordBackend>> = vec![primary, legacy];
        let chain = FallbackRecordBackend::new(backends);

        let found = chain.select_one(TABLE, &"old-room".into()).await.unwrap();
        assert_eq!(found.map(|r| r.room_id), Some("old-room".into()));
        assert!(chain.select_one(TABLE, &"nowhere".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn all_unavailable_reports_unavailable() {
        let backends: Vec<Arc<dyn RecordBackend>> = vec![Arc::new(Offline), Arc::new(Offline)];
        let chain = FallbackRecordBackend::new(backends);
        let err = chain.select_one(TABLE, &"r".into()).await.unwrap_err();
        assert!(err.is_unavailable());

        let empty = FallbackBlobBackend::new(Vec::new());
        assert!(empty.download("files", "r/f").await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn blob_chain_uses_first_available() {
        let store = Arc::new(MemoryBlobBackend::new());
        let backends: Vec<Arc<dyn BlobBackend>> = vec![Arc::new(Offline), store.clone()];
        let chain = FallbackBlobBackend::new(backends);
        let opts = UploadOptions {
            cache_control: "public, max-age=1".into(),
            upsert: true,
        };
        chain.upload("files", "r/f", b"abc", &opts).await.unwrap();
        assert_eq!(chain.download("files", "r/f").await.unwrap(), b"abc");
        assert_eq!(store.len().await, 1);
    }
}
