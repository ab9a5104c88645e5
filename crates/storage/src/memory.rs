use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use roomstore_core::RoomId;

use crate::error::StorageError;
use crate::traits::{
    BlobBackend, RecordBackend, SceneRecordUpdate, StoredSceneRecord, UploadOptions,
};

/// Process-local record backend. Cloning the handle is not supported; share
/// it behind an `Arc` so several stores see the same rows.
#[derive(Debug, Default)]
pub struct MemoryRecordBackend {
    rows: RwLock<HashMap<(String, RoomId), StoredSceneRecord>>,
}

impl MemoryRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl RecordBackend for MemoryRecordBackend {
    async fn select_one(
        &self,
        table: &str,
        room_id: &RoomId,
    ) -> Result<Option<StoredSceneRecord>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(table.to_string(), room_id.clone())).cloned())
    }

    async fn insert(&self, table: &str, record: &StoredSceneRecord) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        let key = (table.to_string(), record.room_id.clone());
        if rows.contains_key(&key) {
            return Err(StorageError::Write(format!(
                "duplicate key {} in {table}",
                record.room_id
            )));
        }
        rows.insert(key, record.clone());
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        room_id: &RoomId,
        fields: &SceneRecordUpdate,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&(table.to_string(), room_id.clone()))
            .ok_or_else(|| StorageError::NotFound(format!("{table}/{room_id}")))?;
        row.scene_version = fields.scene_version;
        row.iv = fields.iv.clone();
        row.ciphertext = fields.ciphertext.clone();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub cache_control: String,
}

#[derive(Debug, Default)]
pub struct MemoryBlobBackend {
    objects: RwLock<HashMap<(String, String), StoredBlob>>,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        let objects = self.objects.read().await;
        objects.get(&(bucket.to_string(), path.to_string())).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        let key = (bucket.to_string(), path.to_string());
        if !options.upsert && objects.contains_key(&key) {
            return Err(StorageError::Write(format!("{bucket}/{path} already exists")));
        }
        objects.insert(
            key,
            StoredBlob {
                bytes: bytes.to_vec(),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{path}")))
    }
}
