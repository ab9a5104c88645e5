use async_trait::async_trait;

use roomstore_core::{RoomId, SceneVersion};

use crate::error::StorageError;

/// One persisted scene: the encrypted element set of a room plus the version
/// of its plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSceneRecord {
    pub room_id: RoomId,
    pub scene_version: SceneVersion,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Fields replaced together by [`RecordBackend::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecordUpdate {
    pub scene_version: SceneVersion,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl StoredSceneRecord {
    pub fn update_fields(&self) -> SceneRecordUpdate {
        SceneRecordUpdate {
            scene_version: self.scene_version,
            iv: self.iv.clone(),
            ciphertext: self.ciphertext.clone(),
        }
    }
}

/// Row store holding scene records keyed by room id.
///
/// `update` must replace version, iv and ciphertext in a single write.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn select_one(
        &self,
        table: &str,
        room_id: &RoomId,
    ) -> Result<Option<StoredSceneRecord>, StorageError>;

    async fn insert(&self, table: &str, record: &StoredSceneRecord) -> Result<(), StorageError>;

    async fn update(
        &self,
        table: &str,
        room_id: &RoomId,
        fields: &SceneRecordUpdate,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub cache_control: String,
    pub upsert: bool,
}

/// Object store for file blobs, addressed by bucket and `{prefix}/{file_id}`.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
}
