//! Backend wrappers that fail or pause on demand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use roomstore_core::RoomId;
use roomstore_storage::{
    BlobBackend, RecordBackend, SceneRecordUpdate, StorageError, StoredSceneRecord,
    UploadOptions,
};

pub struct FaultyRecordBackend {
    inner: Arc<dyn RecordBackend>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    yield_after_read: AtomicBool,
}

impl FaultyRecordBackend {
    pub fn new(inner: Arc<dyn RecordBackend>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            yield_after_read: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Hand control back to the runtime after each read so that two saves
    /// driven by `tokio::join!` both read before either writes.
    pub fn yield_after_read(&self, enabled: bool) {
        self.yield_after_read.store(enabled, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordBackend for FaultyRecordBackend {
    async fn select_one(
        &self,
        table: &str,
        room_id: &RoomId,
    ) -> Result<Option<StoredSceneRecord>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read("injected read failure".into()));
        }
        let found = self.inner.select_one(table, room_id).await;
        if self.yield_after_read.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        found
    }

    async fn insert(&self, table: &str, record: &StoredSceneRecord) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.insert(table, record).await
    }

    async fn update(
        &self,
        table: &str,
        room_id: &RoomId,
        fields: &SceneRecordUpdate,
    ) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.update(table, room_id, fields).await
    }
}

/// Fails uploads to chosen paths and counts downloads.
pub struct FaultyBlobBackend {
    inner: Arc<dyn BlobBackend>,
    failing_paths: Mutex<HashSet<String>>,
    downloads: AtomicUsize,
}

impl FaultyBlobBackend {
    pub fn new(inner: Arc<dyn BlobBackend>) -> Self {
        Self {
            inner,
            failing_paths: Mutex::new(HashSet::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn fail_path(&self, path: impl Into<String>) {
        self.failing_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into());
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn is_failing(&self, path: &str) -> bool {
        self.failing_paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path)
    }
}

#[async_trait]
impl BlobBackend for FaultyBlobBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        if self.is_failing(path) {
            return Err(StorageError::Write(format!("injected upload failure for {path}")));
        }
        self.inner.upload(bucket, path, bytes, options).await
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(bucket, path).await
    }
}
