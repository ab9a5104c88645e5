use std::sync::Arc;

use tracing::{debug, info, warn};

use roomstore_core::codec::{decrypt_elements, encrypt_elements};
use roomstore_core::{
    AppState, Clock, ConnectionId, Element, RoomId, RoomKey, SyncableElements, restore_elements,
    scene_version,
};
use roomstore_storage::{RecordBackend, StoredSceneRecord};

use crate::error::EngineError;
use crate::portal::{Portal, RoomContext};
use crate::reconcile::reconcile;
use crate::version_cache::VersionCache;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Drop tombstones from the result. For hydrating a fresh client only;
    /// anything fed back into reconciliation must keep them.
    pub drop_deleted: bool,
}

impl LoadOptions {
    pub fn for_display() -> Self {
        Self { drop_deleted: true }
    }
}

/// Read-reconcile-write persistence of encrypted scene records.
///
/// The sequence is not atomic across clients: two concurrent saves to the
/// same room race and the last write lands. Reconciliation converges, so
/// whichever client saves next folds the lost side back in.
pub struct SceneStore {
    records: Arc<dyn RecordBackend>,
    table: String,
    cache: VersionCache,
    clock: Arc<dyn Clock>,
    tombstone_ttl_ms: i64,
}

impl SceneStore {
    pub fn new(
        records: Arc<dyn RecordBackend>,
        table: impl Into<String>,
        tombstone_ttl_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            table: table.into(),
            cache: VersionCache::new(),
            clock,
            tombstone_ttl_ms,
        }
    }

    pub fn version_cache(&self) -> &VersionCache {
        &self.cache
    }

    pub fn is_saved(&self, portal: &Portal, elements: &[Element]) -> bool {
        self.cache.is_saved(portal, elements)
    }

    /// Drop the cached version of a connection that went away.
    pub fn disconnect(&self, connection: ConnectionId) {
        self.cache.forget(connection);
    }

    fn syncable(&self, elements: Vec<Element>) -> SyncableElements {
        SyncableElements::filter(elements, self.clock.now_ms(), self.tombstone_ttl_ms)
    }

    fn seal(
        &self,
        room: &RoomContext,
        elements: &[Element],
    ) -> Result<StoredSceneRecord, EngineError> {
        let sealed = encrypt_elements(&room.room_key, elements)?;
        Ok(StoredSceneRecord {
            room_id: room.room_id.clone(),
            scene_version: scene_version(elements),
            iv: sealed.iv,
            ciphertext: sealed.ciphertext,
        })
    }

    fn open(
        &self,
        record: &StoredSceneRecord,
        room_key: &RoomKey,
    ) -> Result<Vec<Element>, EngineError> {
        let elements = decrypt_elements(room_key, &record.iv, &record.ciphertext)
            .map_err(|e| EngineError::decrypt(e, &record.room_id))?;
        Ok(restore_elements(elements, false))
    }

    /// Persist `elements` for the portal's room.
    ///
    /// Returns `Ok(None)` when there is nothing to do: no connected room, or
    /// the scene is already known to be stored. Otherwise returns the
    /// elements as they now exist in storage, which may include remote
    /// changes merged in. On error the version cache is untouched, so the
    /// next call retries the whole sequence.
    pub async fn save(
        &self,
        portal: &Portal,
        elements: &SyncableElements,
        app_state: &AppState,
    ) -> Result<Option<SyncableElements>, EngineError> {
        let Some((connection, room)) = portal.active() else {
            debug!("no room to save to");
            return Ok(None);
        };
        if self.is_saved(portal, elements) {
            debug!(room_id = %room.room_id, "scene already saved");
            return Ok(None);
        }

        let existing = self
            .records
            .select_one(&self.table, &room.room_id)
            .await
            .map_err(EngineError::read)?;

        let stored = match existing {
            None => {
                let record = self.seal(room, elements)?;
                self.records
                    .insert(&self.table, &record)
                    .await
                    .map_err(EngineError::write)?;
                info!(room_id = %room.room_id, scene_version = %record.scene_version, "created scene record");
                record
            }
            Some(previous) => {
                let previous = self.syncable(self.open(&previous, &room.room_key)?);
                let reconciled = self.syncable(reconcile(elements, &previous, app_state));
                let record = self.seal(room, &reconciled)?;
                self.records
                    .update(&self.table, &room.room_id, &record.update_fields())
                    .await
                    .map_err(EngineError::write)?;
                debug!(
                    room_id = %room.room_id,
                    scene_version = %record.scene_version,
                    elements = reconciled.len(),
                    "updated scene record"
                );
                record
            }
        };

        // Read back what was written before trusting it in the cache.
        let stored_elements = self.syncable(self.open(&stored, &room.room_key)?);
        self.cache.set(connection, &stored_elements);
        Ok(Some(stored_elements))
    }

    /// Fetch and decrypt the scene of `room_id`.
    ///
    /// `Ok(None)` means the room has never been saved, or no backend is
    /// configured to hold it. A record that exists but cannot be read or
    /// decrypted is an error.
    pub async fn load(
        &self,
        room_id: &RoomId,
        room_key: &RoomKey,
        connection: Option<ConnectionId>,
        options: LoadOptions,
    ) -> Result<Option<SyncableElements>, EngineError> {
        let record = match self.records.select_one(&self.table, room_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(%room_id, "no stored scene");
                return Ok(None);
            }
            Err(e) if e.is_unavailable() => {
                warn!(%room_id, error = %e, "no storage backend available, nothing to load");
                return Ok(None);
            }
            Err(e) => return Err(EngineError::StorageRead(e)),
        };

        let stored = self.open(&record, room_key)?;
        let actual = scene_version(&stored);
        if actual != record.scene_version {
            warn!(%room_id, stored = %record.scene_version, %actual, "scene_version does not match stored content");
        }

        let elements = self.syncable(restore_elements(stored, options.drop_deleted));
        if let Some(connection) = connection {
            self.cache.set(connection, &elements);
        }
        Ok(Some(elements))
    }
}
