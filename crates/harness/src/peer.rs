use std::sync::Arc;

use roomstore_core::{
    AppState, Clock, Element, ElementId, ElementKind, FixedClock, RoomId, RoomKey,
    SyncableElements,
};
use roomstore_engine::{Backends, EngineError, Portal, RoomStorage, StorageConfig};

/// A client connected to one room: its local scene plus its own storage
/// handle and version cache.
pub struct TestPeer {
    pub portal: Portal,
    pub app_state: AppState,
    scene: Vec<Element>,
    storage: RoomStorage,
    clock: Arc<FixedClock>,
    tombstone_ttl_ms: i64,
}

impl TestPeer {
    pub fn new(
        config: &StorageConfig,
        backends: Backends,
        clock: Arc<FixedClock>,
        room_id: RoomId,
        room_key: RoomKey,
    ) -> Self {
        Self {
            portal: Portal::connected(room_id, room_key),
            app_state: AppState::default(),
            scene: Vec::new(),
            storage: RoomStorage::with_backends(config, backends, clock.clone()),
            clock,
            tombstone_ttl_ms: config.tombstone_ttl_ms,
        }
    }

    pub fn storage(&self) -> &RoomStorage {
        &self.storage
    }

    pub fn scene(&self) -> &[Element] {
        &self.scene
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.scene.iter().find(|el| el.id.as_str() == id)
    }

    /// Ids of elements that are not deleted, in scene order.
    pub fn visible_ids(&self) -> Vec<String> {
        self.scene
            .iter()
            .filter(|el| !el.is_deleted)
            .map(|el| el.id.to_string())
            .collect()
    }

    pub fn add_rect(&mut self, id: &str) -> ElementId {
        let index = format!("a{:06}", self.scene.len());
        let element = Element::new(id, ElementKind::Rectangle)
            .with_bounds(0.0, 0.0, 20.0, 20.0)
            .with_index(index)
            .with_updated(self.clock.now_ms());
        let element_id = element.id.clone();
        self.scene.push(element);
        element_id
    }

    /// Apply `change` to a new version of element `id`.
    pub fn edit(&mut self, id: &str, change: impl FnOnce(&mut Element)) -> bool {
        let now = self.clock.now_ms();
        match self.scene.iter_mut().find(|el| el.id.as_str() == id) {
            Some(element) => {
                let mut next = element.bumped(now);
                change(&mut next);
                *element = next;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let now = self.clock.now_ms();
        match self.scene.iter_mut().find(|el| el.id.as_str() == id) {
            Some(element) => {
                *element = element.deleted(now);
                true
            }
            None => false,
        }
    }

    pub fn syncable(&self) -> SyncableElements {
        SyncableElements::filter(self.scene.clone(), self.clock.now_ms(), self.tombstone_ttl_ms)
    }

    pub fn is_saved(&self) -> bool {
        self.storage
            .is_scene_saved(&self.portal, self.syncable().as_slice())
    }

    /// Save the local scene and adopt whatever storage now holds.
    pub async fn save(&mut self) -> Result<Option<SyncableElements>, EngineError> {
        let saved = self
            .storage
            .save_scene(&self.portal, &self.syncable(), &self.app_state)
            .await?;
        if let Some(stored) = &saved {
            self.scene = stored.as_slice().to_vec();
        }
        Ok(saved)
    }

    /// Hydrate the local scene from storage. Returns whether a scene existed.
    pub async fn load(&mut self) -> Result<bool, EngineError> {
        let Some((connection, room)) = self.portal.active() else {
            return Ok(false);
        };
        let loaded = self
            .storage
            .load_scene(&room.room_id, &room.room_key, Some(connection))
            .await?;
        Ok(match loaded {
            Some(elements) => {
                self.scene = elements.into_vec();
                true
            }
            None => false,
        })
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.portal.connection {
            self.storage.disconnect(connection);
        }
        self.portal = Portal::disconnected();
    }
}
