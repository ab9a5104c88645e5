use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use roomstore_core::{ConnectionId, Element, SceneVersion, scene_version};

use crate::portal::Portal;

/// Last scene version known to be durably stored, per live connection.
///
/// Purely an optimization: a missing entry only costs a redundant save.
/// Entries are dropped with [`VersionCache::forget`] when a connection is
/// torn down.
#[derive(Debug, Default)]
pub struct VersionCache {
    entries: Mutex<HashMap<ConnectionId, SceneVersion>>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are plain integers, so a panic elsewhere cannot leave one torn.
    fn entries(&self) -> MutexGuard<'_, HashMap<ConnectionId, SceneVersion>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, connection: ConnectionId) -> Option<SceneVersion> {
        self.entries().get(&connection).copied()
    }

    pub fn set(&self, connection: ConnectionId, elements: &[Element]) {
        self.set_version(connection, scene_version(elements));
    }

    pub fn set_version(&self, connection: ConnectionId, version: SceneVersion) {
        self.entries().insert(connection, version);
    }

    pub fn forget(&self, connection: ConnectionId) -> Option<SceneVersion> {
        self.entries().remove(&connection)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Without a connected room there is nothing to compare against, and the
    /// answer is "saved" so unload is never blocked.
    pub fn is_saved(&self, portal: &Portal, elements: &[Element]) -> bool {
        match portal.active() {
            Some((connection, _)) => self.get(connection) == Some(scene_version(elements)),
            None => true,
        }
    }
}
