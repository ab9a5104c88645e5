use std::sync::Arc;

use roomstore_core::{FixedClock, RoomId, RoomKey};
use roomstore_engine::{Backends, StorageConfig};
use roomstore_storage::{MemoryBlobBackend, MemoryRecordBackend, RecordBackend, StoredSceneRecord};

use crate::TestPeer;
use crate::faults::{FaultyBlobBackend, FaultyRecordBackend};

pub const START_MS: i64 = 1_700_000_000_000;

/// One room shared by several clients over the same in-memory backends.
pub struct TestNetwork {
    pub room_id: RoomId,
    pub room_key: RoomKey,
    pub clock: Arc<FixedClock>,
    pub config: StorageConfig,
    records: Arc<FaultyRecordBackend>,
    blobs: Arc<FaultyBlobBackend>,
    peers: Vec<TestPeer>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            room_id: RoomId::from("test-room"),
            room_key: RoomKey::generate(),
            clock: Arc::new(FixedClock::new(START_MS)),
            config: StorageConfig::default(),
            records: Arc::new(FaultyRecordBackend::new(Arc::new(MemoryRecordBackend::new()))),
            blobs: Arc::new(FaultyBlobBackend::new(Arc::new(MemoryBlobBackend::new()))),
            peers: Vec::new(),
        }
    }

    pub fn records(&self) -> &FaultyRecordBackend {
        &self.records
    }

    pub fn blobs(&self) -> &FaultyBlobBackend {
        &self.blobs
    }

    /// The raw row for this room, as a backend client would see it.
    pub async fn stored_record(
        &self,
    ) -> Result<Option<StoredSceneRecord>, roomstore_storage::StorageError> {
        self.records
            .select_one(&self.config.scenes_table, &self.room_id)
            .await
    }

    pub fn backends(&self) -> Backends {
        Backends {
            records: self.records.clone(),
            blobs: self.blobs.clone(),
        }
    }

    pub fn add_peer(&mut self) -> usize {
        let peer = TestPeer::new(
            &self.config,
            self.backends(),
            self.clock.clone(),
            self.room_id.clone(),
            self.room_key.clone(),
        );
        let index = self.peers.len();
        self.peers.push(peer);
        index
    }

    pub fn peer(&self, index: usize) -> &TestPeer {
        &self.peers[index]
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut TestPeer {
        &mut self.peers[index]
    }

    /// Mutable access to two distinct peers at once.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut TestPeer, &mut TestPeer) {
        assert_ne!(a, b, "pair_mut needs two different peers");
        if a < b {
            let (left, right) = self.peers.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.peers.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }
}
