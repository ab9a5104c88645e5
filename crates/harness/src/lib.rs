pub mod faults;
pub mod network;
pub mod peer;

pub use faults::{FaultyBlobBackend, FaultyRecordBackend};
pub use network::TestNetwork;
pub use peer::TestPeer;
