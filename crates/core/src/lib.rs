pub mod clock;
pub mod codec;
pub mod crypto;
pub mod element;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::FileMetadata;
pub use crypto::{EncryptedPayload, RoomKey};
pub use element::{
    AppState, DEFAULT_TOMBSTONE_TTL_MS, Element, ElementKind, SyncableElements, restore_elements,
};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use version::{SceneVersion, scene_version};
