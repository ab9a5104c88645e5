use roomstore_core::{ConnectionId, RoomId, RoomKey};

#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room_id: RoomId,
    pub room_key: RoomKey,
}

/// The collaboration layer's view of one client: its live connection (if
/// any) and the room it has joined (if any).
#[derive(Debug, Clone, Default)]
pub struct Portal {
    pub connection: Option<ConnectionId>,
    pub room: Option<RoomContext>,
}

impl Portal {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// A fresh connection that has joined `room_id`.
    pub fn connected(room_id: RoomId, room_key: RoomKey) -> Self {
        Self {
            connection: Some(ConnectionId::new()),
            room: Some(RoomContext { room_id, room_key }),
        }
    }

    /// Both a connection and a room, or nothing to persist against.
    pub fn active(&self) -> Option<(ConnectionId, &RoomContext)> {
        match (&self.connection, &self.room) {
            (Some(connection), Some(room)) => Some((*connection, room)),
            _ => None,
        }
    }
}
