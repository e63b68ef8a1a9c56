//! Room discovery, bookkeeping, and room task lifecycle

pub mod service;
pub mod store;

pub use service::{JoinedRoom, LobbyService, RoomSettings};
pub use store::{InMemoryRoomStore, RoomStore};

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::game::simulation::JoinError;
use crate::game::state::GameStatus;
use crate::ws::protocol::LobbyMsg;

/// Lobby errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Room is not waiting for players")]
    RoomNotWaiting,

    #[error("Player already in room")]
    AlreadyJoined,

    #[error("Room has shut down")]
    RoomClosed,
}

impl LobbyError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::RoomNotFound => "room_not_found",
            LobbyError::RoomFull => "room_full",
            LobbyError::RoomNotWaiting => "room_not_waiting",
            LobbyError::AlreadyJoined => "already_joined",
            LobbyError::RoomClosed => "room_closed",
        }
    }
}

impl From<JoinError> for LobbyError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::AlreadyJoined => LobbyError::AlreadyJoined,
            JoinError::RoomFull => LobbyError::RoomFull,
            JoinError::NotWaiting => LobbyError::RoomNotWaiting,
        }
    }
}

/// Lets a room task report its status transitions to the store and lobby
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn RoomStore>,
    lobby_tx: broadcast::Sender<LobbyMsg>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn RoomStore>, lobby_tx: broadcast::Sender<LobbyMsg>) -> Self {
        Self { store, lobby_tx }
    }

    pub fn report(&self, room_id: Uuid, status: GameStatus) {
        let Some(room) = self.store.update_status(room_id, status) else {
            debug!(room_id = %room_id, "Status report for unknown room");
            return;
        };
        if self.lobby_tx.send(LobbyMsg::RoomUpdated { room }).is_err() {
            debug!(room_id = %room_id, "No lobby subscribers");
        }
    }
}
