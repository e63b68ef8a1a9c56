//! Room bookkeeping behind an abstract store

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::game::state::GameStatus;
use crate::ws::protocol::{PlayerInfo, RoomSummary};

use super::LobbyError;

/// Persistence seam for room summaries.
///
/// Room tasks only ever call [`RoomStore::update_status`]; membership is
/// managed by the lobby.
pub trait RoomStore: Send + Sync {
    fn create(&self, name: String, capacity: usize) -> RoomSummary;

    fn get(&self, id: Uuid) -> Option<RoomSummary>;

    /// Add a player to a waiting room with free capacity
    fn join(&self, id: Uuid, player: PlayerInfo) -> Result<RoomSummary, LobbyError>;

    /// Drop a player from a waiting room. Rosters of started rooms are kept.
    fn leave(&self, id: Uuid, player_id: Uuid) -> Option<RoomSummary>;

    /// Undo a [`RoomStore::join`] the room task refused, whatever the status
    fn unjoin(&self, id: Uuid, player_id: Uuid) -> Option<RoomSummary>;

    fn list_waiting(&self) -> Vec<RoomSummary>;

    fn update_status(&self, id: Uuid, status: GameStatus) -> Option<RoomSummary>;

    fn remove(&self, id: Uuid) -> Option<RoomSummary>;
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<Uuid, RoomSummary>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for InMemoryRoomStore {
    fn create(&self, name: String, capacity: usize) -> RoomSummary {
        let room = RoomSummary {
            id: Uuid::new_v4(),
            name,
            capacity,
            status: GameStatus::Waiting,
            players: Vec::new(),
            created_at: Utc::now(),
        };
        self.rooms.write().insert(room.id, room.clone());
        room
    }

    fn get(&self, id: Uuid) -> Option<RoomSummary> {
        self.rooms.read().get(&id).cloned()
    }

    fn join(&self, id: Uuid, player: PlayerInfo) -> Result<RoomSummary, LobbyError> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&id).ok_or(LobbyError::RoomNotFound)?;

        if room.players.iter().any(|p| p.player_id == player.player_id) {
            return Err(LobbyError::AlreadyJoined);
        }
        if room.status != GameStatus::Waiting {
            return Err(LobbyError::RoomNotWaiting);
        }
        if room.players.len() >= room.capacity {
            return Err(LobbyError::RoomFull);
        }

        room.players.push(player);
        Ok(room.clone())
    }

    fn leave(&self, id: Uuid, player_id: Uuid) -> Option<RoomSummary> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&id)?;
        if room.status == GameStatus::Waiting {
            room.players.retain(|p| p.player_id != player_id);
        }
        Some(room.clone())
    }

    fn unjoin(&self, id: Uuid, player_id: Uuid) -> Option<RoomSummary> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&id)?;
        room.players.retain(|p| p.player_id != player_id);
        Some(room.clone())
    }

    fn list_waiting(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .read()
            .values()
            .filter(|r| r.status == GameStatus::Waiting)
            .cloned()
            .collect();
        rooms.sort_by_key(|r| r.created_at);
        rooms
    }

    fn update_status(&self, id: Uuid, status: GameStatus) -> Option<RoomSummary> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&id)?;
        room.status = status;
        Some(room.clone())
    }

    fn remove(&self, id: Uuid) -> Option<RoomSummary> {
        self.rooms.write().remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> PlayerInfo {
        PlayerInfo {
            player_id: Uuid::new_v4(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn join_enforces_capacity_and_uniqueness() {
        let store = InMemoryRoomStore::new();
        let room = store.create("duel".into(), 2);
        let alice = info("alice");

        store.join(room.id, alice.clone()).unwrap();
        assert_eq!(store.join(room.id, alice), Err(LobbyError::AlreadyJoined));
        store.join(room.id, info("bob")).unwrap();
        assert_eq!(store.join(room.id, info("carol")), Err(LobbyError::RoomFull));
        assert_eq!(store.join(Uuid::new_v4(), info("dan")), Err(LobbyError::RoomNotFound));
    }

    #[test]
    fn list_waiting_hides_started_rooms() {
        let store = InMemoryRoomStore::new();
        let a = store.create("a".into(), 4);
        let b = store.create("b".into(), 4);
        store.update_status(a.id, GameStatus::Playing);

        let waiting: Vec<Uuid> = store.list_waiting().iter().map(|r| r.id).collect();
        assert_eq!(waiting, vec![b.id]);
        assert_eq!(
            store.join(a.id, info("late")),
            Err(LobbyError::RoomNotWaiting)
        );
    }

    #[test]
    fn leave_keeps_roster_once_started() {
        let store = InMemoryRoomStore::new();
        let room = store.create("r".into(), 4);
        let alice = info("alice");
        let bob = info("bob");
        store.join(room.id, alice.clone()).unwrap();
        store.join(room.id, bob.clone()).unwrap();

        let after = store.leave(room.id, alice.player_id).unwrap();
        assert_eq!(after.players, vec![bob.clone()]);

        store.update_status(room.id, GameStatus::Playing);
        let after = store.leave(room.id, bob.player_id).unwrap();
        assert_eq!(after.players.len(), 1);
    }

    #[test]
    fn unjoin_drops_player_after_start() {
        let store = InMemoryRoomStore::new();
        let room = store.create("r".into(), 4);
        let alice = info("alice");
        let bob = info("bob");
        store.join(room.id, alice.clone()).unwrap();
        store.join(room.id, bob.clone()).unwrap();
        store.update_status(room.id, GameStatus::Playing);

        let after = store.unjoin(room.id, bob.player_id).unwrap();
        assert_eq!(after.players, vec![alice]);
    }

    #[test]
    fn remove_forgets_room() {
        let store = InMemoryRoomStore::new();
        let room = store.create("r".into(), 4);
        assert!(store.remove(room.id).is_some());
        assert!(store.get(room.id).is_none());
    }
}
