//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::state::{GameState, GameStatus, PowerUpKind};

/// A player action proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Step onto the given cell
    Move { x: i32, y: i32 },
    /// Drop a bomb on the player's current cell
    PlaceBomb,
    /// Pick up the power-up at the given cell
    CollectPowerUp { x: i32, y: i32 },
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to join a waiting room
    JoinRoom { room_id: Uuid },

    /// Player intent
    Intent {
        /// Per-player sequence number, strictly increasing
        seq: u32,
        action: Action,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current room
    LeaveRoom,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of room join
    RoomJoined {
        room_id: Uuid,
        player_id: Uuid,
        /// Seed the room's terrain and drops are generated from
        seed: u64,
    },

    /// Player joined the room
    PlayerJoined { player: PlayerInfo },

    /// Player left the room
    PlayerLeft { player_id: Uuid, reason: String },

    /// Room status transition
    StatusChanged { status: GameStatus },

    /// Full authoritative state
    Snapshot {
        tick: u64,
        state: GameState,
        /// Events since the previous snapshot
        events: Vec<GameEvent>,
    },

    /// Match has ended
    GameOver { winner: Option<Uuid> },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for join notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub display_name: String,
}

/// Gameplay events emitted by the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    BombPlaced {
        bomb_id: u64,
        owner_id: Uuid,
        x: i32,
        y: i32,
    },

    BombDetonated {
        bomb_id: u64,
        owner_id: Uuid,
        x: i32,
        y: i32,
        /// Set off by another bomb's blast
        chained: bool,
    },

    PlayerKilled { player_id: Uuid, x: i32, y: i32 },

    PowerUpSpawned {
        power_up_id: u64,
        kind: PowerUpKind,
        x: i32,
        y: i32,
    },

    PowerUpCollected {
        player_id: Uuid,
        kind: PowerUpKind,
        x: i32,
        y: i32,
    },
}

/// Messages on the lobby channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LobbyMsg {
    RoomCreated { room: RoomSummary },
    RoomUpdated { room: RoomSummary },
    RoomClosed { room_id: Uuid },
}

/// Lobby view of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub capacity: usize,
    pub status: GameStatus,
    pub players: Vec<PlayerInfo>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_wire_format() {
        let json = r#"{"type":"intent","seq":4,"action":{"kind":"move","x":2,"y":1}}"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        match msg {
            ClientMsg::Intent { seq, action } => {
                assert_eq!(seq, 4);
                assert_eq!(action, Action::Move { x: 2, y: 1 });
            }
            other => panic!("unexpected {other:?}"),
        }

        let raw = r#"{"type":"intent","seq":5,"action":{"kind":"place_bomb"}}"#;
        let bomb: ClientMsg = serde_json::from_str(raw).unwrap();
        assert!(matches!(bomb, ClientMsg::Intent { action: Action::PlaceBomb, .. }));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn game_over_serializes_missing_winner_as_null() {
        let json = serde_json::to_value(ServerMsg::GameOver { winner: None }).unwrap();
        assert_eq!(json["type"], "game_over");
        assert!(json["winner"].is_null());
    }
}
