//! Intent and snapshot replication between the room and its clients
//!
//! The room task is the only simulator. Clients send sequenced intents and
//! render whatever full state the room last pushed to them.

use uuid::Uuid;

use crate::ws::protocol::{Action, ClientMsg, ServerMsg};

use super::state::GameState;

/// An action tagged with the acting player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub player_id: Uuid,
    pub seq: u32,
    pub action: Action,
}

impl Intent {
    pub fn new(player_id: Uuid, seq: u32, action: Action) -> Self {
        Self {
            player_id,
            seq,
            action,
        }
    }

    /// Whether this intent is newer than the last one applied for its player.
    /// Duplicates and reordered stale intents fail this check.
    pub fn is_fresh(&self, last_applied_seq: u32) -> bool {
        self.seq > last_applied_seq
    }
}

/// Client side: stamps outgoing actions with increasing sequence numbers
#[derive(Debug, Default)]
pub struct IntentSequencer {
    last_seq: u32,
}

impl IntentSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, action: Action) -> ClientMsg {
        self.last_seq = self.last_seq.wrapping_add(1).max(1);
        ClientMsg::Intent {
            seq: self.last_seq,
            action,
        }
    }
}

/// Client side: the latest server state for one room.
///
/// A snapshot replaces the held state wholesale. Snapshots for another room,
/// or from an earlier tick than the one held, are dropped. Equal ticks are
/// accepted since the room publishes membership changes while still waiting.
#[derive(Debug)]
pub struct SnapshotMirror {
    room_id: Uuid,
    state: Option<GameState>,
}

impl SnapshotMirror {
    pub fn new(room_id: Uuid) -> Self {
        Self {
            room_id,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Offer a snapshot; returns true if it replaced the local state
    pub fn apply(&mut self, snapshot: GameState) -> bool {
        if snapshot.room_id != self.room_id {
            return false;
        }
        if let Some(current) = &self.state {
            if snapshot.tick < current.tick {
                return false;
            }
        }
        self.state = Some(snapshot);
        true
    }

    /// Feed a server message; non-snapshot messages are ignored
    pub fn on_message(&mut self, msg: ServerMsg) -> bool {
        match msg {
            ServerMsg::Snapshot { state, .. } => self.apply(state),
            _ => false,
        }
    }
}
