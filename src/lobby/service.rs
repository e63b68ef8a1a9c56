//! Lobby service - room creation, joining, and room task lifecycle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::simulation::MIN_PLAYERS;
use crate::game::state::TeamColor;
use crate::game::{GameRoom, PlayerInput, RoomCommand, RoomHandle, RoomRegistry};
use crate::util::time::unix_millis;
use crate::ws::protocol::{LobbyMsg, PlayerInfo, RoomSummary, ServerMsg};

use super::{LobbyError, RoomStore, StatusReporter};

/// Per-room settings applied at creation
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub default_capacity: usize,
    pub snapshot_interval: u32,
    /// Fixed seed for every room, for reproducible matches
    pub seed: Option<u64>,
    /// Close a room nobody has joined after this long
    pub idle_timeout: Duration,
}

/// Default idle timeout for rooms nobody joins
pub const ROOM_IDLE_TIMEOUT_SECS: u64 = 60;

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_capacity: TeamColor::ALL.len(),
            snapshot_interval: 1,
            seed: None,
            idle_timeout: Duration::from_secs(ROOM_IDLE_TIMEOUT_SECS),
        }
    }
}

/// A successful join
#[derive(Debug)]
pub struct JoinedRoom {
    pub handle: RoomHandle,
    /// `room_joined` for the joiner alone
    pub confirmation: ServerMsg,
    /// Room broadcasts, subscribed before the join was sent
    pub events: broadcast::Receiver<ServerMsg>,
}

/// Lobby service
pub struct LobbyService {
    store: Arc<dyn RoomStore>,
    registry: Arc<RoomRegistry>,
    lobby_tx: broadcast::Sender<LobbyMsg>,
    settings: RoomSettings,
}

impl LobbyService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        registry: Arc<RoomRegistry>,
        settings: RoomSettings,
    ) -> Self {
        let (lobby_tx, _) = broadcast::channel(64);
        Self {
            store,
            registry,
            lobby_tx,
            settings,
        }
    }

    /// Subscribe to lobby notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyMsg> {
        self.lobby_tx.subscribe()
    }

    pub fn list_waiting(&self) -> Vec<RoomSummary> {
        self.store.list_waiting()
    }

    pub fn get_room(&self, room_id: Uuid) -> Option<RoomSummary> {
        self.store.get(room_id)
    }

    /// Create a room and spawn its tick loop. Must be called inside a tokio runtime.
    pub fn create_room(&self, name: String, capacity: Option<usize>) -> RoomSummary {
        let capacity = capacity
            .unwrap_or(self.settings.default_capacity)
            .clamp(MIN_PLAYERS, TeamColor::ALL.len());
        let summary = self.store.create(name, capacity);
        let room_id = summary.id;
        let seed = self.settings.seed.unwrap_or_else(rand::random);

        let reporter = StatusReporter::new(self.store.clone(), self.lobby_tx.clone());
        let (room, handle) = GameRoom::new(
            room_id,
            seed,
            capacity,
            self.settings.snapshot_interval,
            self.settings.idle_timeout,
            reporter,
        );
        self.registry.insert(handle);

        info!(room_id = %room_id, capacity, "Created new room");

        let registry = self.registry.clone();
        let store = self.store.clone();
        let lobby_tx = self.lobby_tx.clone();

        tokio::spawn(async move {
            room.run().await;

            // Cleanup after room closes
            registry.remove(&room_id);
            store.remove(room_id);
            if lobby_tx.send(LobbyMsg::RoomClosed { room_id }).is_err() {
                debug!(room_id = %room_id, "No lobby subscribers");
            }

            info!(room_id = %room_id, "Room removed from registry");
        });

        self.publish(LobbyMsg::RoomCreated {
            room: summary.clone(),
        });
        summary
    }

    /// Join a room.
    ///
    /// The broadcast subscription is taken before the join is sent so the
    /// caller sees its own `player_joined` and the snapshot that follows it.
    /// A join the room refuses is taken back out of the store roster.
    pub async fn join_room(
        &self,
        room_id: Uuid,
        player: PlayerInfo,
    ) -> Result<JoinedRoom, LobbyError> {
        let handle = self.registry.get(&room_id).ok_or(LobbyError::RoomNotFound)?;
        let player_id = player.player_id;
        let display_name = player.display_name.clone();

        self.store.join(room_id, player)?;

        let events = handle.snapshot_tx.subscribe();
        let (reply_tx, reply_rx) = oneshot::channel();
        let input = PlayerInput {
            player_id,
            command: RoomCommand::Join {
                display_name,
                reply: reply_tx,
            },
            received_at: unix_millis(),
        };

        if handle.input_tx.send(input).await.is_err() {
            warn!(room_id = %room_id, player_id = %player_id, "Room input channel closed");
            self.store.unjoin(room_id, player_id);
            return Err(LobbyError::RoomClosed);
        }

        let outcome = match reply_rx.await {
            Ok(result) => result.map_err(LobbyError::from),
            Err(_) => Err(LobbyError::RoomClosed),
        };

        let confirmation = match outcome {
            Ok(msg) => msg,
            Err(e) => {
                if let Some(room) = self.store.unjoin(room_id, player_id) {
                    self.publish(LobbyMsg::RoomUpdated { room });
                }
                return Err(e);
            }
        };

        info!(room_id = %room_id, player_id = %player_id, "Player joined via lobby");
        if let Some(room) = self.store.get(room_id) {
            self.publish(LobbyMsg::RoomUpdated { room });
        }

        Ok(JoinedRoom {
            handle,
            confirmation,
            events,
        })
    }

    /// Leave a room. Safe to call for rooms that already closed.
    pub async fn leave_room(&self, room_id: Uuid, player_id: Uuid) {
        if let Some(handle) = self.registry.get(&room_id) {
            let input = PlayerInput {
                player_id,
                command: RoomCommand::Leave,
                received_at: unix_millis(),
            };
            if handle.input_tx.send(input).await.is_err() {
                debug!(room_id = %room_id, player_id = %player_id, "Room already closed");
            }
        }

        if let Some(room) = self.store.leave(room_id, player_id) {
            self.publish(LobbyMsg::RoomUpdated { room });
        }
    }

    fn publish(&self, msg: LobbyMsg) {
        if self.lobby_tx.send(msg).is_err() {
            debug!("No lobby subscribers");
        }
    }
}
