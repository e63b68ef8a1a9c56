//! Room state ownership and the authoritative tick loop

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lobby::StatusReporter;
use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{Action, PlayerInfo, ServerMsg};

use super::grid::GridGenerator;
use super::replication::Intent;
use super::simulation::{self, JoinError};
use super::snapshot::SnapshotBuilder;
use super::state::{GameState, GameStatus};

/// Commands a room task accepts
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        display_name: String,
        /// Receives the joiner's `room_joined` confirmation
        reply: oneshot::Sender<Result<ServerMsg, JoinError>>,
    },
    Intent {
        seq: u32,
        action: Action,
    },
    Leave,
}

/// Player input routed to a room
#[derive(Debug)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub command: RoomCommand,
    /// Unix millis when the connection handed the input over
    pub received_at: u64,
}

/// Handle to a running room
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub id: Uuid,
    pub seed: u64,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all running rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative simulator for one room
pub struct GameRoom {
    state: GameState,
    rng: ChaCha8Rng,
    seed: u64,
    capacity: usize,
    /// How long the room may stay open without anyone joining
    idle_timeout: Duration,
    /// Players with a live connection to this room
    connected: HashSet<Uuid>,
    had_players: bool,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    reporter: StatusReporter,
}

impl GameRoom {
    /// Create a room; terrain and drops derive from `seed`
    pub fn new(
        id: Uuid,
        seed: u64,
        capacity: usize,
        snapshot_interval: u32,
        idle_timeout: Duration,
        reporter: StatusReporter,
    ) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            seed,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let grid = GridGenerator::generate(&mut rng);

        let room = Self {
            state: GameState::new(id, grid),
            rng,
            seed,
            capacity,
            idle_timeout,
            connected: HashSet::new(),
            had_players: false,
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            player_count,
            reporter,
        };

        (room, handle)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Run the tick loop until the match finishes, everyone leaves, or nobody
    /// joins within the idle timeout
    pub async fn run(mut self) {
        info!(room_id = %self.state.room_id, seed = self.seed, "Room opened");
        let opened_at = Instant::now();

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_inputs();

            self.run_tick();

            if self.state.status == GameStatus::Finished {
                info!(
                    room_id = %self.state.room_id,
                    tick = self.state.tick,
                    winner = ?self.state.winner,
                    "Match finished"
                );
                break;
            }

            if self.connected.is_empty() {
                if self.had_players {
                    info!(room_id = %self.state.room_id, "All players left, closing room");
                    break;
                }
                if opened_at.elapsed() >= self.idle_timeout {
                    info!(room_id = %self.state.room_id, "Nobody joined, closing idle room");
                    break;
                }
            }
        }

        self.broadcast(ServerMsg::GameOver {
            winner: self.state.winner,
        });
    }

    /// Apply every queued input immediately, in arrival order
    pub fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.command {
                RoomCommand::Join {
                    display_name,
                    reply,
                } => {
                    let result = self.handle_join(input.player_id, display_name);
                    // Caller may have given up waiting
                    let _ = reply.send(result);
                }
                RoomCommand::Intent { seq, action } => {
                    let intent = Intent::new(input.player_id, seq, action);
                    self.handle_intent(intent, input.received_at);
                }
                RoomCommand::Leave => {
                    self.handle_leave(input.player_id);
                }
            }
        }
    }

    fn handle_join(
        &mut self,
        player_id: Uuid,
        display_name: String,
    ) -> Result<ServerMsg, JoinError> {
        let status_before = self.state.status;

        let joined = simulation::join(&mut self.state, player_id, display_name, self.capacity)
            .map(|player| PlayerInfo {
                player_id: player.id,
                display_name: player.name.clone(),
            });
        let player = match joined {
            Ok(player) => player,
            Err(e) => {
                warn!(
                    room_id = %self.state.room_id,
                    player_id = %player_id,
                    error = %e,
                    "Join rejected"
                );
                return Err(e);
            }
        };

        self.connected.insert(player_id);
        self.had_players = true;
        self.player_count.store(self.connected.len(), Ordering::Relaxed);

        self.broadcast(ServerMsg::PlayerJoined { player });

        info!(
            room_id = %self.state.room_id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player joined room"
        );

        self.on_status(status_before);
        self.publish_snapshot();
        Ok(ServerMsg::RoomJoined {
            room_id: self.state.room_id,
            player_id,
            seed: self.seed,
        })
    }

    fn handle_intent(&mut self, intent: Intent, received_at: u64) {
        let mut events = Vec::new();
        if simulation::apply_intent(&mut self.state, &intent, &mut events) {
            self.snapshot_builder.record(events);
        } else {
            debug!(
                room_id = %self.state.room_id,
                player_id = %intent.player_id,
                seq = intent.seq,
                age_ms = unix_millis().saturating_sub(received_at),
                "Ignored intent"
            );
        }
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        if !self.connected.remove(&player_id) {
            return;
        }
        self.player_count.store(self.connected.len(), Ordering::Relaxed);
        simulation::leave(&mut self.state, player_id);

        self.broadcast(ServerMsg::PlayerLeft {
            player_id,
            reason: "left".to_string(),
        });

        info!(room_id = %self.state.room_id, player_id = %player_id, "Player left room");

        if self.state.status == GameStatus::Waiting {
            self.publish_snapshot();
        }
    }

    /// Run a single simulation tick and publish the result
    pub fn run_tick(&mut self) {
        let status_before = self.state.status;

        let (state, events) = simulation::step(std::mem::take(&mut self.state), &mut self.rng);
        self.state = state;
        self.snapshot_builder.record(events);

        self.on_status(status_before);

        if self.snapshot_builder.should_send() && self.state.status != GameStatus::Waiting {
            self.publish_snapshot();
        }
    }

    fn on_status(&mut self, before: GameStatus) {
        let status = self.state.status;
        if status == before {
            return;
        }

        info!(room_id = %self.state.room_id, from = ?before, to = ?status, "Room status changed");
        self.reporter.report(self.state.room_id, status);
        self.broadcast(ServerMsg::StatusChanged { status });
        self.snapshot_builder.force_next();
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.snapshot_builder.build(&self.state);
        self.broadcast(snapshot);
    }

    /// Send to every subscriber. Failure only means nobody is listening.
    fn broadcast(&self, msg: ServerMsg) {
        if let Err(e) = self.snapshot_tx.send(msg) {
            debug!(room_id = %self.state.room_id, error = %e, "Room broadcast had no receivers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Position;
    use crate::lobby::{InMemoryRoomStore, RoomStore};
    use crate::util::time::BOMB_FUSE_TICKS;
    use crate::ws::protocol::LobbyMsg;

    struct Fixture {
        room: GameRoom,
        handle: RoomHandle,
        store: Arc<InMemoryRoomStore>,
        lobby_rx: broadcast::Receiver<LobbyMsg>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRoomStore::new());
        let summary = store.create("test".into(), 4);
        let (lobby_tx, lobby_rx) = broadcast::channel(16);
        let reporter = StatusReporter::new(store.clone(), lobby_tx);
        let idle = Duration::from_secs(60);
        let (room, handle) = GameRoom::new(summary.id, 1234, 4, 1, idle, reporter);
        Fixture {
            room,
            handle,
            store,
            lobby_rx,
        }
    }

    fn send(handle: &RoomHandle, player_id: Uuid, command: RoomCommand) {
        handle
            .input_tx
            .try_send(PlayerInput {
                player_id,
                command,
                received_at: 0,
            })
            .unwrap();
    }

    fn join(fx: &mut Fixture, player_id: Uuid) -> Result<ServerMsg, JoinError> {
        let (reply, mut reply_rx) = oneshot::channel();
        send(
            &fx.handle,
            player_id,
            RoomCommand::Join {
                display_name: "p".into(),
                reply,
            },
        );
        fx.room.process_inputs();
        reply_rx.try_recv().unwrap()
    }

    #[test]
    fn second_join_reports_playing_to_store_and_lobby() {
        let mut fx = fixture();
        let room_id = fx.room.state().room_id;

        join(&mut fx, Uuid::new_v4()).unwrap();
        assert_eq!(fx.store.get(room_id).unwrap().status, GameStatus::Waiting);
        join(&mut fx, Uuid::new_v4()).unwrap();

        assert_eq!(fx.room.state().status, GameStatus::Playing);
        assert_eq!(fx.store.get(room_id).unwrap().status, GameStatus::Playing);
        match fx.lobby_rx.try_recv().unwrap() {
            LobbyMsg::RoomUpdated { room } => assert_eq!(room.status, GameStatus::Playing),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fx.handle.player_count(), 2);
    }

    #[test]
    fn duplicate_join_is_refused() {
        let mut fx = fixture();
        let id = Uuid::new_v4();
        join(&mut fx, id).unwrap();
        assert_eq!(join(&mut fx, id).unwrap_err(), JoinError::AlreadyJoined);
    }

    #[test]
    fn join_confirmation_goes_only_to_the_joiner() {
        let mut fx = fixture();
        let mut rx = fx.handle.snapshot_tx.subscribe();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        match join(&mut fx, a).unwrap() {
            ServerMsg::RoomJoined {
                player_id, seed, ..
            } => {
                assert_eq!(player_id, a);
                assert_eq!(seed, 1234);
            }
            other => panic!("unexpected {other:?}"),
        }
        join(&mut fx, b).unwrap();

        let mut joined = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            assert!(!matches!(msg, ServerMsg::RoomJoined { .. }));
            if let ServerMsg::PlayerJoined { player } = msg {
                joined.push(player.player_id);
            }
        }
        assert_eq!(joined, vec![a, b]);
    }

    #[test]
    fn intents_apply_before_the_next_tick() {
        let mut fx = fixture();
        let a = Uuid::new_v4();
        join(&mut fx, a).unwrap();
        join(&mut fx, Uuid::new_v4()).unwrap();

        send(&fx.handle, a, RoomCommand::Intent { seq: 1, action: Action::PlaceBomb });
        fx.room.process_inputs();
        assert_eq!(fx.room.state().bombs.len(), 1);
        assert_eq!(fx.room.state().bombs[0].pos, Position::new(1, 1));
    }

    #[test]
    fn snapshots_follow_ticks_while_playing() {
        let mut fx = fixture();
        let mut rx = fx.handle.snapshot_tx.subscribe();
        join(&mut fx, Uuid::new_v4()).unwrap();
        join(&mut fx, Uuid::new_v4()).unwrap();
        while rx.try_recv().is_ok() {}

        fx.room.run_tick();
        match rx.try_recv().unwrap() {
            ServerMsg::Snapshot { tick, state, .. } => {
                assert_eq!(tick, 1);
                assert_eq!(state.status, GameStatus::Playing);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn waiting_room_does_not_tick() {
        let mut fx = fixture();
        let mut rx = fx.handle.snapshot_tx.subscribe();
        join(&mut fx, Uuid::new_v4()).unwrap();
        while rx.try_recv().is_ok() {}

        fx.room.run_tick();
        assert_eq!(fx.room.state().tick, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn forfeit_by_leaving_ends_the_match() {
        let mut fx = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        join(&mut fx, a).unwrap();
        join(&mut fx, b).unwrap();

        send(&fx.handle, a, RoomCommand::Leave);
        fx.room.process_inputs();
        fx.room.run_tick();

        assert_eq!(fx.room.state().status, GameStatus::Finished);
        assert_eq!(fx.room.state().winner, Some(b));
        let room_id = fx.room.state().room_id;
        assert_eq!(fx.store.get(room_id).unwrap().status, GameStatus::Finished);
    }

    #[test]
    fn own_bomb_kills_a_stationary_player() {
        let mut fx = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        join(&mut fx, a).unwrap();
        join(&mut fx, b).unwrap();

        send(&fx.handle, a, RoomCommand::Intent { seq: 1, action: Action::PlaceBomb });
        fx.room.process_inputs();
        for _ in 0..BOMB_FUSE_TICKS {
            fx.room.run_tick();
        }

        assert_eq!(fx.room.state().status, GameStatus::Finished);
        assert_eq!(fx.room.state().winner, Some(b));
    }

    #[tokio::test]
    async fn run_loop_streams_snapshots_and_closes_when_empty() {
        let fx = fixture();
        let handle = fx.handle.clone();
        let mut rx = handle.snapshot_tx.subscribe();
        let task = tokio::spawn(fx.room.run());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for id in [a, b] {
            let (reply, reply_rx) = oneshot::channel();
            handle
                .input_tx
                .send(PlayerInput {
                    player_id: id,
                    command: RoomCommand::Join {
                        display_name: "p".into(),
                        reply,
                    },
                    received_at: 0,
                })
                .await
                .unwrap();
            assert!(matches!(
                reply_rx.await.unwrap(),
                Ok(ServerMsg::RoomJoined { .. })
            ));
        }

        let playing_snapshot = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(ServerMsg::Snapshot { state, .. }) if state.tick > 0 => return state,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("channel error {e}"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(playing_snapshot.status, GameStatus::Playing);

        for id in [a, b] {
            handle
                .input_tx
                .send(PlayerInput {
                    player_id: id,
                    command: RoomCommand::Leave,
                    received_at: 0,
                })
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unjoined_room_closes_after_idle_timeout() {
        let store = Arc::new(InMemoryRoomStore::new());
        let summary = store.create("empty".into(), 4);
        let (lobby_tx, _lobby_rx) = broadcast::channel(16);
        let reporter = StatusReporter::new(store.clone(), lobby_tx);
        let idle = Duration::from_secs(5);
        let (room, _handle) = GameRoom::new(summary.id, 7, 4, 1, idle, reporter);

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(30), room.run())
            .await
            .unwrap();
        assert!(started.elapsed() >= idle);
    }
}
