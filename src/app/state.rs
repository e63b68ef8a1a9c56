//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::lobby::{InMemoryRoomStore, LobbyService, RoomSettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<LobbyService>,
    pub room_registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize room registry
        let room_registry = Arc::new(RoomRegistry::new());

        // Initialize lobby over the in-memory room store
        let settings = RoomSettings {
            default_capacity: config.room_capacity,
            snapshot_interval: config.snapshot_interval_ticks,
            seed: config.match_seed,
            idle_timeout: config.room_idle_timeout,
        };
        let lobby = Arc::new(LobbyService::new(
            Arc::new(InMemoryRoomStore::new()),
            room_registry.clone(),
            settings,
        ));

        Self {
            config,
            lobby,
            room_registry,
        }
    }
}
