//! Arena simulation: terrain, blasts, damage, and the per-room tick loop

pub mod combat;
pub mod destruction;
pub mod explosion;
pub mod grid;
pub mod replication;
pub mod room;
pub mod simulation;
pub mod snapshot;
pub mod state;

pub use combat::CollisionEngine;
pub use destruction::Destruction;
pub use explosion::ExplosionResolver;
pub use grid::GridGenerator;
pub use replication::{Intent, IntentSequencer, SnapshotMirror};
pub use room::{GameRoom, PlayerInput, RoomCommand, RoomHandle, RoomRegistry};
pub use state::{GameState, GameStatus};
