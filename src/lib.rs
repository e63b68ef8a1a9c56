//! Bomb Arena Server - authoritative tick-based arena simulation
//!
//! Each room runs its own simulator task. Clients send intents over a
//! WebSocket and receive full state snapshots back.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod lobby;
pub mod util;
pub mod ws;
