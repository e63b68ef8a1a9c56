//! Time utilities for the arena simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Bomb fuse in ticks (3 s)
pub const BOMB_FUSE_TICKS: u32 = 3 * SIMULATION_TPS;
/// Explosion lifetime in ticks (0.5 s)
pub const EXPLOSION_LIFETIME_TICKS: u32 = SIMULATION_TPS / 2;
/// Match time budget in seconds
pub const MATCH_DURATION_SECS: f64 = 180.0;

/// Seconds of match time consumed by one tick
pub fn tick_delta() -> f64 {
    1.0 / SIMULATION_TPS as f64
}

/// Wall-clock duration of one tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_and_lifetime_match_tick_rate() {
        assert_eq!(BOMB_FUSE_TICKS, 180);
        assert_eq!(EXPLOSION_LIFETIME_TICKS, 30);
        assert!((tick_delta() * SIMULATION_TPS as f64 - 1.0).abs() < 1e-12);
    }
}
