//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::game::simulation::MIN_PLAYERS;
use crate::game::state::TeamColor;
use crate::lobby::service::ROOM_IDLE_TIMEOUT_SECS;
use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Allowed client origins for CORS; empty allows any origin
    pub client_origins: Vec<String>,

    /// Default max players per room
    pub room_capacity: usize,
    /// Ticks between snapshots
    pub snapshot_interval_ticks: u32,
    /// Max client messages per second per connection
    pub input_rate_limit: u32,
    /// Fixed seed for every room
    pub match_seed: Option<u64>,
    /// How long a room nobody joins stays open
    pub room_idle_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let room_capacity: usize = parse_or(&lookup, "ROOM_CAPACITY", TeamColor::ALL.len())?;
        let idle_secs: u64 = parse_or(&lookup, "ROOM_IDLE_TIMEOUT_SECS", ROOM_IDLE_TIMEOUT_SECS)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT")
                .is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            client_origins,
            room_capacity: room_capacity.clamp(MIN_PLAYERS, TeamColor::ALL.len()),
            snapshot_interval_ticks: parse_or(&lookup, "SNAPSHOT_INTERVAL_TICKS", 1u32)?.max(1),
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?.max(1),
            match_seed: lookup("MATCH_SEED")
                .map(|raw| raw.trim().parse().map_err(|_| ConfigError::Invalid("MATCH_SEED")))
                .transpose()?,
            room_idle_timeout: Duration::from_secs(idle_secs.max(1)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert!(config.client_origins.is_empty());
        assert_eq!(config.room_capacity, 4);
        assert_eq!(config.snapshot_interval_ticks, 1);
        assert_eq!(config.input_rate_limit, INPUT_RATE_LIMIT);
        assert_eq!(config.match_seed, None);
        assert_eq!(config.room_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn idle_timeout_is_read_in_seconds() {
        let config = load(&[("ROOM_IDLE_TIMEOUT_SECS", "15")]).unwrap();
        assert_eq!(config.room_idle_timeout, Duration::from_secs(15));

        assert!(matches!(
            load(&[("ROOM_IDLE_TIMEOUT_SECS", "-3")]),
            Err(ConfigError::Invalid("ROOM_IDLE_TIMEOUT_SECS"))
        ));
    }

    #[test]
    fn port_takes_precedence_over_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:7000")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn capacity_is_clamped_and_origins_split() {
        let config = load(&[
            ("ROOM_CAPACITY", "9"),
            ("CLIENT_ORIGIN", "http://a.test, http://b.test,"),
            ("MATCH_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(config.room_capacity, 4);
        assert_eq!(config.client_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.match_seed, Some(42));

        let config = load(&[("ROOM_CAPACITY", "1")]).unwrap();
        assert_eq!(config.room_capacity, 2);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            load(&[("SNAPSHOT_INTERVAL_TICKS", "often")]),
            Err(ConfigError::Invalid("SNAPSHOT_INTERVAL_TICKS"))
        ));
        assert!(matches!(
            load(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
