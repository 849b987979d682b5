// src/config.rs
// Process configuration from the environment, with logged fallbacks

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::game::Role;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub resource_config: PathBuf,
    pub role: Role,
    pub world_seed: u64,
    pub map_width: i32,
    pub level_height: i32,
    pub tick_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resource_config: PathBuf::from("config/Resources.dat"),
            role: Role::Server,
            world_seed: 12345,
            map_width: 4096,
            level_height: 512,
            tick_interval: Duration::from_millis(100),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take defaults, unparsable ones
    /// take defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let resource_config = lookup("RESOURCE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or(defaults.resource_config);

        let role = match lookup("RESOURCE_ROLE") {
            Some(raw) => Role::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "RESOURCE_ROLE not recognised, using server");
                defaults.role
            }),
            None => defaults.role,
        };

        let map_width = parse_or(&lookup, "MAP_WIDTH", defaults.map_width);
        let level_height = parse_or(&lookup, "LEVEL_HEIGHT", defaults.level_height);
        let tick_ms = parse_or(&lookup, "TICK_INTERVAL_MS", 100u64).max(1);

        Self {
            resource_config,
            role,
            world_seed: parse_or(&lookup, "WORLD_SEED", defaults.world_seed),
            map_width: positive_or(map_width, "MAP_WIDTH", defaults.map_width),
            level_height: positive_or(level_height, "LEVEL_HEIGHT", defaults.level_height),
            tick_interval: Duration::from_millis(tick_ms),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

fn positive_or(value: i32, key: &str, default: i32) -> i32 {
    if value > 0 {
        value
    } else {
        warn!(key, value, "Must be positive, using default");
        default
    }
}
