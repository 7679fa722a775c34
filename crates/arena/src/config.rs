//! Server configuration.

use std::env;
use std::str::FromStr;

use arena_account::{DEFAULT_STORAGE_PERMITS, STARTING_HP};
use serde::Deserialize;

use crate::ArenaError;

/// Tunables for an arena server.
///
/// Deserializable so it can be embedded in a larger config file; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Address the listener binds to.
    pub bind_addr: String,
    /// The only request path accepted for WebSocket upgrades.
    pub path: String,
    /// HP removed by one fireball.
    pub fireball_damage: i32,
    /// HP a dead mage comes back with on join.
    pub max_hp: i32,
    /// Concurrent account storage calls allowed.
    pub storage_permits: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            path: "/ws".to_string(),
            fireball_damage: 10,
            max_hp: STARTING_HP,
            storage_permits: DEFAULT_STORAGE_PERMITS,
        }
    }
}

impl ArenaConfig {
    /// Defaults overlaid with `ARENA_*` environment variables.
    ///
    /// # Errors
    /// [`ArenaError::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ArenaError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArenaError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("ARENA_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = lookup("ARENA_WS_PATH") {
            config.path = path;
        }
        if let Some(raw) = lookup("ARENA_FIREBALL_DAMAGE") {
            config.fireball_damage = parse("ARENA_FIREBALL_DAMAGE", &raw)?;
        }
        if let Some(raw) = lookup("ARENA_MAX_HP") {
            config.max_hp = parse("ARENA_MAX_HP", &raw)?;
        }
        if let Some(raw) = lookup("ARENA_STORAGE_PERMITS") {
            config.storage_permits = parse("ARENA_STORAGE_PERMITS", &raw)?;
        }
        Ok(config)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ArenaError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ArenaError::Config(format!("{key}={raw:?}: {e}")))
}
