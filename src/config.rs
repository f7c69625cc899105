//! # Configuration Management
//!
//! Loads runtime settings from `ferry-config.toml`: the transit API key
//! and harbour names, and the clock synchronization parameters. Anything
//! missing or malformed falls back to the built-in defaults so the device
//! always comes up.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration loaded from ferry-config.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Transit API configuration
    pub api: ApiConfig,
    /// NTP clock synchronization configuration
    pub clock: ClockConfig,
}

/// Transit API endpoint and query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API host name
    pub host: String,
    /// API port (plain HTTP)
    pub port: u16,
    /// Access key, treated as an opaque string
    pub key: String,
    /// Free-text name of the harbour whose departures we track
    pub stop_query: String,
    /// Outbound destination name exactly as the API returns it; the
    /// direction flag is a byte-for-byte comparison against this string,
    /// so paste it verbatim, encoding artifacts included
    pub destination: String,
    /// Search window passed as the `duration` query parameter, in minutes
    pub duration_minutes: u32,
}

/// NTP clock synchronization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    /// Time server as `host:port`
    pub server: String,
    /// Local UDP port to bind for replies
    pub local_port: u16,
    /// Whole-hour timezone offset applied to fetched time
    pub timezone_offset_hours: i8,
    /// Offset used for the one retry after a failed synchronization
    pub fallback_offset_hours: i8,
    /// Attempts per synchronization pass
    pub max_tries: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                host: "www.rejseplanen.dk".to_string(),
                port: 80,
                key: String::new(),
                stop_query: "Hou Havn".to_string(),
                destination: "Hou Havn (færge)".to_string(),
                duration_minutes: 500,
            },
            clock: ClockConfig {
                server: "162.159.200.123:123".to_string(), // pool.ntp.org
                local_port: 2390,
                timezone_offset_hours: 1,
                fallback_offset_hours: 2,
                max_tries: 25,
            },
        }
    }
}

impl Config {
    /// Load configuration from ferry-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path("ferry-config.toml")
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("loaded configuration for stop '{}'", config.api.stop_query);
                    config
                }
                Err(e) => {
                    warn!("invalid config file format: {e}; using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to ferry-config.toml
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write("ferry-config.toml", contents)?;
        info!("configuration saved to ferry-config.toml");
        Ok(())
    }
}
