//! Configuration management for the world server.
//!
//! This module handles loading and validation of the server configuration from
//! TOML files. The `[replication]` table is handed to the replication core
//! unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use world_replication::{MapKind, ReplicationConfig};

/// Default tick interval for serde deserialization
fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_stats_interval() -> u64 {
    60
}

fn default_instance_id() -> u32 {
    0
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server loop settings
    pub server: ServerSettings,
    /// Maps loaded at startup
    #[serde(default = "default_maps")]
    pub maps: Vec<MapSettings>,
    /// Simulated population spawned on every map
    #[serde(default)]
    pub population: PopulationSettings,
    /// Replication core tuning
    #[serde(default)]
    pub replication: ReplicationConfig,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name shown in the startup banner and logs
    pub name: String,
    /// Map update interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Seconds between two statistics reports (0 to disable)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// One map instance to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    pub id: u32,
    #[serde(default = "default_instance_id")]
    pub instance_id: u32,
    #[serde(default)]
    pub kind: MapKind,
}

/// Simulated population, spawned deterministically around each map origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationSettings {
    pub players_per_map: u32,
    pub creatures_per_map: u32,
    pub game_objects_per_map: u32,
    /// Half-width of the square the population is spread over, in yards
    pub spread: f32,
    /// Seed of the spawn and movement pattern
    pub seed: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

fn default_maps() -> Vec<MapSettings> {
    vec![
        MapSettings {
            id: 0,
            instance_id: 0,
            kind: MapKind::Continent,
        },
        MapSettings {
            id: 1,
            instance_id: 0,
            kind: MapKind::Continent,
        },
    ]
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            players_per_map: 20,
            creatures_per_map: 100,
            game_objects_per_map: 30,
            spread: 250.0,
            seed: 0x5eed,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                name: "world".to_string(),
                tick_interval_ms: default_tick_interval(),
                stats_interval_secs: default_stats_interval(),
            },
            maps: default_maps(),
            population: PopulationSettings::default(),
            replication: ReplicationConfig::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for correctness.
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        if self.server.tick_interval_ms == 0 {
            return Err("server.tick_interval_ms must be greater than 0".to_string());
        }

        if self.maps.is_empty() {
            return Err("At least one map must be configured".to_string());
        }
        for (index, map) in self.maps.iter().enumerate() {
            let duplicate = self.maps[..index]
                .iter()
                .any(|other| other.id == map.id && other.instance_id == map.instance_id);
            if duplicate {
                return Err(format!("Map {} instance {} is configured twice", map.id, map.instance_id));
            }
        }

        if !(self.population.spread.is_finite() && self.population.spread > 0.0) {
            return Err("population.spread must be a positive number of yards".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.replication
            .validate()
            .map_err(|err| format!("Invalid replication settings: {err}"))
    }
}
