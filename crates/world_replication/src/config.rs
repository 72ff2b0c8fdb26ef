//! Replication Configuration Management
//!
//! Configuration structures for the replication core: sight ranges, spatial
//! grid sizing and packet assembly. Every section has serde defaults so a
//! partial TOML table is enough to override a single value.

use crate::types::MapKind;
use serde::{Deserialize, Serialize};

/// Length of one side of a map grid in yards.
pub const SIZE_OF_GRIDS: f32 = 533.333_3;
/// Number of cells along one side of a grid.
pub const MAX_NUMBER_OF_CELLS: u32 = 8;
/// Number of grids along one side of a map.
pub const MAX_NUMBER_OF_GRIDS: u32 = 64;
/// Distance from the map centre to its edge.
pub const MAP_HALF_SIZE: f32 = SIZE_OF_GRIDS * MAX_NUMBER_OF_GRIDS as f32 / 2.0;
/// Default cell edge length.
pub const SIZE_OF_GRID_CELL: f32 = SIZE_OF_GRIDS / MAX_NUMBER_OF_CELLS as f32;

/// Upper bound for any sight range.
pub const MAX_VISIBILITY_DISTANCE: f32 = SIZE_OF_GRIDS;
pub const DEFAULT_VISIBILITY_DISTANCE: f32 = 90.0;
pub const DEFAULT_VISIBILITY_INSTANCE: f32 = 170.0;
pub const DEFAULT_VISIBILITY_BG_ARENAS: f32 = 533.0;
/// Sight range of units that are neither players nor creatures with their own sight distance.
pub const SIGHT_RANGE_UNIT: f32 = 50.0;
/// Cap on the stealth detection radius of player observers.
pub const MAX_PLAYER_STEALTH_DETECT_RANGE: f32 = 30.0;

/// Complete replication configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Sight-range and detection tuning
    #[serde(default)]
    pub visibility: VisibilityConfig,
    /// Spatial grid sizing
    #[serde(default)]
    pub grid: GridConfig,
    /// Packet assembly
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Which alive players see a ghost whose ghost-visibility mask they do not
/// share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostSightMode {
    /// Every alive player of the ghost's team
    #[default]
    Team,
    /// Only alive players grouped with the ghost
    Group,
}

/// Sight ranges per map kind and detection limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Sight range on open-world continents
    pub continent_range: f32,
    /// Sight range inside dungeon and raid instances
    pub instance_range: f32,
    /// Sight range inside battlegrounds and arenas
    pub battleground_range: f32,
    /// Sight range granted towards "far visible" objects
    pub max_visibility_distance: f32,
    /// Sight range of non-player units without a configured sight distance
    pub unit_sight_range: f32,
    /// Sight range while the observer plays a cinematic
    pub cinematic_sight_range: f32,
    /// Cap on the stealth detection radius of players
    pub max_player_stealth_detect_range: f32,
    /// Require line of sight in addition to range when gating by distance
    pub line_of_sight_checks: bool,
    /// Who may see ghosts across the ghost-visibility mask
    pub ghost_sight: GhostSightMode,
}

impl VisibilityConfig {
    /// Default sight range of a map of the given kind.
    pub fn range_for(&self, kind: MapKind) -> f32 {
        match kind {
            MapKind::Continent => self.continent_range,
            MapKind::Instance => self.instance_range,
            MapKind::Battleground => self.battleground_range,
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            continent_range: DEFAULT_VISIBILITY_DISTANCE,
            instance_range: DEFAULT_VISIBILITY_INSTANCE,
            battleground_range: DEFAULT_VISIBILITY_BG_ARENAS,
            max_visibility_distance: MAX_VISIBILITY_DISTANCE,
            unit_sight_range: SIGHT_RANGE_UNIT,
            cinematic_sight_range: DEFAULT_VISIBILITY_INSTANCE,
            max_player_stealth_detect_range: MAX_PLAYER_STEALTH_DETECT_RANGE,
            line_of_sight_checks: false,
            ghost_sight: GhostSightMode::Team,
        }
    }
}

/// Spatial grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of one cell in yards
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: SIZE_OF_GRID_CELL }
    }
}

/// Packet assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Compress update packets whose body exceeds the threshold
    pub enable_compression: bool,
    /// Body size in bytes above which packets are compressed
    pub compression_threshold: usize,
    /// Maximum number of blocks in one update packet before it is split
    pub max_blocks_per_packet: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enable_compression: true,
            compression_threshold: 1024,
            max_blocks_per_packet: 512,
        }
    }
}

impl ReplicationConfig {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let v = &self.visibility;
        for (name, value) in [
            ("continent_range", v.continent_range),
            ("instance_range", v.instance_range),
            ("battleground_range", v.battleground_range),
            ("unit_sight_range", v.unit_sight_range),
            ("cinematic_sight_range", v.cinematic_sight_range),
        ] {
            if !(value > 0.0) {
                return Err(ConfigValidationError::InvalidValue(format!("visibility.{name} must be > 0.0")));
            }
            if value > v.max_visibility_distance {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "visibility.{name} cannot exceed max_visibility_distance ({})",
                    v.max_visibility_distance
                )));
            }
        }

        if v.max_player_stealth_detect_range < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "visibility.max_player_stealth_detect_range must be >= 0.0".to_string(),
            ));
        }

        if !(self.grid.cell_size > 0.0) {
            return Err(ConfigValidationError::InvalidValue("grid.cell_size must be > 0.0".to_string()));
        }

        if self.network.max_blocks_per_packet == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "network.max_blocks_per_packet must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration builder for easier setup
#[derive(Debug, Default)]
pub struct ReplicationConfigBuilder {
    config: ReplicationConfig,
}

impl ReplicationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the continent sight range
    pub fn with_continent_range(mut self, range: f32) -> Self {
        self.config.visibility.continent_range = range;
        self
    }

    /// Sets the grid cell size
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.config.grid.cell_size = cell_size;
        self
    }

    /// Enables or disables line-of-sight gating
    pub fn with_line_of_sight(mut self, enabled: bool) -> Self {
        self.config.visibility.line_of_sight_checks = enabled;
        self
    }

    pub fn with_ghost_sight(mut self, mode: GhostSightMode) -> Self {
        self.config.visibility.ghost_sight = mode;
        self
    }

    /// Sets packet compression behaviour
    pub fn with_compression(mut self, enabled: bool, threshold: usize) -> Self {
        self.config.network.enable_compression = enabled;
        self.config.network.compression_threshold = threshold;
        self
    }

    /// Builds and validates the configuration
    pub fn build(self) -> Result<ReplicationConfig, ConfigValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.visibility.continent_range, 90.0);
        assert_eq!(config.visibility.max_player_stealth_detect_range, 30.0);
    }

    #[test]
    fn builder_rejects_zero_cell_size() {
        let result = ReplicationConfigBuilder::new().with_cell_size(0.0).build();
        assert!(matches!(result, Err(ConfigValidationError::InvalidValue(_))));
    }

    #[test]
    fn range_above_maximum_is_rejected() {
        let mut config = ReplicationConfig::default();
        config.visibility.continent_range = 1000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ReplicationConfig = from_json(r#"{"visibility": {"continent_range": 120.0}}"#);
        assert_eq!(config.visibility.continent_range, 120.0);
        assert_eq!(config.visibility.instance_range, DEFAULT_VISIBILITY_INSTANCE);
        assert_eq!(config.grid, GridConfig::default());
        assert_eq!(config.visibility.ghost_sight, GhostSightMode::Team);

        let grouped: ReplicationConfig = from_json(r#"{"visibility": {"ghost_sight": "group"}}"#);
        assert_eq!(grouped.visibility.ghost_sight, GhostSightMode::Group);
    }

    fn from_json(text: &str) -> ReplicationConfig {
        serde_json::from_str(text).expect("valid config json")
    }
}
