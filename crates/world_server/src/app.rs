//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that owns the simulated
//! world, drives its tick loop and reports on it until shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{spawn_merciless_shutdown, wait_for_shutdown_signal},
    simulation::{Simulation, SimulationSummary},
};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};
use world_replication::replication::ReplicationStats;

/// Bytes per reporting period above which the report flags high traffic.
const HIGH_TRAFFIC_BYTES: u64 = 50 * 1024 * 1024;

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: configuration file merged with CLI overrides
/// * **Simulation**: the world, its maps and the simulated population
/// * **Health Monitoring**: periodic replication statistics
/// * **Graceful Shutdown**: stops after the current tick and reports a summary
pub struct Application {
    config: AppConfig,
    simulation: Simulation,
    max_ticks: Option<u64>,
}

/// Applies command line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(tick_interval_ms) = args.tick_interval_ms {
        config.server.tick_interval_ms = tick_interval_ms;
    }
}

impl Application {
    /// Validates the configuration and builds the world.
    pub fn new(config: AppConfig, max_ticks: Option<u64>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration validated successfully");

        display_banner(&config.server.name);
        let simulation = Simulation::new(&config)?;
        Ok(Self {
            config,
            simulation,
            max_ticks,
        })
    }

    /// Runs the tick loop until a shutdown signal arrives or the tick budget
    /// is spent, then returns the run summary.
    pub async fn run(mut self) -> Result<SimulationSummary, Box<dyn std::error::Error>> {
        info!("🌟 Starting world simulation");
        self.log_configuration_summary();

        let mut ticker = interval(Duration::from_millis(self.config.server.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reporter = (self.config.server.stats_interval_secs > 0).then(|| {
            let period = Duration::from_secs(self.config.server.stats_interval_secs);
            interval_at(Instant::now() + period, period)
        });
        let mut last_report = ReplicationStats::default();

        let mut shutdown: Pin<Box<dyn Future<Output = Result<(), Box<dyn std::error::Error>>>>> =
            match self.max_ticks {
                Some(_) => Box::pin(std::future::pending()),
                None => Box::pin(wait_for_shutdown_signal()),
            };

        if let Some(max_ticks) = self.max_ticks {
            info!("⏱️ Running {} ticks", max_ticks);
        } else {
            info!("🛑 Press Ctrl+C to gracefully shutdown");
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.simulation.tick();
                    if self.max_ticks.is_some_and(|max| self.simulation.ticks() >= max) {
                        break;
                    }
                }
                _ = next_report(&mut reporter) => {
                    let current = self.simulation.world().stats();
                    self.log_health(&last_report, &current);
                    last_report = current;
                }
                result = &mut shutdown => {
                    result?;
                    spawn_merciless_shutdown();
                    info!("🛑 Shutdown signal received, stopping after tick {}", self.simulation.ticks());
                    break;
                }
            }
        }

        let summary = self.simulation.summary();
        log_final_statistics(&summary);
        info!("✅ World server shutdown complete");
        Ok(summary)
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Tick interval: {}ms", self.config.server.tick_interval_ms);
        for map in &self.config.maps {
            info!("  🗺️ Map {} instance {} ({:?})", map.id, map.instance_id, map.kind);
        }
        info!(
            "  👥 Population per map: {} players, {} creatures, {} game objects",
            self.config.population.players_per_map,
            self.config.population.creatures_per_map,
            self.config.population.game_objects_per_map
        );
        info!(
            "  👁️ Sight ranges: continent {}yd, instance {}yd, battleground {}yd",
            self.config.replication.visibility.continent_range,
            self.config.replication.visibility.instance_range,
            self.config.replication.visibility.battleground_range
        );
    }

    fn log_health(&self, previous: &ReplicationStats, current: &ReplicationStats) {
        let bytes = current.bytes_sent - previous.bytes_sent;
        info!(
            "📊 World Health - {} ticks | {} objects | {} creates, {} values, {} destroys | {} packets, {} bytes",
            current.ticks - previous.ticks,
            self.simulation.world().object_count(),
            current.create_blocks - previous.create_blocks,
            current.values_blocks - previous.values_blocks,
            current.destroy_blocks - previous.destroy_blocks,
            current.packets_sent - previous.packets_sent,
            bytes
        );
        if bytes > HIGH_TRAFFIC_BYTES {
            warn!("🔥 High replication traffic - {} bytes this period", bytes);
        }
    }
}

async fn next_report(reporter: &mut Option<Interval>) {
    match reporter {
        Some(reporter) => {
            reporter.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_final_statistics(summary: &SimulationSummary) {
    info!("📊 Final Statistics:");
    info!("  - Ticks: {}", summary.ticks);
    info!("  - Objects in world: {}", summary.objects);
    info!(
        "  - Blocks: {} creates, {} values, {} destroys",
        summary.replication.create_blocks, summary.replication.values_blocks, summary.replication.destroy_blocks
    );
    info!(
        "  - Packets drained: {} ({} bytes, {} compressed)",
        summary.packets_drained, summary.bytes_drained, summary.replication.compressed_packets
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PopulationSettings;
    use std::path::PathBuf;

    fn quick_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.tick_interval_ms = 1;
        config.server.stats_interval_secs = 0;
        config.population = PopulationSettings {
            players_per_map: 2,
            creatures_per_map: 4,
            game_objects_per_map: 1,
            spread: 40.0,
            seed: 1,
        };
        config
    }

    #[tokio::test]
    async fn run_stops_after_the_tick_budget() {
        let app = Application::new(quick_config(), Some(5)).unwrap();
        let summary = app.run().await.unwrap();
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.maps, 2);
        assert_eq!(summary.objects, 14);
        assert_eq!(summary.replication.ticks, 10);
        assert!(summary.packets_drained > 0);
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let mut config = quick_config();
        config.maps.clear();
        assert!(Application::new(config, Some(1)).is_err());
    }

    #[test]
    fn cli_overrides_win_over_the_file() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            config_path: PathBuf::from("unused.toml"),
            log_level: Some("trace".to_string()),
            json_logs: true,
            tick_interval_ms: Some(25),
            max_ticks: None,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
        assert_eq!(config.server.tick_interval_ms, 25);
    }
}
