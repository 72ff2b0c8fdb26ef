//! Command-line interface handling for the world server.
//!
//! Flags given here override the matching settings of the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the map tick interval
    pub tick_interval_ms: Option<u64>,
    /// Stop after this many ticks instead of waiting for a signal
    pub max_ticks: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments, exiting with a usage message on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            tick_interval_ms: matches.get_one::<u64>("tick-interval").copied(),
            max_ticks: matches.get_one::<u64>("ticks").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("World Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulated world server driving entity visibility and update replication")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tick-interval")
                .short('t')
                .long("tick-interval")
                .value_name("MS")
                .help("Map update interval in milliseconds")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("COUNT")
                .help("Run this many ticks, print the summary and exit")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let args = CliArgs::try_parse_from(["world_server"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.tick_interval_ms, None);
        assert_eq!(args.max_ticks, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let args = CliArgs::try_parse_from([
            "world_server",
            "--config",
            "realm.toml",
            "-l",
            "debug",
            "--json-logs",
            "--tick-interval",
            "100",
            "--ticks",
            "20",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("realm.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.tick_interval_ms, Some(100));
        assert_eq!(args.max_ticks, Some(20));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        assert!(CliArgs::try_parse_from(["world_server", "--tick-interval", "0"]).is_err());
    }
}
