//! Command-line interface handling for the accolade service.
//!
//! Flags given here override the matching configuration file settings.

use crate::config::CacheBackendKind;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "accolade.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the cache backend
    pub cache_backend: Option<CacheBackendKind>,
    /// Optional override for the Redis URL
    pub redis_url: Option<String>,
    /// Emit a beta enrollment for this user after startup
    pub simulate_user: Option<String>,
}

impl CliArgs {
    /// The clap command definition.
    pub fn command() -> Command {
        Command::new("accolade")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Achievement unlock engine service")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value(DEFAULT_CONFIG_PATH),
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
                Arg::new("cache-backend")
                    .long("cache-backend")
                    .value_name("BACKEND")
                    .help("Cache backend (memory, redis)")
                    .value_parser(["memory", "redis"]),
            )
            .arg(
                Arg::new("redis-url")
                    .long("redis-url")
                    .value_name("URL")
                    .help("Redis URL (e.g., redis://127.0.0.1:6379)"),
            )
            .arg(
                Arg::new("simulate-user")
                    .long("simulate-user")
                    .value_name("USER_ID")
                    .help("Emit a beta enrollment for USER_ID after startup and log the result"),
            )
    }

    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_CONFIG_PATH),
            ),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            cache_backend: matches
                .get_one::<String>("cache-backend")
                .and_then(|backend| backend.parse().ok()),
            redis_url: matches.get_one::<String>("redis-url").cloned(),
            simulate_user: matches.get_one::<String>("simulate-user").cloned(),
        }
    }
}
