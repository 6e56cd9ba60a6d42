//! CLI arguments and subcommands for herakles-apps-aggregator.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands, and merges them over the
//! configuration file.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use herakles_apps_aggregator::config::{load_config, Config, ConfigFormat};

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-apps-aggregator",
    about = "Per-application process metrics aggregation",
    long_about = "Per-application process metrics aggregation.\n\n\
                  Classifies every process on the host into application groups, users and \
                  groups, and sums their CPU, memory, I/O and descriptor usage per group on \
                  every collection interval.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides log_level from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Read processes from a JSON snapshot instead of /proc
    #[arg(short = 's', long)]
    pub snapshot_file: Option<PathBuf>,

    /// Application groups rules file (replaces the built-in groups)
    #[arg(short = 'g', long)]
    pub apps_groups: Option<PathBuf>,

    /// Count open file descriptors per target
    #[arg(long)]
    pub enable_file_charts: bool,

    /// Track which pids were aggregated into each target
    #[arg(long)]
    pub debug_membership: bool,

    /// Seconds between collection cycles
    #[arg(short = 'u', long)]
    pub update_every: Option<u64>,

    /// Maximum number of processes to scan
    #[arg(long)]
    pub max_processes: Option<usize>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run collection cycles on the configured interval until interrupted
    Run {
        /// Stop after this many cycles
        #[arg(short = 'n', long)]
        cycles: Option<u64>,

        /// Print the cycle statistics table on exit
        #[arg(long)]
        stats: bool,
    },

    /// Run a few cycles and print the resulting targets
    Test {
        /// Number of cycles
        #[arg(short = 'n', long, default_value_t = 2)]
        iterations: usize,

        /// Also print user and group targets
        #[arg(long)]
        verbose: bool,

        /// Include targets that aggregated nothing
        #[arg(long)]
        all: bool,
    },

    /// List configured application groups
    Groups {
        /// Show every match rule
        #[arg(long)]
        verbose: bool,

        /// Filter by group name
        #[arg(short = 'f', long)]
        filter: Option<String>,
    },

    /// Validate configuration, rules and /proc access
    Check {
        /// Also take one snapshot from /proc
        #[arg(long)]
        proc: bool,
    },

    /// Generate a synthetic snapshot JSON file
    GenerateSnapshot {
        /// Output file path
        #[arg(short = 'o', long, default_value = "snapshot.json")]
        output: PathBuf,

        /// Number of processes per application group
        #[arg(long, default_value_t = 3)]
        per_group: usize,

        /// Number of processes matching no group
        #[arg(long, default_value_t = 10)]
        others: usize,

        /// Children spawned under each generated process
        #[arg(long, default_value_t = 1)]
        children: usize,
    },
}

impl LogLevel {
    /// Parses a level name as written in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(path) = &args.snapshot_file {
        config.snapshot_file = Some(path.clone());
    }
    if let Some(path) = &args.apps_groups {
        config.apps_groups_file = Some(path.clone());
    }

    // Feature flags only switch on from the CLI
    if args.enable_file_charts {
        config.enable_file_charts = Some(true);
    }
    if args.debug_membership {
        config.debug_membership = Some(true);
    }

    if let Some(secs) = args.update_every {
        config.update_every = Some(secs);
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_ascii_lowercase());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from([
            "herakles-apps-aggregator",
            "--no-config",
            "--enable-file-charts",
            "--update-every",
            "10",
            "--log-level",
            "debug",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.update_every(), 10);
        assert!(config.features().descriptor_accounting);
        assert!(!config.features().membership_tracking);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = Args::parse_from(["herakles-apps-aggregator", "test", "-n", "3", "--verbose"]);
        match args.command {
            Some(Commands::Test {
                iterations, verbose, ..
            }) => {
                assert_eq!(iterations, 3);
                assert!(verbose);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::from_name("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_name("loud"), None);
    }
}
