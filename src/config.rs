//! Configuration management for herakles-apps-aggregator.
//!
//! This module handles loading and validating configuration files. It
//! supports YAML, JSON, and TOML formats; command-line overrides are applied
//! on top by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregator::Features;
use crate::process::DEFAULT_MANAGERS;
use crate::targets::load_apps_groups;

// Default configuration constants
pub const DEFAULT_UPDATE_EVERY: u64 = 1;
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const MAX_UPDATE_EVERY: u64 = 3600;

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between collection cycles
    #[serde(alias = "update-every")]
    pub update_every: Option<u64>,

    /// Rules file replacing the built-in application groups
    #[serde(alias = "apps-groups-file")]
    pub apps_groups_file: Option<PathBuf>,

    /// Process-manager command names; `*` and `?` make a name a glob
    pub managers: Option<Vec<String>>,

    /// Count open descriptors per target
    #[serde(alias = "enable-file-charts")]
    pub enable_file_charts: Option<bool>,

    /// Record the pids folded into every target
    #[serde(alias = "debug-membership")]
    pub debug_membership: Option<bool>,

    /// Keep an exited child for one cycle while its parent is alive
    #[serde(alias = "keep-exited-children")]
    pub keep_exited_children: Option<bool>,

    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,

    /// Read processes from a JSON snapshot instead of /proc
    #[serde(alias = "snapshot-file")]
    pub snapshot_file: Option<PathBuf>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_every: Some(DEFAULT_UPDATE_EVERY),
            apps_groups_file: None,
            managers: Some(DEFAULT_MANAGERS.iter().map(|s| s.to_string()).collect()),
            enable_file_charts: Some(false),
            debug_membership: Some(false),
            keep_exited_children: Some(true),
            max_processes: None,
            snapshot_file: None,
            log_level: Some("info".into()),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
        }
    }
}

impl Config {
    pub fn update_every(&self) -> u64 {
        self.update_every.unwrap_or(DEFAULT_UPDATE_EVERY)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn features(&self) -> Features {
        Features {
            descriptor_accounting: self.enable_file_charts.unwrap_or(false),
            membership_tracking: self.debug_membership.unwrap_or(false),
        }
    }

    pub fn keep_exited_children(&self) -> bool {
        self.keep_exited_children.unwrap_or(true)
    }

    /// Configured manager names, or the built-in list when unset.
    pub fn manager_names(&self) -> Vec<&str> {
        match self.managers.as_ref() {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => DEFAULT_MANAGERS.to_vec(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let update_every = cfg.update_every();
    if update_every == 0 || update_every > MAX_UPDATE_EVERY {
        return Err(format!(
            "update_every must be between 1 and {} seconds, got {}",
            MAX_UPDATE_EVERY, update_every
        )
        .into());
    }

    if cfg.max_processes == Some(0) {
        return Err("max_processes must be greater than 0 when set".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(format!(
                    "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                    other
                )
                .into());
            }
        }
    }

    if let Some(path) = cfg.snapshot_file.as_deref() {
        if !path.exists() {
            return Err(format!("Snapshot file not found: {}", path.display()).into());
        }
    }

    // Rules must load and build, otherwise every cycle would fall back to trees
    let rules = load_apps_groups(cfg.apps_groups_file.as_deref())?;
    rules.build_registry()?;

    if cfg.snapshot_file.is_none() {
        let proc_root = cfg.proc_root();
        if !proc_root.is_dir() {
            return Err(format!("proc_root is not a directory: {}", proc_root.display()).into());
        }
    }

    Ok(())
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/apps-aggregator.yaml",
                "/etc/herakles/apps-aggregator.yml",
                "/etc/herakles/apps-aggregator.json",
                "/etc/herakles/apps-aggregator.toml",
                "./herakles-apps-aggregator.yaml",
                "./herakles-apps-aggregator.yml",
                "./herakles-apps-aggregator.json",
                "./herakles-apps-aggregator.toml",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
