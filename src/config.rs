//! Configuration management for herakles-process-explorer.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_process_explorer::process::DEFAULT_PROC_ROOT;
use herakles_process_explorer::{EngineOptions, SortKey, SortScope, SortSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Default configuration constants
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 2000;
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Enhanced configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Sampling
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "refresh-interval-ms")]
    pub refresh_interval_ms: Option<u64>,
    pub parallelism: Option<usize>,
    #[serde(alias = "resolve-devices")]
    pub resolve_devices: Option<bool>,
    #[serde(alias = "event-capacity")]
    pub event_capacity: Option<usize>,

    // Ordering
    #[serde(alias = "sort-key")]
    pub sort_key: Option<String>,
    #[serde(alias = "sort-ascending")]
    pub sort_ascending: Option<bool>,
    /// "root" | "global"
    #[serde(alias = "sort-scope")]
    pub sort_scope: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            refresh_interval_ms: Some(DEFAULT_REFRESH_INTERVAL_MS),
            parallelism: None,
            resolve_devices: Some(true),
            event_capacity: Some(DEFAULT_EVENT_CAPACITY),
            sort_key: None,
            sort_ascending: Some(true),
            sort_scope: Some("root".into()),
            log_level: Some("info".into()),
            loaded_from: None,
        }
    }
}

impl Config {
    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    /// Sort spec of a validated config.
    pub fn sort_spec(&self) -> Result<Option<SortSpec>, Box<dyn std::error::Error>> {
        let Some(key) = self.sort_key.as_deref() else {
            return Ok(None);
        };
        Ok(Some(SortSpec {
            key: key.parse::<SortKey>()?,
            ascending: self.sort_ascending.unwrap_or(true),
            scope: self.sort_scope()?,
        }))
    }

    pub fn sort_scope(&self) -> Result<SortScope, Box<dyn std::error::Error>> {
        match self.sort_scope.as_deref() {
            Some(scope) => Ok(scope.parse::<SortScope>()?),
            None => Ok(SortScope::Root),
        }
    }

    pub fn engine_options(&self) -> Result<EngineOptions, Box<dyn std::error::Error>> {
        Ok(EngineOptions {
            refresh_interval: Duration::from_millis(
                self.refresh_interval_ms
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_MS),
            ),
            event_capacity: self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
            sort_scope: self.sort_scope()?,
            initial_sort: self.sort_spec()?,
        })
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ms) = cfg.refresh_interval_ms {
        if ms < MIN_REFRESH_INTERVAL_MS {
            return Err(format!(
                "refresh_interval_ms must be at least {} (got {})",
                MIN_REFRESH_INTERVAL_MS, ms
            )
            .into());
        }
    }

    if cfg.event_capacity == Some(0) {
        return Err("event_capacity must be greater than 0".into());
    }

    if let Some(key) = cfg.sort_key.as_deref() {
        key.parse::<SortKey>()?;
    }

    if let Some(scope) = cfg.sort_scope.as_deref() {
        scope.parse::<SortScope>()?;
    }

    if let Some(level) = cfg.log_level.as_deref() {
        match level.to_ascii_lowercase().as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(format!(
                    "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                    other
                )
                .into());
            }
        }
    }

    Ok(())
}

fn log_level_name(level: &LogLevel) -> &'static str {
    match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
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

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(ms) = args.interval_ms {
        config.refresh_interval_ms = Some(ms);
    }
    if let Some(n) = args.parallelism {
        config.parallelism = Some(n);
    }
    if args.no_device_names {
        config.resolve_devices = Some(false);
    }

    // Sort overrides: CLI wins if provided
    if let Some(key) = &args.sort {
        config.sort_key = Some(key.clone());
    }
    if args.ascending {
        config.sort_ascending = Some(true);
    }
    if args.descending {
        config.sort_ascending = Some(false);
    }
    if args.sort_global {
        config.sort_scope = Some("global".into());
    }

    if let Some(level) = &args.log_level {
        config.log_level = Some(log_level_name(level).into());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/process-explorer.yaml",
                "/etc/herakles/process-explorer.yml",
                "/etc/herakles/process-explorer.json",
                "/etc/herakles/process-explorer.toml",
                "./herakles-process-explorer.yaml",
                "./herakles-process-explorer.yml",
                "./herakles-process-explorer.json",
                "./herakles-process-explorer.toml",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    let defaults = Config::default();

    // logging is not set up yet; main reports `loaded_from` once it is
    let mut loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    loaded.loaded_from = Some(path);

    Ok(merge_defaults(loaded, defaults))
}

/// Fills fields the file left unset with their defaults.
fn merge_defaults(file: Config, defaults: Config) -> Config {
    Config {
        proc_root: file.proc_root.or(defaults.proc_root),
        refresh_interval_ms: file.refresh_interval_ms.or(defaults.refresh_interval_ms),
        parallelism: file.parallelism.or(defaults.parallelism),
        resolve_devices: file.resolve_devices.or(defaults.resolve_devices),
        event_capacity: file.event_capacity.or(defaults.event_capacity),
        sort_key: file.sort_key.or(defaults.sort_key),
        sort_ascending: file.sort_ascending.or(defaults.sort_ascending),
        sort_scope: file.sort_scope.or(defaults.sort_scope),
        log_level: file.log_level.or(defaults.log_level),
        loaded_from: file.loaded_from,
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}
