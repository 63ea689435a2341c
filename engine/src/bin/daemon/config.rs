//! Daemon configuration
//!
//! Read from environment variables with sensible defaults. `SW_CONFIG_FILE` may
//! point at a YAML file carrying the same settings; environment variables win.

use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sw_engine::constants::monitor::DEFAULT_INTERVAL_SECS;
use sw_engine::infrastructure::ControllerKind;
use sw_engine::{DEFAULT_LISTEN_ADDR, DEFAULT_WATCHLIST_FILE};

// Default configuration values
const DEFAULT_EVENT_LOG_DIR: &str = "logs";
const DEFAULT_ENABLE_EVENT_LOG: bool = true;
const DEFAULT_CONTROLLER: &str = "auto";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// HTTP listen address
    pub listen_addr: String,

    /// Watchlist persistence file
    pub watchlist_file: PathBuf,

    /// Directory of the rotated event journal
    pub event_log_dir: PathBuf,

    pub enable_event_log: bool,

    /// Seconds between monitor ticks
    pub monitor_interval_secs: u64,

    /// `auto`, `systemd` or `windows`
    pub controller: String,

    /// Optional YAML config file
    pub config_file: Option<PathBuf>,

    pub log_level: String,
}

/// Keys accepted in the YAML config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    listen_addr: Option<String>,
    watchlist_file: Option<PathBuf>,
    event_log_dir: Option<PathBuf>,
    enable_event_log: Option<bool>,
    monitor_interval_secs: Option<u64>,
    controller: Option<String>,
    log_level: Option<String>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config file {}: {}", path.display(), e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Invalid config file {}: {}", path.display(), e))
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables, layered over the config file if one is named
    pub fn from_env() -> Result<Self, String> {
        let config_file = env::var("SW_CONFIG_FILE").ok().map(PathBuf::from);
        let file = match &config_file {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        Ok(Self {
            listen_addr: env::var("SW_LISTEN_ADDR")
                .ok()
                .or(file.listen_addr)
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            watchlist_file: env::var("SW_WATCHLIST_FILE")
                .ok()
                .map(PathBuf::from)
                .or(file.watchlist_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WATCHLIST_FILE)),
            event_log_dir: env::var("SW_EVENT_LOG_DIR")
                .ok()
                .map(PathBuf::from)
                .or(file.event_log_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_LOG_DIR)),
            enable_event_log: Self::parse_bool("SW_ENABLE_EVENT_LOG")
                .or(file.enable_event_log)
                .unwrap_or(DEFAULT_ENABLE_EVENT_LOG),
            monitor_interval_secs: Self::parse_u64("SW_MONITOR_INTERVAL_SECS")
                .or(file.monitor_interval_secs)
                .unwrap_or(DEFAULT_INTERVAL_SECS),
            controller: env::var("SW_CONTROLLER")
                .ok()
                .or(file.controller)
                .unwrap_or_else(|| DEFAULT_CONTROLLER.to_string()),
            log_level: Self::parse_log_level()
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            config_file,
        })
    }

    fn parse_u64(var_name: &str) -> Option<u64> {
        env::var(var_name).ok().and_then(|s| s.trim().parse().ok())
    }

    fn parse_bool(var_name: &str) -> Option<bool> {
        env::var(var_name)
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            })
    }

    fn parse_log_level() -> Option<String> {
        // Priority: SW_LOG_LEVEL > RUST_LOG
        env::var("SW_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .ok()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.listen_addr
            .parse()
            .map_err(|e| format!("Invalid listen address '{}': {}", self.listen_addr, e))
    }

    pub fn controller_kind(&self) -> Result<ControllerKind, String> {
        self.controller.parse().map_err(|e| format!("{e}"))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.monitor_interval_secs == 0 {
            return Err("SW_MONITOR_INTERVAL_SECS must be greater than zero".to_string());
        }
        self.socket_addr()?;
        self.controller_kind()?;
        Ok(())
    }
}
