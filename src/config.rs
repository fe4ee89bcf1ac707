use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

// -----------------------------------------------------------------------------
// Config (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Overrides the default progress database location
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Overrides the default thumbnail cache directory
    #[serde(default)]
    pub thumbnail_cache_dir: Option<PathBuf>,
}

impl Config {
    /// Load a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_json::from_str(&contents)?)
    }
}

// -----------------------------------------------------------------------------
// EngineConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub velocity: VelocityConfig,
}

// -----------------------------------------------------------------------------
// CacheConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries kept behind the current index
    #[serde(default = "default_lagging_margin")]
    pub lagging_margin: usize,
    /// Entries loaded ahead of the current index
    #[serde(default = "default_leading_margin")]
    pub leading_margin: usize,
    #[serde(default = "default_target_edge")]
    pub target_width: u32,
    #[serde(default = "default_target_edge")]
    pub target_height: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lagging_margin: default_lagging_margin(),
            leading_margin: default_leading_margin(),
            target_width: default_target_edge(),
            target_height: default_target_edge(),
        }
    }
}

fn default_lagging_margin() -> usize {
    2
}

fn default_leading_margin() -> usize {
    5
}

fn default_target_edge() -> u32 {
    800
}

// -----------------------------------------------------------------------------
// VelocityConfig
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Decisions closer together than this extend the streak
    #[serde(default = "default_fire_gap_ms")]
    pub fire_gap_ms: u64,
    #[serde(default = "default_streak_required")]
    pub streak_required: u32,
    /// Length of the decisions-per-minute window
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Ascending deletion-count thresholds
    #[serde(default = "default_deletion_milestones")]
    pub deletion_milestones: Vec<u64>,
    /// Ascending storage thresholds in MB
    #[serde(default = "default_storage_milestones_mb")]
    pub storage_milestones_mb: Vec<u64>,
    #[serde(default)]
    pub size_estimate: SizeEstimate,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            fire_gap_ms: default_fire_gap_ms(),
            streak_required: default_streak_required(),
            rate_window_secs: default_rate_window_secs(),
            deletion_milestones: default_deletion_milestones(),
            storage_milestones_mb: default_storage_milestones_mb(),
            size_estimate: SizeEstimate::default(),
        }
    }
}

/// How the storage-freed counter sizes a deleted item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeEstimate {
    /// The size recorded on the media item
    #[default]
    Recorded,
    /// A random 2-5 MB per item
    Random,
}

fn default_fire_gap_ms() -> u64 {
    800
}

fn default_streak_required() -> u32 {
    3
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_deletion_milestones() -> Vec<u64> {
    vec![10, 25, 50, 100, 200, 500, 1000]
}

fn default_storage_milestones_mb() -> Vec<u64> {
    vec![50, 100, 250, 500, 1000]
}
