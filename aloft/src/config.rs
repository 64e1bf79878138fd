//! TOML configuration loading plus `clap`-derived CLI overrides, matching
//! the config-path-plus-log-level override pattern used across this
//! codebase's deployable binaries.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub bottom_left: [f64; 2],
    pub top_right: [f64; 2],
    pub height_m: f64,
    pub resolution: [usize; 3],
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatcherKind {
    Queue,
    Table,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    Cli,
    Sqlite,
    Fifo,
}

fn default_batcher() -> BatcherKind {
    BatcherKind::Queue
}

fn default_exporter() -> ExporterKind {
    ExporterKind::Cli
}

/// Mirrors the environment knobs named in the external-interfaces contract
/// (`MAX_CLUSTER_DISTANCE`, `MAX_CLUSTER_AGE`, the batch window `tau`) plus
/// the grid and percentile parameters needed to construct a `Pipeline`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub percentile: f64,
    pub max_cluster_distance: f64,
    pub max_cluster_age: u64,
    pub batch_window_tau: f64,
    #[serde(default = "default_batcher")]
    pub batcher: BatcherKind,
    #[serde(default = "default_exporter")]
    pub exporter: ExporterKind,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }
}

/// Command-line flags for the `aloft` binary.
#[derive(Debug, Parser)]
#[command(
    name = "aloft",
    about = "Aerial multi-camera voxel-fusion detection and tracking pipeline"
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "aloft.toml")]
    pub config: PathBuf,

    /// Path to a file-backed batch queue (used when `batcher = "queue"`).
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Path to a file-backed or SQLite output (used by the `fifo`/`sqlite`
    /// exporters).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Overrides the `RUST_LOG`-style filter for this run.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_minimal_toml() {
        let toml_str = r#"
            percentile = 99.9
            max_cluster_distance = 1.5
            max_cluster_age = 3
            batch_window_tau = 0.2

            [grid]
            bottom_left = [0.0, 0.0]
            top_right = [10.0, 10.0]
            height_m = 10.0
            resolution = [10, 10, 10]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.grid.resolution, [10, 10, 10]);
        assert!(matches!(config.batcher, BatcherKind::Queue));
        assert!(matches!(config.exporter, ExporterKind::Cli));
    }

    #[test]
    fn config_respects_explicit_batcher_and_exporter() {
        let toml_str = r#"
            percentile = 99.9
            max_cluster_distance = 1.5
            max_cluster_age = 3
            batch_window_tau = 0.2
            batcher = "table"
            exporter = "sqlite"

            [grid]
            bottom_left = [0.0, 0.0]
            top_right = [10.0, 10.0]
            height_m = 10.0
            resolution = [10, 10, 10]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.batcher, BatcherKind::Table));
        assert!(matches!(config.exporter, ExporterKind::Sqlite));
    }
}
