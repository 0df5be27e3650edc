//! Session configuration
//!
//! TOML-backed limits, viewport geometry, worker and pipeline timing. Every
//! field has a default so an empty document is a valid configuration.

use crate::mode::Mode;
use crate::registry::CapacityLimits;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub notices: NoticeConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed or
    /// a value fails [`SessionConfig::validate`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: SessionConfig =
            toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.limits.max_files > 0, "limits.max_files must be positive");
        ensure!(
            self.limits.max_file_bytes <= self.limits.max_total_bytes,
            "limits.max_file_bytes ({}) exceeds limits.max_total_bytes ({})",
            self.limits.max_file_bytes,
            self.limits.max_total_bytes
        );
        ensure!(
            self.viewport.item_width > 0.0 && self.viewport.item_height > 0.0,
            "viewport item size must be positive"
        );
        ensure!(self.snapshots.capacity > 0, "snapshots.capacity must be positive");
        ensure!(self.pipeline.yield_every > 0, "pipeline.yield_every must be positive");
        Ok(())
    }

    pub fn capacity_limits(&self) -> CapacityLimits {
        CapacityLimits {
            max_files: self.limits.max_files,
            max_total_bytes: self.limits.max_total_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Files held at once (default: 200)
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Total payload budget (default: 500 MiB)
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,
    /// Per-file ceiling (default: 20 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_total_bytes: default_max_total_bytes(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_files() -> usize {
    200
}

fn default_max_total_bytes() -> u64 {
    500 * MIB
}

fn default_max_file_bytes() -> u64 {
    20 * MIB
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Virtualize above this many files
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_buffer_rows")]
    pub buffer_rows: usize,
    #[serde(default = "default_item_size")]
    pub item_width: f64,
    #[serde(default = "default_item_size")]
    pub item_height: f64,
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            buffer_rows: default_buffer_rows(),
            item_width: default_item_size(),
            item_height: default_item_size(),
            scroll_throttle_ms: default_scroll_throttle_ms(),
        }
    }
}

fn default_threshold() -> usize {
    50
}

fn default_buffer_rows() -> usize {
    5
}

/// 140px tile plus 15px gap
fn default_item_size() -> f64 {
    155.0
}

fn default_scroll_throttle_ms() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_capacity")]
    pub capacity: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            capacity: default_snapshot_capacity(),
        }
    }
}

fn default_snapshot_capacity() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_timeout_ms")]
    pub timeout_ms: u64,
    /// Smaller payloads are processed inline
    #[serde(default = "default_offload_min_bytes")]
    pub offload_min_bytes: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_worker_timeout_ms(),
            offload_min_bytes: default_offload_min_bytes(),
        }
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_worker_timeout_ms() -> u64 {
    30_000
}

fn default_offload_min_bytes() -> u64 {
    MIB
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Yield to the host after this many items
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
    #[serde(default)]
    pub timeouts: ModeTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            yield_every: default_yield_every(),
            timeouts: ModeTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Overall deadline for a run; `None` for modes without one
    pub fn timeout_for(&self, mode: Mode) -> Option<Duration> {
        let t = &self.timeouts;
        let secs = match mode {
            Mode::Pdf => t.pdf,
            Mode::Jpeg => t.jpeg,
            Mode::Merge => t.merge,
            Mode::Compress => t.compress,
            Mode::Rotate => t.rotate,
            Mode::Filter => t.filter,
            Mode::Split => t.split,
            Mode::Convert => t.convert,
            Mode::Ocr => t.ocr,
            Mode::Delete | Mode::Editor => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

fn default_yield_every() -> usize {
    3
}

/// Per-mode deadlines in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTimeouts {
    #[serde(default = "default_short_timeout")]
    pub pdf: u64,
    #[serde(default = "default_short_timeout")]
    pub jpeg: u64,
    #[serde(default = "default_short_timeout")]
    pub merge: u64,
    #[serde(default = "default_short_timeout")]
    pub compress: u64,
    #[serde(default = "default_short_timeout")]
    pub rotate: u64,
    #[serde(default = "default_long_timeout")]
    pub filter: u64,
    #[serde(default = "default_long_timeout")]
    pub split: u64,
    #[serde(default = "default_long_timeout")]
    pub convert: u64,
    #[serde(default = "default_ocr_timeout")]
    pub ocr: u64,
}

impl Default for ModeTimeouts {
    fn default() -> Self {
        Self {
            pdf: default_short_timeout(),
            jpeg: default_short_timeout(),
            merge: default_short_timeout(),
            compress: default_short_timeout(),
            rotate: default_short_timeout(),
            filter: default_long_timeout(),
            split: default_long_timeout(),
            convert: default_long_timeout(),
            ocr: default_ocr_timeout(),
        }
    }
}

fn default_short_timeout() -> u64 {
    120
}

fn default_long_timeout() -> u64 {
    180
}

fn default_ocr_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeConfig {
    /// Auto-dismiss delay per notice
    #[serde(default = "default_display_ms")]
    pub display_ms: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            display_ms: default_display_ms(),
        }
    }
}

fn default_display_ms() -> u64 {
    4_000
}
