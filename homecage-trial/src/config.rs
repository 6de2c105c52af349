use homecage_core::{LayoutConfig, LayoutError, StimulusSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::iti::ItiRange;
use crate::logger::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("accuracy threshold must be within [0, 1], got {0}")]
    Threshold(f64),
    #[error("tick rate must be at least 1 Hz")]
    TickRate,
    #[error("stimulus curriculum is empty")]
    NoStimuli,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Inter-trial interval ranges in milliseconds. Outcome-specific bounds fall back to the base range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItiConfig {
    pub base_min_ms: i64,
    pub base_max_ms: i64,
    pub correct_min_ms: Option<i64>,
    pub correct_max_ms: Option<i64>,
    pub error_min_ms: Option<i64>,
    pub error_max_ms: Option<i64>,
}

impl Default for ItiConfig {
    fn default() -> Self {
        Self {
            base_min_ms: 1000,
            base_max_ms: 1000,
            correct_min_ms: None,
            correct_max_ms: None,
            error_min_ms: None,
            error_max_ms: None,
        }
    }
}

impl ItiConfig {
    /// Resolved `(correct, error)` ranges.
    pub fn ranges(&self) -> (ItiRange, ItiRange) {
        let base_min = self.base_min_ms.max(0);
        let base_max = self.base_max_ms.max(base_min);
        let range = |min: Option<i64>, max: Option<i64>| {
            let min = min.unwrap_or(base_min).max(0) as u64;
            let max = max.unwrap_or(base_max).max(0) as u64;
            ItiRange::new(min, max)
        };
        (
            range(self.correct_min_ms, self.correct_max_ms),
            range(self.error_min_ms, self.error_max_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Continuous release required after a touch during the ITI; 0 disables the requirement.
    pub min_release_after_iti_touch_ms: u64,
    /// Held contacts are force-cleared after this long in WAIT_RELEASE.
    pub wait_release_timeout_ms: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            min_release_after_iti_touch_ms: 2000,
            wait_release_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub sliding_n: usize,
    /// Advance when window accuracy is strictly greater than this.
    pub acc_threshold: f64,
    pub correction_mode: bool,
    pub exclude_correction_from_acc: bool,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            sliding_n: 20,
            acc_threshold: 0.8,
            correction_mode: false,
            exclude_correction_from_acc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub out_dir: PathBuf,
    pub format: LogFormat,
    pub flush_every: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("logs"),
            format: LogFormat::Csv,
            flush_every: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick_hz: u32,
    pub max_events_per_tick: usize,
    pub input_queue_capacity: usize,
    pub stop_file: PathBuf,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_hz: 240,
            max_events_per_tick: 256,
            input_queue_capacity: 1024,
            stop_file: PathBuf::from("STOP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    pub layout: LayoutConfig,
    pub hit_margin_px: u32,
    pub max_outside_before_fail: u32,
    pub iti: ItiConfig,
    pub release: ReleaseConfig,
    pub progression: ProgressionConfig,
    pub stimuli: StimulusSource,
    pub log: LogConfig,
    pub run: LoopConfig,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            hit_margin_px: 0,
            max_outside_before_fail: 5,
            iti: ItiConfig::default(),
            release: ReleaseConfig::default(),
            progression: ProgressionConfig::default(),
            stimuli: StimulusSource::default(),
            log: LogConfig::default(),
            run: LoopConfig::default(),
        }
    }
}

impl TrialConfig {
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Clamps soft limits and rejects values the run cannot start with.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        homecage_core::GeometryLayout::new(self.layout.clone())?;

        let (correct, error) = self.iti.ranges();
        for (kind, min, max, resolved) in [
            ("correct", self.iti.correct_min_ms, self.iti.correct_max_ms, correct),
            ("error", self.iti.error_min_ms, self.iti.error_max_ms, error),
        ] {
            let requested_max = max.unwrap_or(self.iti.base_max_ms);
            if requested_max < min.unwrap_or(self.iti.base_min_ms) {
                warn!(kind, requested_max, applied_max = resolved.max_ms, "ITI max raised to min");
            }
        }
        self.iti.correct_min_ms = Some(correct.min_ms as i64);
        self.iti.correct_max_ms = Some(correct.max_ms as i64);
        self.iti.error_min_ms = Some(error.min_ms as i64);
        self.iti.error_max_ms = Some(error.max_ms as i64);

        if self.max_outside_before_fail == 0 {
            warn!("max outside touches raised to 1");
            self.max_outside_before_fail = 1;
        }
        if self.progression.sliding_n == 0 {
            warn!("sliding window size raised to 1");
            self.progression.sliding_n = 1;
        }
        let threshold = self.progression.acc_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Threshold(threshold));
        }
        if self.run.tick_hz == 0 {
            return Err(ConfigError::TickRate);
        }
        self.log.flush_every = self.log.flush_every.max(1);
        self.run.max_events_per_tick = self.run.max_events_per_tick.max(1);
        self.run.input_queue_capacity = self.run.input_queue_capacity.max(1);
        Ok(self)
    }
}
