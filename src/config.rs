//! Configuration management for analysis runs
//!
//! This module provides the immutable per-run configuration plus JSON file
//! loading, so thresholds can be tuned without recompilation. Every field
//! has a default; partial JSON files only override what they name.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Upper bound on requested clips
pub const MAX_CLIPS: usize = 50;

/// Default peak spacing: 80 STFT frames at hop 512 / 22.05 kHz, in seconds
pub const DEFAULT_SPACING_SECONDS: f64 = 80.0 * 512.0 / 22050.0;

/// Complete configuration for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of clips to select (K)
    pub clips_count: usize,
    /// Minimum clip length in seconds
    pub min_clip_length: f64,
    /// Maximum clip length in seconds (must exceed the minimum)
    pub max_clip_length: f64,
    /// Lead-in before each peak in seconds
    pub pre_roll: f64,
    /// Minimum separation between selected peaks in seconds
    pub spacing_seconds: f64,
    /// Minimum prominence for a local maximum to become a candidate
    pub prominence: f64,
    /// Half-width of the search window around each seed in seconds
    pub seed_window_seconds: f64,
    /// User-declared must-include moments in seconds
    pub seed_timestamps: Vec<f64>,
    /// Known audio duration; clips are clamped to it when present
    pub audio_duration: Option<f64>,
    /// Snap clip boundaries to the beat/bar grid
    pub align_to_beat: bool,
    /// Beat quantization thresholds
    pub quantizer: QuantizerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            clips_count: 6,
            min_clip_length: 15.0,
            max_clip_length: 30.0,
            pre_roll: 10.0,
            spacing_seconds: DEFAULT_SPACING_SECONDS,
            prominence: 0.1,
            seed_window_seconds: 20.0,
            seed_timestamps: Vec::new(),
            audio_duration: None,
            align_to_beat: false,
            quantizer: QuantizerConfig::default(),
        }
    }
}

/// Thresholds gating beat quantization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizerConfig {
    /// Grids below this confidence are never used
    pub min_confidence: f64,
    /// Largest backward start shift accepted, in seconds
    pub max_start_shift: f64,
    /// Smallest accepted quantized/original duration ratio (inclusive)
    pub min_duration_ratio: f64,
    /// Largest accepted quantized/original duration ratio (inclusive)
    pub max_duration_ratio: f64,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_start_shift: 10.0,
            min_duration_ratio: 0.5,
            max_duration_ratio: 2.0,
        }
    }
}

impl QuantizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidQuantizer {
                name: "min_confidence",
                reason: format!("must lie in [0, 1] (got {})", self.min_confidence),
            });
        }
        if !self.max_start_shift.is_finite() || self.max_start_shift < 0.0 {
            return Err(ConfigError::InvalidQuantizer {
                name: "max_start_shift",
                reason: format!("must be non-negative (got {})", self.max_start_shift),
            });
        }
        if !(self.min_duration_ratio > 0.0 && self.min_duration_ratio <= self.max_duration_ratio)
            || !self.max_duration_ratio.is_finite()
        {
            return Err(ConfigError::InvalidQuantizer {
                name: "duration_ratio",
                reason: format!(
                    "need 0 < min <= max (got {} / {})",
                    self.min_duration_ratio, self.max_duration_ratio
                ),
            });
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid.
    /// Use [`AnalysisConfig::try_load_from_file`] to surface the failure instead.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from JSON file, failing on read or parse errors
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.as_ref().display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.as_ref().display()))?;
        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clips_count > MAX_CLIPS {
            return Err(ConfigError::InvalidClipCount {
                value: self.clips_count,
                max: MAX_CLIPS,
            });
        }
        let bounds_ok = self.min_clip_length.is_finite()
            && self.max_clip_length.is_finite()
            && self.min_clip_length > 0.0
            && self.max_clip_length > self.min_clip_length;
        if !bounds_ok {
            return Err(ConfigError::InvalidClipBounds {
                min: self.min_clip_length,
                max: self.max_clip_length,
            });
        }
        if !self.pre_roll.is_finite() || self.pre_roll < 0.0 {
            return Err(ConfigError::InvalidPreRoll {
                value: self.pre_roll,
            });
        }
        if !self.spacing_seconds.is_finite() || self.spacing_seconds <= 0.0 {
            return Err(ConfigError::InvalidSpacing {
                value: self.spacing_seconds,
            });
        }
        if !(0.0..=1.0).contains(&self.prominence) {
            return Err(ConfigError::InvalidPeakParameter {
                name: "prominence",
                value: self.prominence,
            });
        }
        if !self.seed_window_seconds.is_finite() || self.seed_window_seconds < 0.0 {
            return Err(ConfigError::InvalidPeakParameter {
                name: "seed_window_seconds",
                value: self.seed_window_seconds,
            });
        }
        self.quantizer.validate()
    }
}
