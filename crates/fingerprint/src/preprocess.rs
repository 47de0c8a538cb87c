//! Preprocessing configuration surface shared with the fingerprint producer.
//!
//! The core never touches PCM audio; decoding, silence trimming, resampling,
//! and volume normalization happen upstream of the fingerprinter. The option
//! set below is kept bitwise-stable so two deployments configured the same
//! way produce comparable fingerprints. Changing a default here changes the
//! fingerprints the index will see.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clips shorter than this many seconds are candidates for self-doubling
/// before fingerprinting.
pub const DOUBLING_MIN_DURATION_SECS: f64 = 3.0;

/// Errors rejected by [`PreprocessConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("invalid config: target_sample_rate must be >= 1 (got {rate})")]
    InvalidTargetSampleRate { rate: u32 },

    #[error("invalid config: doubling_threshold_ratio must be within (0, 1] (got {ratio})")]
    InvalidDoublingRatio { ratio: f64 },

    #[error("invalid config: min_duration_for_doubling_s must be non-negative (got {secs})")]
    InvalidDoublingDuration { secs: f64 },

    #[error("invalid config: compression_ratio must be >= 1 (got {ratio})")]
    InvalidCompressionRatio { ratio: f32 },
}

/// Recognized preprocessing options, with the producer's defaults.
///
/// Field names are part of the serialized contract; additions are fine,
/// renames are not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Trim leading/trailing silence before fingerprinting.
    pub trim_silence: bool,
    /// dB threshold below which a segment counts as silence.
    pub silence_threshold_db: f32,
    /// Minimum silence run, in milliseconds, eligible for trimming.
    pub min_silence_duration_ms: u32,
    /// Silence preserved at each trimmed edge, in milliseconds.
    pub preserve_padding_ms: u32,

    /// Resample to `target_sample_rate` before fingerprinting.
    pub normalize_sample_rate: bool,
    pub target_sample_rate: u32,

    /// Normalize loudness before fingerprinting.
    pub normalize_volume: bool,
    /// Use RMS normalization; peak normalization otherwise.
    pub use_rms: bool,
    pub target_rms_db: f32,
    pub target_peak_db: f32,
    /// Floor below which samples are ignored when measuring level.
    pub noise_floor_db: f32,

    /// Apply gentle dynamic-range compression after normalization.
    pub apply_gentle_compression: bool,
    pub compression_ratio: f32,

    /// Suppress self-doubling when the clip was significantly trimmed.
    pub disable_doubling_after_trim: bool,
    /// Trimmed/original duration ratio under which trimming counts as
    /// significant.
    pub doubling_threshold_ratio: f64,
    /// Minimum original duration, in seconds, for a significantly trimmed
    /// clip to still be doubled.
    pub min_duration_for_doubling_s: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            trim_silence: true,
            silence_threshold_db: -55.0,
            min_silence_duration_ms: 100,
            preserve_padding_ms: 100,
            normalize_sample_rate: true,
            target_sample_rate: 44_100,
            normalize_volume: true,
            use_rms: true,
            target_rms_db: -20.0,
            target_peak_db: -3.0,
            noise_floor_db: -60.0,
            apply_gentle_compression: false,
            compression_ratio: 2.0,
            disable_doubling_after_trim: true,
            doubling_threshold_ratio: 0.5,
            min_duration_for_doubling_s: 1.5,
        }
    }
}

impl PreprocessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trim_silence(mut self, trim: bool) -> Self {
        self.trim_silence = trim;
        self
    }

    pub fn with_silence_threshold_db(mut self, db: f32) -> Self {
        self.silence_threshold_db = db;
        self
    }

    pub fn with_target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = rate;
        self
    }

    pub fn with_volume_normalization(mut self, enabled: bool) -> Self {
        self.normalize_volume = enabled;
        self
    }

    pub fn with_doubling_threshold_ratio(mut self, ratio: f64) -> Self {
        self.doubling_threshold_ratio = ratio;
        self
    }

    pub fn with_min_duration_for_doubling(mut self, secs: f64) -> Self {
        self.min_duration_for_doubling_s = secs;
        self
    }

    /// Validate option ranges.
    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.target_sample_rate == 0 {
            return Err(PreprocessError::InvalidTargetSampleRate {
                rate: self.target_sample_rate,
            });
        }
        if !(self.doubling_threshold_ratio > 0.0 && self.doubling_threshold_ratio <= 1.0) {
            return Err(PreprocessError::InvalidDoublingRatio {
                ratio: self.doubling_threshold_ratio,
            });
        }
        if !(self.min_duration_for_doubling_s >= 0.0) {
            return Err(PreprocessError::InvalidDoublingDuration {
                secs: self.min_duration_for_doubling_s,
            });
        }
        if self.compression_ratio < 1.0 {
            return Err(PreprocessError::InvalidCompressionRatio {
                ratio: self.compression_ratio,
            });
        }
        Ok(())
    }
}

/// Producer-side smart-doubling decision for short clips.
///
/// Clips shorter than [`DOUBLING_MIN_DURATION_SECS`] after preprocessing are
/// concatenated with themselves before fingerprinting so they yield enough
/// sub-fingerprints to compare. When `disable_doubling_after_trim` is set and
/// the clip was significantly trimmed (post/original below
/// `doubling_threshold_ratio`), doubling only happens if the original was at
/// least `min_duration_for_doubling_s` long.
///
/// `post_duration` and `original_duration` are in seconds.
pub fn should_double_short_clip(
    post_duration: f64,
    original_duration: f64,
    cfg: &PreprocessConfig,
) -> bool {
    if post_duration >= DOUBLING_MIN_DURATION_SECS {
        return false;
    }
    if !cfg.disable_doubling_after_trim || original_duration <= 0.0 {
        return true;
    }
    let trimming_ratio = post_duration / original_duration;
    if trimming_ratio < cfg.doubling_threshold_ratio {
        original_duration >= cfg.min_duration_for_doubling_s
    } else {
        true
    }
}
