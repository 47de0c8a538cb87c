//! Configuration for the fingerprint comparator.
//!
//! All thresholds live in one immutable snapshot so a comparison observes a
//! consistent configuration from start to finish. Any change that affects
//! duplicate decisions should go through a fresh snapshot rather than
//! mutation in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack factor applied to `similarity_threshold` by the quick filter.
///
/// Empirically chosen so the filter never rejects a pair the full comparison
/// would have accepted: a pair at the duplicate threshold shares far more
/// than 60% of its 16-bit hash keys.
pub const QUICK_FILTER_SLACK: f64 = 0.6;

/// Errors rejected by [`ComparatorConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComparatorError {
    #[error("invalid config: similarity_threshold must be within [0, 1] (got {value})")]
    InvalidSimilarityThreshold { value: f64 },

    #[error("invalid config: bit_error_threshold must be within [0, 1] (got {value})")]
    InvalidBitErrorThreshold { value: f64 },

    #[error("invalid config: minimum_overlap must be >= 1 (got {value})")]
    InvalidMinimumOverlap { value: usize },

    #[error("invalid config: alignment_step must be >= 1 (got {value})")]
    InvalidAlignmentStep { value: usize },

    #[error("invalid config: sliding_window_size must be >= 2 (got {value})")]
    InvalidSlidingWindowSize { value: usize },

    #[error("invalid config: sliding_window_stride must be >= 1 (got {value})")]
    InvalidSlidingWindowStride { value: usize },

    #[error("invalid config: segment_min_similarity_factor must be within [0, 1] (got {value})")]
    InvalidSegmentFactor { value: f64 },

    #[error("invalid config: group_coverage_min must be within [0, 1] (got {value})")]
    InvalidCoverageMin { value: f64 },

    #[error("invalid config: group_min_matching_segments must be >= 1 (got {value})")]
    InvalidGroupSegments { value: usize },
}

/// Comparator thresholds and alignment-search parameters.
///
/// Defaults are calibrated for Chromaprint-style fingerprints where one word
/// covers ~0.124 s of audio: the 360-word offset range spans ~30 s of
/// misalignment, the 60-word window ~5 s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Minimum similarity for a duplicate verdict.
    pub similarity_threshold: f64,
    /// Maximum bit error rate for a duplicate verdict.
    pub bit_error_threshold: f64,
    /// Minimum overlapped words required for any comparison.
    pub minimum_overlap: usize,
    /// Half-range of the alignment offset search, in words.
    pub max_alignment_offset: usize,
    /// Stride of the coarse correlation search, in words.
    pub alignment_step: usize,
    /// Segment window length for sliding-window mode, in words.
    pub sliding_window_size: usize,
    /// Advance between consecutive windows over the first fingerprint.
    pub sliding_window_stride: usize,
    /// Factor applied to `similarity_threshold` when accepting a segment.
    pub segment_min_similarity_factor: f64,
    /// Minimum coverage ratio for a sliding-window duplicate verdict.
    pub group_coverage_min: f64,
    /// Minimum kept segments for a sliding-window duplicate verdict.
    pub group_min_matching_segments: usize,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            bit_error_threshold: 0.15,
            minimum_overlap: 10,
            max_alignment_offset: 360,
            alignment_step: 6,
            sliding_window_size: 60,
            sliding_window_stride: 30,
            segment_min_similarity_factor: 0.8,
            group_coverage_min: 0.5,
            group_min_matching_segments: 3,
        }
    }
}

impl ComparatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum similarity for a duplicate verdict.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the maximum bit error rate for a duplicate verdict.
    pub fn with_bit_error_threshold(mut self, threshold: f64) -> Self {
        self.bit_error_threshold = threshold;
        self
    }

    /// Set the minimum overlapped words required for any comparison.
    pub fn with_minimum_overlap(mut self, words: usize) -> Self {
        self.minimum_overlap = words;
        self
    }

    /// Set the half-range of the alignment offset search.
    pub fn with_max_alignment_offset(mut self, words: usize) -> Self {
        self.max_alignment_offset = words;
        self
    }

    /// Set the stride of the coarse correlation search.
    pub fn with_alignment_step(mut self, words: usize) -> Self {
        self.alignment_step = words;
        self
    }

    /// Set the segment window length, adjusting the stride to the
    /// conventional half window.
    pub fn with_sliding_window_size(mut self, words: usize) -> Self {
        self.sliding_window_size = words;
        self.sliding_window_stride = (words / 2).max(1);
        self
    }

    /// Set the advance between consecutive windows explicitly.
    pub fn with_sliding_window_stride(mut self, words: usize) -> Self {
        self.sliding_window_stride = words;
        self
    }

    /// Set the factor applied to `similarity_threshold` for segment
    /// acceptance.
    pub fn with_segment_min_similarity_factor(mut self, factor: f64) -> Self {
        self.segment_min_similarity_factor = factor;
        self
    }

    /// Set the minimum coverage ratio for sliding-window duplicates.
    pub fn with_group_coverage_min(mut self, coverage: f64) -> Self {
        self.group_coverage_min = coverage;
        self
    }

    /// Set the minimum kept segments for sliding-window duplicates.
    pub fn with_group_min_matching_segments(mut self, segments: usize) -> Self {
        self.group_min_matching_segments = segments;
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), ComparatorError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ComparatorError::InvalidSimilarityThreshold {
                value: self.similarity_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.bit_error_threshold) {
            return Err(ComparatorError::InvalidBitErrorThreshold {
                value: self.bit_error_threshold,
            });
        }
        if self.minimum_overlap < 1 {
            return Err(ComparatorError::InvalidMinimumOverlap {
                value: self.minimum_overlap,
            });
        }
        if self.alignment_step < 1 {
            return Err(ComparatorError::InvalidAlignmentStep {
                value: self.alignment_step,
            });
        }
        if self.sliding_window_size < 2 {
            return Err(ComparatorError::InvalidSlidingWindowSize {
                value: self.sliding_window_size,
            });
        }
        if self.sliding_window_stride < 1 {
            return Err(ComparatorError::InvalidSlidingWindowStride {
                value: self.sliding_window_stride,
            });
        }
        if !(0.0..=1.0).contains(&self.segment_min_similarity_factor) {
            return Err(ComparatorError::InvalidSegmentFactor {
                value: self.segment_min_similarity_factor,
            });
        }
        if !(0.0..=1.0).contains(&self.group_coverage_min) {
            return Err(ComparatorError::InvalidCoverageMin {
                value: self.group_coverage_min,
            });
        }
        if self.group_min_matching_segments < 1 {
            return Err(ComparatorError::InvalidGroupSegments {
                value: self.group_min_matching_segments,
            });
        }
        Ok(())
    }
}
