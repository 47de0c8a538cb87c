//! Comparison result types.
//!
//! A [`MatchResult`] is a freshly computed value object; the comparator never
//! caches or persists one. Field names, units, and ranges are part of the
//! public contract: new fields may be appended, existing semantics must not
//! change.

use serde::{Deserialize, Serialize};

/// One accepted segment match from sliding-window comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentMatch {
    /// Displacement of the segment in the second fingerprint relative to its
    /// position in the first, in words.
    pub offset: i64,
    /// Bitwise similarity of the aligned segment pair, in [0, 1].
    pub similarity: f64,
}

/// Outcome of comparing two fingerprints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    /// Overall similarity in [0, 1]; exact meaning depends on the mode
    /// (single-offset bitwise similarity, or similarity-weighted segment
    /// mean).
    pub similarity_score: f64,
    /// Best alignment offset in words (positive: the second fingerprint
    /// starts later).
    pub best_offset: i64,
    /// Single-offset mode: overlap length in words at `best_offset`.
    /// Sliding-window mode: number of kept segment matches.
    pub matched_segments: usize,
    /// Bit error rate at `best_offset` over the full sequences, in [0, 1].
    pub bit_error_rate: f64,
    /// Whether the pair passed every duplicate threshold.
    pub is_duplicate: bool,
    /// Kept segment matches, strongest first (sliding-window mode only).
    pub segment_matches: Vec<SegmentMatch>,
    /// Fraction of the longer fingerprint covered by kept segments
    /// (sliding-window mode only).
    pub coverage_ratio: f64,
}

impl MatchResult {
    /// The well-formed "no match" result used for short inputs, quick-filter
    /// rejections, and empty segment sets.
    pub(crate) fn non_match() -> Self {
        Self {
            similarity_score: 0.0,
            best_offset: 0,
            matched_segments: 0,
            bit_error_rate: 1.0,
            is_duplicate: false,
            segment_matches: Vec::new(),
            coverage_ratio: 0.0,
        }
    }
}
