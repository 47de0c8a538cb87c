//! The fingerprint comparison engine.
//!
//! A [`FingerprintComparator`] is pure: it holds nothing but a validated
//! configuration snapshot and is safe to call from any number of threads.
//! Anomalous inputs (too short, no hash overlap, no matching segments) never
//! fail; they produce the well-formed non-match result so one bad file
//! cannot stop a batch scan.

use fxhash::FxHashSet;

use fingerprint::Fingerprint;

use crate::alignment;
use crate::config::{ComparatorConfig, ComparatorError, QUICK_FILTER_SLACK};
use crate::result::{MatchResult, SegmentMatch};


/// Compares fingerprint pairs under a fixed configuration snapshot.
pub struct FingerprintComparator {
    cfg: ComparatorConfig,
}

impl Default for FingerprintComparator {
    fn default() -> Self {
        Self {
            cfg: ComparatorConfig::default(),
        }
    }
}

impl FingerprintComparator {
    /// Build a comparator from a validated configuration.
    pub fn new(cfg: ComparatorConfig) -> Result<Self, ComparatorError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// The configuration snapshot this comparator runs on.
    pub fn config(&self) -> &ComparatorConfig {
        &self.cfg
    }

    /// Single-offset comparison: find the best alignment and judge the full
    /// overlap there.
    pub fn compare(&self, a: &Fingerprint, b: &Fingerprint) -> MatchResult {
        let cfg = &self.cfg;
        if a.len() < cfg.minimum_overlap || b.len() < cfg.minimum_overlap {
            return MatchResult::non_match();
        }
        if !self.quick_filter(a, b) {
            return MatchResult::non_match();
        }

        let best_offset = alignment::find_best_alignment(a.data(), b.data(), cfg);
        let similarity = alignment::similarity_at_offset(a.data(), b.data(), best_offset);
        let bit_error_rate = alignment::bit_error_rate_at_offset(a.data(), b.data(), best_offset);
        let matched_segments = alignment::overlap_len(a.len(), b.len(), best_offset);

        let is_duplicate = similarity >= cfg.similarity_threshold
            && bit_error_rate <= cfg.bit_error_threshold
            && matched_segments >= cfg.minimum_overlap;

        MatchResult {
            similarity_score: similarity,
            best_offset,
            matched_segments,
            bit_error_rate,
            is_duplicate,
            segment_matches: Vec::new(),
            coverage_ratio: 0.0,
        }
    }

    /// Segment-level comparison tolerant to non-uniform silence padding and
    /// partial overlaps.
    pub fn compare_sliding_window(&self, a: &Fingerprint, b: &Fingerprint) -> MatchResult {
        let cfg = &self.cfg;
        if a.len() < cfg.minimum_overlap || b.len() < cfg.minimum_overlap {
            return MatchResult::non_match();
        }
        if !self.quick_filter(a, b) {
            return MatchResult::non_match();
        }

        let window = cfg.sliding_window_size;
        if a.len() < window || b.len() < window {
            return MatchResult::non_match();
        }

        let kept = self.find_segment_matches(a.data(), b.data());
        if kept.is_empty() {
            return MatchResult::non_match();
        }

        // Similarity-weighted mean: strong segments count more than weak ones.
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for segment in &kept {
            weighted_sum += segment.similarity * segment.similarity;
            weight_sum += segment.similarity;
        }
        let similarity_score = if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            0.0
        };

        let best_offset = kept[0].offset;
        let max_len = a.len().max(b.len());
        let coverage_ratio = ((kept.len() * window) as f64 / max_len as f64).min(1.0);
        let bit_error_rate = alignment::bit_error_rate_at_offset(a.data(), b.data(), best_offset);
        let matched_segments = kept.len();

        let is_duplicate = similarity_score >= cfg.similarity_threshold
            && bit_error_rate <= cfg.bit_error_threshold
            && coverage_ratio >= cfg.group_coverage_min
            && matched_segments >= cfg.group_min_matching_segments;

        MatchResult {
            similarity_score,
            best_offset,
            matched_segments,
            bit_error_rate,
            is_duplicate,
            segment_matches: kept,
            coverage_ratio,
        }
    }

    /// Cheap hash-set rejection of pairs that cannot be duplicates.
    ///
    /// Jaccard similarity of the deduplicated low-16-bit hash sets, accepted
    /// at `QUICK_FILTER_SLACK` times the duplicate threshold. The slack keeps
    /// the filter strictly more permissive than the full comparison.
    pub fn quick_filter(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        let set_a: FxHashSet<u16> = a.hashes().collect();
        let set_b: FxHashSet<u16> = b.hashes().collect();
        if set_a.is_empty() || set_b.is_empty() {
            return false;
        }

        let (small, large) = if set_a.len() <= set_b.len() {
            (&set_a, &set_b)
        } else {
            (&set_b, &set_a)
        };
        let intersection = small.iter().filter(|hash| large.contains(hash)).count();
        let union = set_a.len() + set_b.len() - intersection;
        let jaccard = if union > 0 {
            intersection as f64 / union as f64
        } else {
            0.0
        };

        jaccard >= self.cfg.similarity_threshold * QUICK_FILTER_SLACK
    }

    /// Bitwise similarity of the two fingerprints at a fixed offset.
    ///
    /// Exposed for calibration and reporting; `compare` chooses the offset
    /// itself.
    pub fn similarity_at(&self, a: &Fingerprint, b: &Fingerprint, offset: i64) -> f64 {
        alignment::similarity_at_offset(a.data(), b.data(), offset)
    }

    /// Bit error rate of the two fingerprints at a fixed offset.
    pub fn bit_error_rate_at(&self, a: &Fingerprint, b: &Fingerprint, offset: i64) -> f64 {
        alignment::bit_error_rate_at_offset(a.data(), b.data(), offset)
    }

    /// Accepted segment matches, strongest first, after overlap filtering.
    fn find_segment_matches(&self, a: &[u32], b: &[u32]) -> Vec<SegmentMatch> {
        let cfg = &self.cfg;
        let window = cfg.sliding_window_size;
        let accept = cfg.segment_min_similarity_factor * cfg.similarity_threshold;

        // (position in a, displacement into b, similarity)
        let mut found: Vec<(usize, i64, f64)> = Vec::new();

        let mut i = 0;
        while i + window <= a.len() {
            let window_a = &a[i..i + window];
            let mut best: Option<(i64, f64)> = None;

            let mut j = 0;
            while j + window <= b.len() {
                let similarity =
                    alignment::similarity_at_offset(window_a, &b[j..j + window], 0);
                if similarity >= accept
                    && best.map_or(true, |(_, best_sim)| similarity > best_sim)
                {
                    best = Some((j as i64 - i as i64, similarity));
                }
                j += cfg.alignment_step;
            }

            if let Some((offset, similarity)) = best {
                found.push((i, offset, similarity));
            }
            i += cfg.sliding_window_stride;
        }

        // Strongest first; equal strengths ordered by window position so the
        // result does not depend on scan order.
        found.sort_by(|x, y| {
            y.2.partial_cmp(&x.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.0.cmp(&y.0))
        });

        // Greedily drop matches overlapping an already-kept window.
        let half_window = (window / 2) as i64;
        let mut kept_positions: Vec<i64> = Vec::new();
        let mut kept = Vec::new();
        for (position, offset, similarity) in found {
            let position = position as i64;
            if kept_positions
                .iter()
                .any(|&kept_pos| (position - kept_pos).abs() < half_window)
            {
                continue;
            }
            kept_positions.push(position);
            kept.push(SegmentMatch { offset, similarity });
        }

        kept
    }
}
