//! Alignment offset search between two sub-fingerprint sequences.
//!
//! Two independent searches run for every comparison: a histogram of 16-bit
//! hash co-occurrence offsets (robust against silence padding) and a coarse
//! similarity correlation scan. The winner by similarity is refined with a
//! ±2-word sweep.

use fxhash::FxHashMap;

use fingerprint::bits;

use crate::config::ComparatorConfig;

/// Gaussian sigma used to smooth the offset histogram.
const HISTOGRAM_SIGMA: f64 = 2.0;

/// Minimum smoothed value for a histogram bin to count as a peak.
const PEAK_MIN_VALUE: f64 = 0.1;

/// Overlap index range in the first sequence for a given offset.
///
/// The overlap pairs `a[i]` with `b[i + offset]`; the returned range is the
/// valid `i` interval (possibly empty).
#[inline]
pub(crate) fn overlap_range(len_a: usize, len_b: usize, offset: i64) -> (usize, usize) {
    let start = (-offset).max(0) as usize;
    let end = (len_a as i64).min(len_b as i64 - offset).max(0) as usize;
    (start, end.max(start))
}

/// Overlap length in words at the given offset.
#[inline]
pub(crate) fn overlap_len(len_a: usize, len_b: usize, offset: i64) -> usize {
    let (start, end) = overlap_range(len_a, len_b, offset);
    end - start
}

/// Fraction of agreeing bits over the overlap at `offset`; 0 when the
/// overlap is empty.
pub fn similarity_at_offset(a: &[u32], b: &[u32], offset: i64) -> f64 {
    let (start, end) = overlap_range(a.len(), b.len(), offset);
    if start >= end {
        return 0.0;
    }
    let mut matching: u64 = 0;
    for i in start..end {
        let j = (i as i64 + offset) as usize;
        matching += u64::from(bits::matching_bits(a[i], b[j]));
    }
    matching as f64 / (32 * (end - start)) as f64
}

/// Fraction of differing bits over the overlap at `offset`; 1 when the
/// overlap is empty.
pub fn bit_error_rate_at_offset(a: &[u32], b: &[u32], offset: i64) -> f64 {
    let (start, end) = overlap_range(a.len(), b.len(), offset);
    if start >= end {
        return 1.0;
    }
    let mut errors: u64 = 0;
    for i in start..end {
        let j = (i as i64 + offset) as usize;
        errors += u64::from(bits::hamming(a[i], b[j]));
    }
    errors as f64 / (32 * (end - start)) as f64
}

/// Best alignment offset between two sequences.
///
/// Runs the histogram and correlation searches, keeps the offset with the
/// higher similarity (the histogram wins ties), then refines ±2 words around
/// it.
pub(crate) fn find_best_alignment(a: &[u32], b: &[u32], cfg: &ComparatorConfig) -> i64 {
    let max_offset = cfg.max_alignment_offset as i64;

    let histogram_offset = histogram_alignment(a, b, max_offset).unwrap_or(0);
    let correlation_offset = correlation_alignment(a, b, cfg);

    let histogram_similarity = similarity_at_offset(a, b, histogram_offset);
    let correlation_similarity = similarity_at_offset(a, b, correlation_offset);

    let (mut best_offset, mut best_similarity) = if histogram_similarity >= correlation_similarity {
        (histogram_offset, histogram_similarity)
    } else {
        (correlation_offset, correlation_similarity)
    };

    for offset in best_offset - 2..=best_offset + 2 {
        if offset == best_offset || offset.abs() > max_offset {
            continue;
        }
        let similarity = similarity_at_offset(a, b, offset);
        if similarity > best_similarity {
            best_similarity = similarity;
            best_offset = offset;
        }
    }

    best_offset
}

/// Histogram-based offset estimate, or `None` when no peak emerges.
fn histogram_alignment(a: &[u32], b: &[u32], max_offset: i64) -> Option<i64> {
    let histogram = build_offset_histogram(a, b, max_offset);
    let smoothed = gaussian_smooth(&histogram, HISTOGRAM_SIGMA);
    best_peak_offset(&smoothed, max_offset)
}

/// Histogram of `j - i` over all positions where the 16-bit hashes of `a[i]`
/// and `b[j]` collide, restricted to `|j - i| <= max_offset`.
///
/// Joined through a per-hash position table for `a` instead of walking all
/// `|a| * |b|` pairs; the resulting histogram is identical.
fn build_offset_histogram(a: &[u32], b: &[u32], max_offset: i64) -> Vec<u32> {
    let size = (2 * max_offset + 1) as usize;
    let mut histogram = vec![0u32; size];

    let mut positions: FxHashMap<u16, Vec<u32>> = FxHashMap::default();
    for (i, &word) in a.iter().enumerate() {
        positions
            .entry((word & 0xFFFF) as u16)
            .or_default()
            .push(i as u32);
    }

    for (j, &word) in b.iter().enumerate() {
        if let Some(list) = positions.get(&((word & 0xFFFF) as u16)) {
            for &i in list {
                let diff = j as i64 - i as i64;
                if diff.abs() <= max_offset {
                    histogram[(diff + max_offset) as usize] += 1;
                }
            }
        }
    }

    histogram
}

/// Discrete Gaussian smoothing, kernel truncated at ±3σ and renormalized at
/// the boundaries.
fn gaussian_smooth(histogram: &[u32], sigma: f64) -> Vec<f64> {
    let kernel_radius = (3.0 * sigma) as i64;
    let len = histogram.len() as i64;
    let mut smoothed = vec![0.0; histogram.len()];

    for i in 0..len {
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for j in -kernel_radius..=kernel_radius {
            let index = i + j;
            if index >= 0 && index < len {
                let weight = (-((j * j) as f64) / (2.0 * sigma * sigma)).exp();
                sum += histogram[index as usize] as f64 * weight;
                weight_sum += weight;
            }
        }
        smoothed[i as usize] = if weight_sum > 0.0 { sum / weight_sum } else { 0.0 };
    }

    smoothed
}

/// Offset of the strongest local maximum of the smoothed histogram.
///
/// Ties are broken toward the smaller absolute offset, then the smaller
/// offset, so the result does not depend on scan order.
fn best_peak_offset(smoothed: &[f64], max_offset: i64) -> Option<i64> {
    if smoothed.len() < 3 {
        return None;
    }

    let mut best: Option<(f64, i64)> = None;
    for i in 1..smoothed.len() - 1 {
        let value = smoothed[i];
        if value > smoothed[i - 1] && value > smoothed[i + 1] && value > PEAK_MIN_VALUE {
            let offset = i as i64 - max_offset;
            let better = match best {
                None => true,
                Some((best_value, best_off)) => {
                    value > best_value
                        || (value == best_value
                            && (offset.abs() < best_off.abs()
                                || (offset.abs() == best_off.abs() && offset < best_off)))
                }
            };
            if better {
                best = Some((value, offset));
            }
        }
    }

    best.map(|(_, offset)| offset)
}

/// Coarse correlation scan over `±max_alignment_offset` at
/// `alignment_step` stride. Ties are broken toward the smaller |offset|.
fn correlation_alignment(a: &[u32], b: &[u32], cfg: &ComparatorConfig) -> i64 {
    let max_offset = cfg.max_alignment_offset as i64;
    let step = cfg.alignment_step as i64;

    let mut best_offset = 0i64;
    let mut best_similarity = -1.0f64;

    let mut offset = -max_offset;
    while offset <= max_offset {
        let similarity = similarity_at_offset(a, b, offset);
        let better = similarity > best_similarity
            || (similarity == best_similarity
                && (offset.abs() < best_offset.abs()
                    || (offset.abs() == best_offset.abs() && offset < best_offset)));
        if better {
            best_similarity = similarity;
            best_offset = offset;
        }
        offset += step;
    }

    best_offset
}
