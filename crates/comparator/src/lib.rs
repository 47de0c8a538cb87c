//! Fingerprint comparison for audio duplicate detection.
//!
//! This crate decides how similar two fingerprints are and whether they
//! represent the same recording. Two modes are exposed:
//!
//! - [`FingerprintComparator::compare`] finds the single best alignment
//!   offset (histogram of 16-bit hash co-occurrences + coarse correlation,
//!   refined locally) and judges the full overlap there.
//! - [`FingerprintComparator::compare_sliding_window`] matches fixed-size
//!   segments independently, which tolerates non-uniform silence padding and
//!   partial overlaps that a single global offset cannot express.
//!
//! The comparator is pure and never fails: configuration problems are
//! rejected when the snapshot is built, and anomalous inputs at comparison
//! time produce a well-formed non-match result. All entry points are safe to
//! call concurrently.

mod alignment;
mod config;
mod engine;
mod result;

pub use alignment::{bit_error_rate_at_offset, similarity_at_offset};
pub use config::{ComparatorConfig, ComparatorError, QUICK_FILTER_SLACK};
pub use engine::FingerprintComparator;
pub use result::{MatchResult, SegmentMatch};
