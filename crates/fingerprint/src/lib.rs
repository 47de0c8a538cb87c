//! Fingerprint value object for audio duplicate detection.
//!
//! A [`Fingerprint`] is the compact binary representation of one audio file:
//! an ordered sequence of 32-bit sub-fingerprints produced by a
//! Chromaprint-style perceptual fingerprinter, together with the metadata
//! needed for reporting. Each word covers roughly 0.124 s of audio at the
//! producer's internal 11,025 Hz framing.
//!
//! The fingerprint is part of the public contract between the producer and
//! the index/comparator layers: it is immutable after construction, carries
//! its invariants in the constructor, and never decides similarity itself.

pub mod bits;
pub mod preprocess;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sample rate of the fingerprint producer's internal framing.
///
/// Carried on every fingerprint for reporting; the comparator never reads it.
pub const PRODUCER_SAMPLE_RATE: u32 = 11_025;

/// Sanity bound on fingerprint length (≈ 3.4 hours of audio).
pub const MAX_FINGERPRINT_WORDS: usize = 100_000;

/// Errors returned when validating fingerprint data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FingerprintError {
    #[error("fingerprint data must not be empty")]
    EmptyData,

    #[error("fingerprint duration must be positive (got {duration})")]
    NonPositiveDuration { duration: f64 },

    #[error("fingerprint length {len} exceeds the maximum of {max} words")]
    TooManyWords { len: usize, max: usize },
}

/// Immutable fingerprint of one audio file.
///
/// Construct through [`Fingerprint::new`], which enforces the invariants
/// (non-empty data, positive duration, bounded length). Deserialized values
/// should be re-checked with [`Fingerprint::validate`] before they enter an
/// index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fingerprint {
    data: Vec<u32>,
    sample_rate: u32,
    duration: f64,
    file_path: String,
}

impl Fingerprint {
    /// Build a validated fingerprint from raw sub-fingerprint words.
    pub fn new(
        data: Vec<u32>,
        duration: f64,
        file_path: impl Into<String>,
    ) -> Result<Self, FingerprintError> {
        let fp = Self {
            data,
            sample_rate: PRODUCER_SAMPLE_RATE,
            duration,
            file_path: file_path.into(),
        };
        fp.validate()?;
        Ok(fp)
    }

    /// Re-check the construction invariants.
    ///
    /// Used by ingestion paths on fingerprints that arrived through serde
    /// rather than [`Fingerprint::new`].
    pub fn validate(&self) -> Result<(), FingerprintError> {
        if self.data.is_empty() {
            return Err(FingerprintError::EmptyData);
        }
        if !(self.duration > 0.0) {
            return Err(FingerprintError::NonPositiveDuration {
                duration: self.duration,
            });
        }
        if self.data.len() > MAX_FINGERPRINT_WORDS {
            return Err(FingerprintError::TooManyWords {
                len: self.data.len(),
                max: MAX_FINGERPRINT_WORDS,
            });
        }
        Ok(())
    }

    /// Raw sub-fingerprint words.
    #[inline]
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Number of sub-fingerprint words.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Producer sample rate, for reporting only.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio this fingerprint represents.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Path of the file the fingerprint was computed from.
    #[inline]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Low 16 bits of the word at `position`.
    ///
    /// The 16-bit view is the key space of the inverted index and of the
    /// comparator's histogram alignment.
    #[inline]
    pub fn hash_at(&self, position: usize) -> u16 {
        (self.data[position] & 0xFFFF) as u16
    }

    /// Iterator over the low-16-bit hash of every word, in position order.
    pub fn hashes(&self) -> impl Iterator<Item = u16> + '_ {
        self.data.iter().map(|&word| (word & 0xFFFF) as u16)
    }

    /// Whether any low-16-bit hash occurs in both fingerprints.
    ///
    /// A cheap containment probe; similarity decisions belong to the
    /// comparator.
    pub fn matches_any_hash_of(&self, other: &Fingerprint) -> bool {
        let mut seen = [false; 1 << 16];
        for hash in self.hashes() {
            seen[hash as usize] = true;
        }
        other.hashes().any(|hash| seen[hash as usize])
    }
}
