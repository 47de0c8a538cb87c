//! Thread-safe fingerprint index and duplicate discovery façade.
//!
//! [`FingerprintIndex`] owns every registered fingerprint in a dense arena
//! keyed by `file_id` and maintains the inverted 16-bit hash index over
//! them. A single-writer/multiple-readers discipline guards both: `add_file`
//! and `clear` take the write lock, everything else reads. Comparator
//! configuration lives in an immutable snapshot behind its own lock; setters
//! publish a fresh snapshot and queries capture the one current when they
//! start, so a scan never observes a half-updated configuration.
//!
//! ## Example
//!
//! ```
//! use fingerprint::Fingerprint;
//! use index::FingerprintIndex;
//!
//! # fn demo() -> Result<(), index::IndexError> {
//! let index = FingerprintIndex::new();
//! let words: Vec<u32> = (0..120u32).map(|i| i.wrapping_mul(2654435761)).collect();
//! let original = Fingerprint::new(words.clone(), 14.9, "original.flac")?;
//! let copy = Fingerprint::new(words, 14.9, "copy.flac")?;
//!
//! index.add_file("original.flac", original)?;
//! index.add_file("copy.flac", copy)?;
//!
//! let groups = index.find_all_duplicates()?;
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].file_ids, vec![0, 1]);
//! # Ok(())
//! # }
//! ```

mod discovery;
mod postings;

pub use discovery::DuplicateGroup;
pub use postings::IndexEntry;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use thiserror::Error;

use comparator::{ComparatorConfig, ComparatorError, FingerprintComparator};
use fingerprint::{Fingerprint, FingerprintError};

use crate::postings::InvertedIndex;

/// Minimum distinct hash hits for a file to count as a candidate.
pub const DEFAULT_HASH_THRESHOLD: usize = 5;

/// Errors surfaced at the index boundary.
///
/// The comparator and the discovery loop themselves never fail; these cover
/// ingestion, configuration, and operations on an unbuilt index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(#[from] FingerprintError),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ComparatorError),

    #[error("invalid configuration: hash_threshold must be >= 1")]
    InvalidHashThreshold,

    #[error("index holds no fingerprints")]
    NotInitialized,
}

/// One registered file: its path and the fingerprint the index owns for it.
#[derive(Debug)]
pub struct FileEntry {
    file_path: String,
    fingerprint: Fingerprint,
}

impl FileEntry {
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Arena and postings, guarded together so readers always see a consistent
/// pair.
pub(crate) struct IndexInner {
    pub(crate) files: Vec<FileEntry>,
    pub(crate) postings: InvertedIndex,
}

/// Read-only borrow of a [`FileEntry`], valid while it is held.
///
/// Holds the index's read lock; drop it before calling a writer.
pub struct FileRef<'a> {
    guard: RwLockReadGuard<'a, IndexInner>,
    file_id: usize,
}

impl FileRef<'_> {
    pub fn file_path(&self) -> &str {
        self.guard.files[self.file_id].file_path()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.guard.files[self.file_id].fingerprint()
    }
}

/// Thread-safe owner of fingerprints, postings, and scan configuration.
pub struct FingerprintIndex {
    inner: RwLock<IndexInner>,
    comparator_cfg: RwLock<Arc<ComparatorConfig>>,
    hash_threshold: AtomicUsize,
}

impl Default for FingerprintIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintIndex {
    /// An empty index with default comparator configuration.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexInner {
                files: Vec::new(),
                postings: InvertedIndex::default(),
            }),
            comparator_cfg: RwLock::new(Arc::new(ComparatorConfig::default())),
            hash_threshold: AtomicUsize::new(DEFAULT_HASH_THRESHOLD),
        }
    }

    /// An empty index running on a custom comparator configuration.
    pub fn with_config(cfg: ComparatorConfig) -> Result<Self, IndexError> {
        cfg.validate()?;
        let index = Self::new();
        *index.write_cfg() = Arc::new(cfg);
        Ok(index)
    }

    /// Register a fingerprint and return its dense file id.
    ///
    /// Takes the write lock once; linear in the fingerprint length.
    pub fn add_file(
        &self,
        file_path: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Result<usize, IndexError> {
        fingerprint.validate()?;
        let mut inner = self.write_inner();
        Ok(Self::push_file(&mut inner, file_path.into(), fingerprint))
    }

    /// Register many fingerprints under a single write lock.
    ///
    /// All fingerprints are validated up front; a bad entry rejects the whole
    /// batch before anything is inserted.
    pub fn add_files_batch(
        &self,
        files: Vec<(String, Fingerprint)>,
    ) -> Result<Vec<usize>, IndexError> {
        for (_, fingerprint) in &files {
            fingerprint.validate()?;
        }
        let mut inner = self.write_inner();
        let mut ids = Vec::with_capacity(files.len());
        for (file_path, fingerprint) in files {
            ids.push(Self::push_file(&mut inner, file_path, fingerprint));
        }
        Ok(ids)
    }

    fn push_file(inner: &mut IndexInner, file_path: String, fingerprint: Fingerprint) -> usize {
        let file_id = inner.files.len();
        inner.postings.insert(file_id, &fingerprint);
        inner.files.push(FileEntry {
            file_path,
            fingerprint,
        });
        file_id
    }

    /// Candidate file ids for a registered file, by posting overlap.
    ///
    /// Unknown ids yield an empty list (missing value, not a fault). The
    /// file's own id is part of the result; callers skip self.
    pub fn candidates(&self, file_id: usize) -> Result<Vec<usize>, IndexError> {
        let inner = self.read_inner();
        if inner.files.is_empty() {
            return Err(IndexError::NotInitialized);
        }
        match inner.files.get(file_id) {
            Some(entry) => Ok(inner
                .postings
                .candidates(entry.fingerprint(), self.hash_threshold())),
            None => Ok(Vec::new()),
        }
    }

    /// Candidate file ids for an external query fingerprint.
    pub fn candidates_for(&self, fingerprint: &Fingerprint) -> Result<Vec<usize>, IndexError> {
        let inner = self.read_inner();
        if inner.files.is_empty() {
            return Err(IndexError::NotInitialized);
        }
        Ok(inner
            .postings
            .candidates(fingerprint, self.hash_threshold()))
    }

    /// All duplicate groups, sequentially.
    pub fn find_all_duplicates(&self) -> Result<Vec<DuplicateGroup>, IndexError> {
        self.scan(false, None)
    }

    /// All duplicate groups, with files distributed over worker threads.
    ///
    /// `num_threads` of `None` (or zero) uses the global thread pool.
    pub fn find_all_duplicates_parallel(
        &self,
        num_threads: Option<usize>,
    ) -> Result<Vec<DuplicateGroup>, IndexError> {
        self.scan(true, num_threads)
    }

    fn scan(
        &self,
        parallel: bool,
        num_threads: Option<usize>,
    ) -> Result<Vec<DuplicateGroup>, IndexError> {
        // Capture the configuration snapshot before touching the data; a
        // concurrent setter must not change thresholds mid-scan.
        let cfg = self.comparator_config();
        let comparator = FingerprintComparator::new((*cfg).clone())?;
        let hash_threshold = self.hash_threshold();

        let inner = self.read_inner();
        if inner.files.is_empty() {
            return Err(IndexError::NotInitialized);
        }

        let run = || discovery::discover(&inner, &comparator, hash_threshold, parallel);
        let groups = match num_threads {
            Some(threads) if parallel && threads > 0 => {
                match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                    Ok(pool) => pool.install(run),
                    // Pool construction can fail under resource pressure;
                    // the global pool still produces the same groups.
                    Err(_) => run(),
                }
            }
            _ => run(),
        };
        Ok(groups)
    }

    /// Read-only borrow of a registered file; `None` for unknown ids.
    pub fn get_file(&self, file_id: usize) -> Option<FileRef<'_>> {
        let guard = self.read_inner();
        if file_id < guard.files.len() {
            Some(FileRef { guard, file_id })
        } else {
            None
        }
    }

    pub fn file_count(&self) -> usize {
        self.read_inner().files.len()
    }

    /// Number of distinct 16-bit hash keys with at least one posting.
    pub fn distinct_hash_count(&self) -> usize {
        self.read_inner().postings.distinct_hashes()
    }

    /// Total postings across all hash keys.
    pub fn posting_count(&self) -> usize {
        self.read_inner().postings.posting_count()
    }

    /// Drop every file, posting, and statistic. Configuration survives.
    pub fn clear(&self) {
        let mut inner = self.write_inner();
        inner.files.clear();
        inner.postings.clear();
    }

    /// The comparator configuration snapshot current right now.
    pub fn comparator_config(&self) -> Arc<ComparatorConfig> {
        self.comparator_cfg
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the whole comparator configuration snapshot.
    pub fn set_comparator_config(&self, cfg: ComparatorConfig) -> Result<(), IndexError> {
        cfg.validate()?;
        *self.write_cfg() = Arc::new(cfg);
        Ok(())
    }

    /// Minimum similarity for duplicate verdicts.
    pub fn set_similarity_threshold(&self, threshold: f64) -> Result<(), IndexError> {
        self.update_config(|cfg| cfg.similarity_threshold = threshold)
    }

    /// Maximum bit error rate for duplicate verdicts.
    pub fn set_bit_error_threshold(&self, threshold: f64) -> Result<(), IndexError> {
        self.update_config(|cfg| cfg.bit_error_threshold = threshold)
    }

    /// Minimum overlapped words required for any comparison.
    pub fn set_minimum_overlap(&self, words: usize) -> Result<(), IndexError> {
        self.update_config(|cfg| cfg.minimum_overlap = words)
    }

    /// Half-range of the alignment offset search.
    pub fn set_max_alignment_offset(&self, words: usize) -> Result<(), IndexError> {
        self.update_config(|cfg| cfg.max_alignment_offset = words)
    }

    /// Stride of the coarse correlation search.
    pub fn set_alignment_step(&self, words: usize) -> Result<(), IndexError> {
        self.update_config(|cfg| cfg.alignment_step = words)
    }

    pub fn hash_threshold(&self) -> usize {
        self.hash_threshold.load(Ordering::Relaxed)
    }

    /// Minimum posting hits for candidate retrieval.
    pub fn set_hash_threshold(&self, threshold: usize) -> Result<(), IndexError> {
        if threshold < 1 {
            return Err(IndexError::InvalidHashThreshold);
        }
        self.hash_threshold.store(threshold, Ordering::Relaxed);
        Ok(())
    }

    /// Clone-mutate-validate-publish; queries keep the snapshot they
    /// captured at entry.
    fn update_config<F>(&self, mutate: F) -> Result<(), IndexError>
    where
        F: FnOnce(&mut ComparatorConfig),
    {
        let mut guard = self.write_cfg();
        let mut cfg = (**guard).clone();
        mutate(&mut cfg);
        cfg.validate()?;
        *guard = Arc::new(cfg);
        Ok(())
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, IndexInner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, IndexInner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cfg(&self) -> std::sync::RwLockWriteGuard<'_, Arc<ComparatorConfig>> {
        self.comparator_cfg
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
