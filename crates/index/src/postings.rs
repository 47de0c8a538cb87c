//! Inverted index over the low 16 bits of sub-fingerprint words.
//!
//! Each word of an inserted fingerprint contributes exactly one posting at
//! its 16-bit hash key, so posting lists grow in increasing position per
//! fingerprint and insertion order across fingerprints. Postings are
//! append-only; the only removal is a whole-index clear.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use fingerprint::Fingerprint;

/// Where a 16-bit hash occurred: which file, at which word position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_id: usize,
    pub position: usize,
}

/// `hash16 → postings` map with candidate tallying.
#[derive(Debug, Default)]
pub(crate) struct InvertedIndex {
    postings: HashMap<u16, Vec<IndexEntry>>,
    posting_count: usize,
}

impl InvertedIndex {
    /// Append one posting per word of `fp` under the word's 16-bit hash.
    /// Linear in the fingerprint length.
    pub(crate) fn insert(&mut self, file_id: usize, fp: &Fingerprint) {
        for (position, hash) in fp.hashes().enumerate() {
            self.postings
                .entry(hash)
                .or_default()
                .push(IndexEntry { file_id, position });
        }
        self.posting_count += fp.len();
    }

    /// File ids whose posting overlap with `fp` reaches `hash_threshold`.
    ///
    /// Every unique hash of the query contributes its full posting list to
    /// the tally, so files sharing a hash at several positions score several
    /// hits. Results are ordered by hit count descending, then file id
    /// ascending; the query's own file id (if indexed) is included.
    pub(crate) fn candidates(&self, fp: &Fingerprint, hash_threshold: usize) -> Vec<usize> {
        let mut unique: Vec<u16> = fp.hashes().collect();
        unique.sort_unstable();
        unique.dedup();

        let mut tallies: HashMap<usize, usize> = HashMap::new();
        for hash in unique {
            if let Some(list) = self.postings.get(&hash) {
                for entry in list {
                    *tallies.entry(entry.file_id).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = tallies
            .into_iter()
            .filter(|&(_, hits)| hits >= hash_threshold)
            .collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().map(|(file_id, _)| file_id).collect()
    }

    /// Postings stored under one hash key, in insertion order.
    pub(crate) fn postings_for(&self, hash: u16) -> &[IndexEntry] {
        self.postings.get(&hash).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct hash keys present.
    pub(crate) fn distinct_hashes(&self) -> usize {
        self.postings.len()
    }

    /// Total number of postings across all keys.
    pub(crate) fn posting_count(&self) -> usize {
        self.posting_count
    }

    pub(crate) fn clear(&mut self) {
        self.postings.clear();
        self.posting_count = 0;
    }
}
