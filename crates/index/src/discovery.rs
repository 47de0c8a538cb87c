//! All-groups duplicate discovery over an indexed collection.
//!
//! Each file queries the inverted index for candidates and confirms them
//! with the comparator, proposing a group when at least one candidate
//! matches. The shared `processed` set is read without synchronization and
//! only prunes work; correctness comes from the union-find merge over all
//! proposals, which produces the final disjoint groups regardless of how
//! the proposals raced.

use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use comparator::FingerprintComparator;

use crate::IndexInner;

/// Comparator cost varies a lot per file, so keep rayon's work units small.
const DISCOVERY_CHUNK: usize = 4;

/// A set of mutually duplicate files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup {
    /// Member file ids, ascending. Always at least two.
    pub file_ids: Vec<usize>,
    /// Mean pairwise comparator similarity over all unordered member pairs.
    pub avg_similarity: f64,
}

/// Union-find over file ids, used to merge overlapping group proposals.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // Path halving keeps the trees flat without a second pass.
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Run discovery over every file and return the final disjoint groups.
pub(crate) fn discover(
    inner: &IndexInner,
    comparator: &FingerprintComparator,
    hash_threshold: usize,
    parallel: bool,
) -> Vec<DuplicateGroup> {
    let file_count = inner.files.len();
    let processed: Vec<AtomicBool> = (0..file_count).map(|_| AtomicBool::new(false)).collect();

    let propose = |file_id: usize| -> Option<Vec<usize>> {
        if processed[file_id].load(Ordering::Relaxed) {
            return None;
        }
        let query = inner.files[file_id].fingerprint();
        let candidates = inner.postings.candidates(query, hash_threshold);

        let mut group = vec![file_id];
        for candidate in candidates {
            if candidate == file_id || processed[candidate].load(Ordering::Relaxed) {
                continue;
            }
            let Some(entry) = inner.files.get(candidate) else {
                continue;
            };
            if comparator.compare(query, entry.fingerprint()).is_duplicate {
                group.push(candidate);
            }
        }

        if group.len() >= 2 {
            for &member in &group {
                processed[member].store(true, Ordering::Relaxed);
            }
            Some(group)
        } else {
            processed[file_id].store(true, Ordering::Relaxed);
            None
        }
    };

    let proposals: Vec<Vec<usize>> = if parallel {
        (0..file_count)
            .into_par_iter()
            .with_max_len(DISCOVERY_CHUNK)
            .filter_map(propose)
            .collect()
    } else {
        (0..file_count).filter_map(propose).collect()
    };

    merge_proposals(inner, comparator, &proposals, file_count)
}

/// Union overlapping proposals into disjoint groups, attach statistics, and
/// order the output deterministically.
fn merge_proposals(
    inner: &IndexInner,
    comparator: &FingerprintComparator,
    proposals: &[Vec<usize>],
    file_count: usize,
) -> Vec<DuplicateGroup> {
    let mut dsu = UnionFind::new(file_count);
    let mut grouped = vec![false; file_count];
    for proposal in proposals {
        for &member in proposal {
            grouped[member] = true;
        }
        for pair in proposal.windows(2) {
            dsu.union(pair[0], pair[1]);
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for file_id in 0..file_count {
        if grouped[file_id] {
            let root = dsu.find(file_id);
            components.entry(root).or_default().push(file_id);
        }
    }

    let mut groups: Vec<DuplicateGroup> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|mut members| {
            members.sort_unstable();
            let avg_similarity = average_similarity(inner, comparator, &members);
            DuplicateGroup {
                file_ids: members,
                avg_similarity,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.avg_similarity
            .partial_cmp(&a.avg_similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_ids[0].cmp(&b.file_ids[0]))
    });
    groups
}

fn average_similarity(
    inner: &IndexInner,
    comparator: &FingerprintComparator,
    members: &[usize],
) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, &left) in members.iter().enumerate() {
        for &right in &members[i + 1..] {
            let (Some(a), Some(b)) = (inner.files.get(left), inner.files.get(right)) else {
                continue;
            };
            total += comparator
                .compare(a.fingerprint(), b.fingerprint())
                .similarity_score;
            pairs += 1;
        }
    }
    if pairs > 0 {
        total / pairs as f64
    } else {
        0.0
    }
}
