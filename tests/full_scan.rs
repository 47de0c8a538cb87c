//! End-to-end scan scenarios over the public crate surface: ingestion,
//! candidate retrieval, group discovery, and the padded-audio sliding-window
//! path.

use audiodup::{
    add_file_with_metrics, find_duplicates_with_metrics, Fingerprint, FingerprintComparator,
    FingerprintIndex,
};

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn random_words(seed: u64, len: usize) -> Vec<u32> {
    let mut state = seed;
    (0..len).map(|_| splitmix64(&mut state) as u32).collect()
}

fn fp(data: Vec<u32>, name: &str) -> Fingerprint {
    let duration = data.len() as f64 * 0.124;
    Fingerprint::new(data, duration, name).expect("valid fingerprint")
}

/// Flip one high bit every `stride` words; hash keys stay identical.
fn corrupt(words: &[u32], stride: usize) -> Vec<u32> {
    let mut data = words.to_vec();
    for word in data.iter_mut().step_by(stride) {
        *word ^= 1 << 28;
    }
    data
}

#[test]
fn scan_groups_three_encodings_of_one_recording() {
    let index = FingerprintIndex::new();
    let master = random_words(1, 300);

    add_file_with_metrics(&index, "master.flac", fp(master.clone(), "master.flac")).unwrap();
    add_file_with_metrics(
        &index,
        "reissue.flac",
        fp(corrupt(&master, 17), "reissue.flac"),
    )
    .unwrap();
    add_file_with_metrics(
        &index,
        "radio-rip.flac",
        fp(corrupt(&master, 23), "radio-rip.flac"),
    )
    .unwrap();
    add_file_with_metrics(&index, "y.flac", fp(random_words(2, 300), "y.flac")).unwrap();
    add_file_with_metrics(&index, "z.flac", fp(random_words(3, 300), "z.flac")).unwrap();

    let groups = find_duplicates_with_metrics(&index, Some(2)).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_ids, vec![0, 1, 2]);
    assert!(groups[0].avg_similarity >= 0.95);

    // The singletons are untouched and resolvable.
    assert_eq!(index.get_file(3).unwrap().file_path(), "y.flac");
    assert_eq!(index.get_file(4).unwrap().file_path(), "z.flac");
}

#[test]
fn chained_mutations_land_in_one_group() {
    // a ~ b and b ~ c through disjoint mutation sets; the union-find closure
    // must put all three in one group even though a and c differ the most.
    let index = FingerprintIndex::new();
    let a = random_words(10, 300);
    let mut b = a.clone();
    for word in b.iter_mut().take(150).step_by(15) {
        *word ^= 1 << 29;
    }
    let mut c = b.clone();
    for word in c.iter_mut().skip(150).step_by(15) {
        *word ^= 1 << 27;
    }

    index.add_file("a.flac", fp(a, "a.flac")).unwrap();
    index.add_file("b.flac", fp(b, "b.flac")).unwrap();
    index.add_file("c.flac", fp(c, "c.flac")).unwrap();

    let groups = index.find_all_duplicates().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_ids, vec![0, 1, 2]);
}

#[test]
fn groups_are_ordered_by_average_similarity() {
    let index = FingerprintIndex::new();

    // Cluster one: nearly identical pair.
    let tight = random_words(20, 250);
    index.add_file("tight-a.flac", fp(tight.clone(), "tight-a.flac")).unwrap();
    index
        .add_file("tight-b.flac", fp(corrupt(&tight, 101), "tight-b.flac"))
        .unwrap();

    // Cluster two: noticeably noisier pair.
    let loose = random_words(21, 250);
    index.add_file("loose-a.flac", fp(loose.clone(), "loose-a.flac")).unwrap();
    index
        .add_file("loose-b.flac", fp(corrupt(&loose, 3), "loose-b.flac"))
        .unwrap();

    let groups = index.find_all_duplicates().unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups[0].avg_similarity >= groups[1].avg_similarity);
    assert_eq!(groups[0].file_ids, vec![0, 1]);
    assert_eq!(groups[1].file_ids, vec![2, 3]);
}

#[test]
fn sliding_window_rescues_silence_padded_copies() {
    let comparator = FingerprintComparator::default();
    let a_words = random_words(30, 500);

    // 84 words (~10.4 s) of a constant silence pattern on both sides; 84 is
    // a multiple of the 6-word scan stride, so the B-side lattice can land
    // on the true alignment.
    let mut padded = vec![0u32; 84];
    padded.extend_from_slice(&a_words);
    padded.extend(std::iter::repeat(0u32).take(84));

    let a = fp(a_words, "a.flac");
    let b = fp(padded, "b-padded.flac");

    let windowed = comparator.compare_sliding_window(&a, &b);
    assert!(windowed.is_duplicate);
    assert_eq!(windowed.best_offset, 84);
    assert!(windowed.coverage_ratio >= 0.5);

    // The windowed similarity stays near perfect even though the plain
    // comparison sees the padding as part of the overlap.
    assert!(windowed.similarity_score >= 0.99);
}

#[test]
fn candidate_retrieval_ranks_closest_files_first() {
    let index = FingerprintIndex::new();
    let base = random_words(40, 200);

    index.add_file("base.flac", fp(base.clone(), "base.flac")).unwrap();
    index
        .add_file("identical.flac", fp(base.clone(), "identical.flac"))
        .unwrap();
    // Half the words replaced: fewer shared hash keys, still a candidate.
    let mut half = base.clone();
    let replacement = random_words(41, 200);
    half[..100].copy_from_slice(&replacement[..100]);
    index.add_file("half.flac", fp(half, "half.flac")).unwrap();

    let candidates = index.candidates(0).unwrap();
    let self_pos = candidates.iter().position(|&id| id == 0).unwrap();
    let identical_pos = candidates.iter().position(|&id| id == 1).unwrap();
    let half_pos = candidates.iter().position(|&id| id == 2).unwrap();

    // Self and the identical copy tie on hit count and order by id; the
    // half-replaced file trails both.
    assert!(self_pos < identical_pos);
    assert!(identical_pos < half_pos);
}

#[test]
fn scan_is_stable_across_clear_and_reload() {
    let index = FingerprintIndex::new();
    let base = random_words(50, 220);

    for round in 0..2 {
        index.add_file("a.flac", fp(base.clone(), "a.flac")).unwrap();
        index
            .add_file("b.flac", fp(corrupt(&base, 13), "b.flac"))
            .unwrap();

        let groups = index.find_all_duplicates().unwrap();
        assert_eq!(groups.len(), 1, "round {round}");
        assert_eq!(groups[0].file_ids, vec![0, 1], "round {round}");

        index.clear();
    }
}
