//! Concurrency and thread safety tests for the duplicate scanner.

use std::sync::Arc;
use std::thread;

use audiodup::{Fingerprint, FingerprintComparator, FingerprintIndex};

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn random_fp(seed: u64, len: usize, name: &str) -> Fingerprint {
    let mut state = seed;
    let words: Vec<u32> = (0..len).map(|_| splitmix64(&mut state) as u32).collect();
    Fingerprint::new(words, len as f64 * 0.124, name).expect("valid fingerprint")
}

fn mutated_copy(base: &Fingerprint, stride: usize, name: &str) -> Fingerprint {
    let mut data = base.data().to_vec();
    for word in data.iter_mut().step_by(stride) {
        *word ^= 1 << 26;
    }
    Fingerprint::new(data, base.duration(), name).expect("valid fingerprint")
}

#[test]
fn concurrent_comparisons_agree() {
    let comparator = Arc::new(FingerprintComparator::default());
    let a = Arc::new(random_fp(1, 300, "a.flac"));
    let b = Arc::new(mutated_copy(&a, 13, "b.flac"));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let comparator = Arc::clone(&comparator);
            let a = Arc::clone(&a);
            let b = Arc::clone(&b);
            thread::spawn(move || comparator.compare(&a, &b))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &results[0];
    assert!(first.is_duplicate);
    for (i, result) in results.iter().enumerate().skip(1) {
        assert_eq!(
            first.similarity_score, result.similarity_score,
            "thread {i} produced a different similarity",
        );
        assert_eq!(
            first.best_offset, result.best_offset,
            "thread {i} produced a different offset",
        );
    }
}

#[test]
fn concurrent_ingestion_registers_every_file() {
    let index = Arc::new(FingerprintIndex::new());

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for file in 0..5u64 {
                    let seed = 100 + worker * 10 + file;
                    let name = format!("w{worker}-f{file}.flac");
                    let fp = random_fp(seed, 150, &name);
                    index.add_file(name, fp).expect("add_file succeeds");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.file_count(), 40);
    assert_eq!(index.posting_count(), 40 * 150);

    // Every id is resolvable after the racing writers are done.
    for file_id in 0..40 {
        assert!(index.get_file(file_id).is_some(), "file {file_id} missing");
    }
}

#[test]
fn readers_and_scans_share_the_index() {
    let index = Arc::new(FingerprintIndex::new());
    let base = random_fp(200, 250, "base.flac");
    index.add_file("base.flac", base.clone()).unwrap();
    index
        .add_file("copy.flac", mutated_copy(&base, 17, "copy.flac"))
        .unwrap();
    for extra in 0..6u64 {
        index
            .add_file(
                format!("extra-{extra}.flac"),
                random_fp(300 + extra, 250, "extra"),
            )
            .unwrap();
    }

    let scanner = {
        let index = Arc::clone(&index);
        thread::spawn(move || index.find_all_duplicates_parallel(Some(2)).unwrap())
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for file_id in 0..index.file_count() {
                    let entry = index.get_file(file_id).expect("entry exists");
                    assert!(!entry.fingerprint().is_empty());
                }
                index.candidates(0).unwrap()
            })
        })
        .collect();

    let groups = scanner.join().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_ids, vec![0, 1]);
    for reader in readers {
        let candidates = reader.join().unwrap();
        assert!(candidates.contains(&1));
    }
}

#[test]
fn configuration_changes_do_not_disturb_running_scans() {
    let index = Arc::new(FingerprintIndex::new());
    for cluster in 0..4u64 {
        let base = random_fp(400 + cluster, 200, "base");
        index
            .add_file(format!("{cluster}-a.flac"), base.clone())
            .unwrap();
        index
            .add_file(format!("{cluster}-b.flac"), mutated_copy(&base, 11, "b"))
            .unwrap();
    }

    let scans: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || index.find_all_duplicates_parallel(None).unwrap())
        })
        .collect();
    let setter = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for threshold in [0.86, 0.88, 0.9] {
                index.set_similarity_threshold(threshold).unwrap();
            }
        })
    };

    setter.join().unwrap();
    for scan in scans {
        // Each scan ran on whichever snapshot it captured at entry; with
        // these clear-cut clusters every snapshot yields the same grouping.
        let groups = scan.join().unwrap();
        assert_eq!(groups.len(), 4);
    }
    assert_eq!(index.comparator_config().similarity_threshold, 0.9);
}
