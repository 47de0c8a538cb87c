//! Workspace umbrella crate for audio duplicate detection.
//!
//! The `audiodup` crate re-exports the fingerprint, comparator, and index
//! layers so applications can drive a whole duplicate scan through a single
//! dependency. Instrumented helpers such as [`add_file_with_metrics`] and
//! [`find_duplicates_with_metrics`] wrap the common "register everything,
//! then scan" flow, while [`default_index`] offers a process-wide index for
//! hosts that do not want to thread one through their call graph.
//!
//! ## Quick start
//!
//! ```
//! use audiodup::{Fingerprint, FingerprintIndex};
//!
//! # fn demo() -> Result<(), audiodup::ScanError> {
//! let index = FingerprintIndex::new();
//!
//! let words: Vec<u32> = (0..200u32).map(|i| i.wrapping_mul(2654435761)).collect();
//! let original = Fingerprint::new(words.clone(), 24.8, "take-1.flac")?;
//! let reissue = Fingerprint::new(words, 24.8, "take-1-reissue.flac")?;
//!
//! index.add_file("take-1.flac", original)?;
//! index.add_file("take-1-reissue.flac", reissue)?;
//!
//! let groups = index.find_all_duplicates()?;
//! assert_eq!(groups.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Metrics and structured logs can be captured by installing a
//! [`ScanMetrics`] recorder via [`set_scan_metrics`] and/or a
//! [`ScanEventLogger`] with [`set_scan_logger`]. Both hooks receive the
//! stage, outcome, latency, and file context of every instrumented
//! operation. [`KeyValueLogger`] is a ready-made logger that writes
//! `key="value"` lines to any writer. The hooks observe only the wrappers in
//! this crate; the index and comparator stay free of global state.
//!
//! ## Errors
//!
//! Failures produced by any layer converge on [`ScanError`], so callers can
//! distinguish fingerprint validation problems, configuration mistakes, and
//! index-boundary errors without depending on the individual workspace
//! crates.

pub use comparator::{
    ComparatorConfig, ComparatorError, FingerprintComparator, MatchResult, SegmentMatch,
    QUICK_FILTER_SLACK,
};
pub use fingerprint::preprocess::{
    should_double_short_clip, PreprocessConfig, PreprocessError,
};
pub use fingerprint::{
    bits, Fingerprint, FingerprintError, MAX_FINGERPRINT_WORDS, PRODUCER_SAMPLE_RATE,
};
pub use index::{
    DuplicateGroup, FileEntry, FileRef, FingerprintIndex, IndexEntry, IndexError,
    DEFAULT_HASH_THRESHOLD,
};

pub mod config;

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};

use crate::config::ConfigLoadError;

/// Errors that can occur while driving a duplicate scan.
#[derive(Debug)]
pub enum ScanError {
    Fingerprint(FingerprintError),
    Comparator(ComparatorError),
    Index(IndexError),
    ConfigLoad(ConfigLoadError),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Fingerprint(err) => write!(f, "fingerprint failure: {err}"),
            ScanError::Comparator(err) => write!(f, "comparator failure: {err}"),
            ScanError::Index(err) => write!(f, "index failure: {err}"),
            ScanError::ConfigLoad(err) => write!(f, "config load failure: {err}"),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScanError::Fingerprint(err) => Some(err),
            ScanError::Comparator(err) => Some(err),
            ScanError::Index(err) => Some(err),
            ScanError::ConfigLoad(err) => Some(err),
        }
    }
}

impl From<FingerprintError> for ScanError {
    fn from(value: FingerprintError) -> Self {
        ScanError::Fingerprint(value)
    }
}

impl From<ComparatorError> for ScanError {
    fn from(value: ComparatorError) -> Self {
        ScanError::Comparator(value)
    }
}

impl From<IndexError> for ScanError {
    fn from(value: IndexError) -> Self {
        ScanError::Index(value)
    }
}

impl From<ConfigLoadError> for ScanError {
    fn from(value: ConfigLoadError) -> Self {
        ScanError::ConfigLoad(value)
    }
}

/// Metrics observer for instrumented scan operations.
pub trait ScanMetrics: Send + Sync {
    fn record_ingest(&self, latency: Duration, result: Result<(), IndexError>);
    fn record_scan(&self, latency: Duration, result: Result<(), IndexError>);
}

/// Instrumented stage captured in observability events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Ingest,
    Scan,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanStage::Ingest => "ingest",
            ScanStage::Scan => "scan",
        };
        f.write_str(name)
    }
}

/// Outcome of an instrumented stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEventStatus {
    Success,
    Failure,
}

impl fmt::Display for ScanEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanEventStatus::Success => "success",
            ScanEventStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// Structured observation describing the outcome of a scan stage.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub stage: ScanStage,
    pub status: ScanEventStatus,
    pub latency: Duration,
    /// File path for ingestion events.
    pub file_path: Option<String>,
    /// Number of indexed files when the event fired.
    pub file_count: Option<usize>,
    /// Number of duplicate groups found by a scan event.
    pub group_count: Option<usize>,
    pub error: Option<String>,
}

impl ScanEvent {
    fn format_key_values(&self, include_timestamp: bool) -> String {
        let mut parts = Vec::new();
        if include_timestamp {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            parts.push(format!("timestamp=\"{ts}\""));
        }
        let stage = self.stage;
        parts.push(format!("stage={stage}"));
        let status = self.status;
        parts.push(format!("status={status}"));
        let latency_us = self.latency.as_micros();
        parts.push(format!("latency_us={latency_us}"));
        if let Some(file_path) = &self.file_path {
            let file_path = escape_kv(file_path);
            parts.push(format!("file_path=\"{file_path}\""));
        }
        if let Some(file_count) = self.file_count {
            parts.push(format!("file_count={file_count}"));
        }
        if let Some(group_count) = self.group_count {
            parts.push(format!("group_count={group_count}"));
        }
        if let Some(error) = &self.error {
            let error = escape_kv(error);
            parts.push(format!("error=\"{error}\""));
        }
        parts.join(" ")
    }
}

fn escape_kv(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Hook for emitting structured events per scan stage.
pub trait ScanEventLogger: Send + Sync {
    fn log(&self, event: &ScanEvent);
}

/// Simple key-value logger that writes structured events to any writer.
pub struct KeyValueLogger {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    include_timestamp: bool,
}

impl KeyValueLogger {
    /// Create a logger that writes to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Create a logger backed by the provided writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            include_timestamp: true,
        }
    }

    /// Toggle timestamp emission for the structured log line.
    pub fn with_timestamps(mut self, include_timestamp: bool) -> Self {
        self.include_timestamp = include_timestamp;
        self
    }
}

impl ScanEventLogger for KeyValueLogger {
    fn log(&self, event: &ScanEvent) {
        if let Ok(mut writer) = self.writer.lock() {
            let line = event.format_key_values(self.include_timestamp);
            let _ = writeln!(writer, "{line}");
        }
    }
}

/// Install or clear the global scan metrics recorder.
pub fn set_scan_metrics(recorder: Option<Arc<dyn ScanMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().expect("scan metrics lock poisoned");
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn ScanMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn ScanMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn ScanMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the structured scan event logger.
pub fn set_scan_logger(logger: Option<Arc<dyn ScanEventLogger>>) {
    let lock = logger_lock();
    let mut guard = lock.write().expect("scan logger lock poisoned");
    *guard = logger;
}

fn logger_lock() -> &'static RwLock<Option<Arc<dyn ScanEventLogger>>> {
    static LOGGER: OnceLock<RwLock<Option<Arc<dyn ScanEventLogger>>>> = OnceLock::new();
    LOGGER.get_or_init(|| RwLock::new(None))
}

fn scan_logger() -> Option<Arc<dyn ScanEventLogger>> {
    let guard = logger_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

fn emit_event(event: ScanEvent) {
    if let Some(logger) = scan_logger() {
        logger.log(&event);
    }
}

/// Register a fingerprint with metrics and event logging.
///
/// A failed file is reported through the hooks and excluded from the index;
/// the caller moves on to the next file.
pub fn add_file_with_metrics(
    target: &FingerprintIndex,
    file_path: &str,
    fingerprint: Fingerprint,
) -> Result<usize, IndexError> {
    let start = Instant::now();
    let result = target.add_file(file_path, fingerprint);
    let latency = start.elapsed();

    let error = result.as_ref().err().map(|err| err.to_string());
    emit_event(ScanEvent {
        stage: ScanStage::Ingest,
        status: if error.is_some() {
            ScanEventStatus::Failure
        } else {
            ScanEventStatus::Success
        },
        latency,
        file_path: Some(file_path.to_string()),
        file_count: Some(target.file_count()),
        group_count: None,
        error,
    });
    if let Some(recorder) = metrics_recorder() {
        recorder.record_ingest(latency, result.as_ref().map(|_| ()).map_err(Clone::clone));
    }

    result
}

/// Run parallel duplicate discovery with metrics and event logging.
pub fn find_duplicates_with_metrics(
    target: &FingerprintIndex,
    num_threads: Option<usize>,
) -> Result<Vec<DuplicateGroup>, IndexError> {
    let start = Instant::now();
    let result = target.find_all_duplicates_parallel(num_threads);
    let latency = start.elapsed();

    let error = result.as_ref().err().map(|err| err.to_string());
    emit_event(ScanEvent {
        stage: ScanStage::Scan,
        status: if error.is_some() {
            ScanEventStatus::Failure
        } else {
            ScanEventStatus::Success
        },
        latency,
        file_path: None,
        file_count: Some(target.file_count()),
        group_count: result.as_ref().ok().map(Vec::len),
        error,
    });
    if let Some(recorder) = metrics_recorder() {
        recorder.record_scan(latency, result.as_ref().map(|_| ()).map_err(Clone::clone));
    }

    result
}

/// Process-wide default index for hosts that do not pass one around.
///
/// The core never uses this; it exists for CLI-style convenience. Call
/// [`FingerprintIndex::clear`] between independent runs.
pub fn default_index() -> &'static FingerprintIndex {
    static INDEX: OnceLock<FingerprintIndex> = OnceLock::new();
    INDEX.get_or_init(FingerprintIndex::new)
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Build a deterministic synthetic collection and scan it.
///
/// Five files: a base recording, two lightly corrupted copies of it, and two
/// unrelated recordings. Useful for demos and integration smoke tests.
pub fn synthetic_scan_demo() -> Result<Vec<DuplicateGroup>, ScanError> {
    let target = FingerprintIndex::new();

    let mut state = 0x5EED_A0D1_0DEDu64;
    let base: Vec<u32> = (0..400).map(|_| splitmix64(&mut state) as u32).collect();

    let mut reissue = base.clone();
    for word in reissue.iter_mut().step_by(29) {
        *word ^= 1 << 25;
    }
    let mut radio_rip = base.clone();
    for word in radio_rip.iter_mut().step_by(41) {
        *word ^= 1 << 30;
    }
    let unrelated_a: Vec<u32> = (0..400).map(|_| splitmix64(&mut state) as u32).collect();
    let unrelated_b: Vec<u32> = (0..400).map(|_| splitmix64(&mut state) as u32).collect();

    let duration = 400.0 * 0.124;
    let files = vec![
        ("master.flac", base),
        ("reissue.flac", reissue),
        ("radio-rip.flac", radio_rip),
        ("other-track.flac", unrelated_a),
        ("live-set.flac", unrelated_b),
    ];
    for (path, words) in files {
        let fp = Fingerprint::new(words, duration, path)?;
        add_file_with_metrics(&target, path, fp)?;
    }

    Ok(find_duplicates_with_metrics(&target, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_fp(seed: u64, len: usize, name: &str) -> Fingerprint {
        let mut state = seed;
        let words: Vec<u32> = (0..len).map(|_| splitmix64(&mut state) as u32).collect();
        Fingerprint::new(words, len as f64 * 0.124, name).expect("valid fingerprint")
    }

    fn hooks_test_mutex() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[derive(Default)]
    struct CountingMetrics {
        events: Arc<RwLock<Vec<&'static str>>>,
    }

    impl CountingMetrics {
        fn snapshot(&self) -> Vec<&'static str> {
            self.events.read().unwrap().clone()
        }
    }

    impl ScanMetrics for CountingMetrics {
        fn record_ingest(&self, _latency: Duration, result: Result<(), IndexError>) {
            let label = if result.is_ok() {
                "ingest_ok"
            } else {
                "ingest_err"
            };
            self.events.write().unwrap().push(label);
        }

        fn record_scan(&self, _latency: Duration, result: Result<(), IndexError>) {
            let label = if result.is_ok() { "scan_ok" } else { "scan_err" };
            self.events.write().unwrap().push(label);
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        events: Arc<RwLock<Vec<ScanEvent>>>,
    }

    impl RecordingLogger {
        fn snapshot(&self) -> Vec<ScanEvent> {
            self.events.read().unwrap().clone()
        }
    }

    impl ScanEventLogger for RecordingLogger {
        fn log(&self, event: &ScanEvent) {
            self.events.write().unwrap().push(event.clone());
        }
    }

    #[test]
    fn metrics_recorder_tracks_ingest_and_scan() {
        let _guard = hooks_test_mutex()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let metrics = Arc::new(CountingMetrics::default());
        set_scan_metrics(Some(metrics.clone()));

        let target = FingerprintIndex::new();
        let base = random_fp(1, 200, "a.flac");
        let copy = Fingerprint::new(base.data().to_vec(), base.duration(), "b.flac").unwrap();
        add_file_with_metrics(&target, "a.flac", base).unwrap();
        add_file_with_metrics(&target, "b.flac", copy).unwrap();
        let groups = find_duplicates_with_metrics(&target, None).unwrap();
        assert_eq!(groups.len(), 1);

        let events = metrics.snapshot();
        assert_eq!(
            events
                .iter()
                .filter(|&label| *label == "ingest_ok")
                .count(),
            2
        );
        assert!(events.contains(&"scan_ok"));

        set_scan_metrics(None);
    }

    #[test]
    fn structured_logger_receives_stage_events() {
        let _guard = hooks_test_mutex()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let logger = Arc::new(RecordingLogger::default());
        set_scan_logger(Some(logger.clone()));

        let target = FingerprintIndex::new();
        add_file_with_metrics(&target, "a.flac", random_fp(2, 120, "a.flac")).unwrap();
        let _ = find_duplicates_with_metrics(&target, None).unwrap();

        let events = logger.snapshot();
        let stages: Vec<ScanStage> = events.iter().map(|event| event.stage).collect();
        assert_eq!(stages, vec![ScanStage::Ingest, ScanStage::Scan]);
        assert_eq!(events[0].file_path.as_deref(), Some("a.flac"));
        assert_eq!(events[1].group_count, Some(0));

        set_scan_logger(None);
    }

    #[test]
    fn failed_ingest_is_logged_and_scan_continues() {
        let _guard = hooks_test_mutex()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let logger = Arc::new(RecordingLogger::default());
        set_scan_logger(Some(logger.clone()));

        let target = FingerprintIndex::new();
        let bad: Fingerprint = serde_json::from_str(
            r#"{"data":[],"sample_rate":11025,"duration":1.0,"file_path":"x"}"#,
        )
        .unwrap();
        assert!(add_file_with_metrics(&target, "bad.flac", bad).is_err());
        add_file_with_metrics(&target, "good.flac", random_fp(3, 120, "good.flac")).unwrap();

        // The bad file is excluded and the collection is still scannable.
        assert_eq!(target.file_count(), 1);
        assert!(find_duplicates_with_metrics(&target, None).is_ok());

        let events = logger.snapshot();
        assert_eq!(events[0].status, ScanEventStatus::Failure);
        assert!(events[0].error.as_deref().unwrap().contains("empty"));

        set_scan_logger(None);
    }

    #[test]
    fn key_value_lines_escape_and_order_fields() {
        let event = ScanEvent {
            stage: ScanStage::Ingest,
            status: ScanEventStatus::Failure,
            latency: Duration::from_micros(250),
            file_path: Some("weird \"name\".flac".to_string()),
            file_count: Some(3),
            group_count: None,
            error: Some("line\nbreak".to_string()),
        };
        let line = event.format_key_values(false);
        assert_eq!(
            line,
            "stage=ingest status=failure latency_us=250 \
             file_path=\"weird \\\"name\\\".flac\" file_count=3 error=\"line\\nbreak\""
        );
    }

    #[test]
    fn default_index_is_shared_and_clearable() {
        let _guard = hooks_test_mutex()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let shared = default_index();
        shared.clear();
        shared
            .add_file("a.flac", random_fp(4, 64, "a.flac"))
            .unwrap();
        assert_eq!(default_index().file_count(), 1);
        shared.clear();
        assert_eq!(default_index().file_count(), 0);
    }

    #[test]
    fn demo_scan_finds_exactly_the_planted_group() {
        // The demo goes through the instrumented wrappers; hold the hook
        // mutex so it cannot leak events into the logger tests.
        let _guard = hooks_test_mutex()
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let groups = synthetic_scan_demo().expect("demo scan succeeds");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].file_ids, vec![0, 1, 2]);
        assert!(groups[0].avg_similarity > 0.9);
    }

    #[test]
    fn scan_error_wraps_every_layer() {
        let fingerprint_err: ScanError = FingerprintError::EmptyData.into();
        assert!(fingerprint_err.to_string().contains("fingerprint failure"));

        let index_err: ScanError = IndexError::NotInitialized.into();
        assert!(index_err.to_string().contains("index failure"));
        assert!(index_err.source().is_some());
    }
}
