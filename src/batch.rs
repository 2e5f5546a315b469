//! Batch aggregation
//!
//! Drives detection, decoding, and normalization over an ordered list
//! of file paths. Per-file failures are isolated: one bad file never
//! aborts the batch. Record ordering mirrors input path ordering, and
//! every failed or downgraded file leaves a diagnostic.
//!
//! Decoding is embarrassingly parallel, so a worker-pool variant fans
//! the per-file pipeline out across threads: workers claim input
//! indices from an atomic counter and results reassemble into a slot
//! vector keyed by index, which preserves input order without locking
//! the accumulator. Cancellation is cooperative and checked between
//! files — a claimed file always runs to completion.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use tracing::{debug, warn};

use crate::decoders::decode_with_format;
use crate::detect::detect;
use crate::error::DecodeErrorKind;
use crate::normalize::WaveformNormalizer;
use crate::types::{Diagnostic, SessionRecord, SourceFormat};

/// Cooperative cancellation for a running batch.
///
/// Cancelling stops new files from being dispatched; in-flight files
/// finish and their results are kept.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one input file produced
#[derive(Debug, Clone, Default)]
struct FileOutcome {
    record: Option<SessionRecord>,
    diagnostic: Option<Diagnostic>,
}

/// Ordered session records plus the parallel diagnostics log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub records: Vec<SessionRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        let mut skip_reasons: Vec<(DecodeErrorKind, usize)> = Vec::new();
        let mut skipped = 0;
        let mut downgraded = 0;
        for diag in &self.diagnostics {
            match diag.kind {
                DecodeErrorKind::PartialDecode => downgraded += 1,
                DecodeErrorKind::EmptyBatch => {}
                kind => {
                    skipped += 1;
                    match skip_reasons.iter_mut().find(|(k, _)| *k == kind) {
                        Some((_, count)) => *count += 1,
                        None => skip_reasons.push((kind, 1)),
                    }
                }
            }
        }
        BatchSummary {
            parsed: self.records.len(),
            downgraded,
            skipped,
            skip_reasons,
        }
    }

    /// All records as one JSON array
    pub fn records_to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }

    /// One JSON object per line
    pub fn records_to_ndjson(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Parsed-versus-skipped counts for the caller's report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub parsed: usize,
    pub downgraded: usize,
    pub skipped: usize,
    /// Skip reasons in first-seen order, with per-kind counts
    pub skip_reasons: Vec<(DecodeErrorKind, usize)>,
}

/// Parses every path in order with the default canonical interval.
pub fn parse_all<P: AsRef<Path>>(paths: &[P]) -> BatchOutcome {
    parse_all_with(paths, &WaveformNormalizer::new())
}

pub fn parse_all_with<P: AsRef<Path>>(paths: &[P], normalizer: &WaveformNormalizer) -> BatchOutcome {
    if paths.is_empty() {
        return empty_batch_outcome();
    }
    let mut out = BatchOutcome::default();
    for path in paths {
        collect(process_path(path.as_ref(), normalizer), &mut out);
    }
    out
}

/// Worker-pool variant of [`parse_all`]. Output is identical for the
/// same inputs; only wall-clock differs.
pub fn parse_all_parallel<P: AsRef<Path> + Sync>(
    paths: &[P],
    workers: usize,
    cancel: &CancelToken,
) -> BatchOutcome {
    parse_all_parallel_with(paths, workers, cancel, &WaveformNormalizer::new())
}

pub fn parse_all_parallel_with<P: AsRef<Path> + Sync>(
    paths: &[P],
    workers: usize,
    cancel: &CancelToken,
    normalizer: &WaveformNormalizer,
) -> BatchOutcome {
    if paths.is_empty() {
        return empty_batch_outcome();
    }
    let workers = workers.clamp(1, paths.len());
    let next_index = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, FileOutcome)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next_index = &next_index;
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    debug!("batch cancelled; worker stops claiming files");
                    break;
                }
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                if index >= paths.len() {
                    break;
                }
                let outcome = process_path(paths[index].as_ref(), normalizer);
                if tx.send((index, outcome)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    // Reassemble by input index; cancelled slots simply stay empty.
    let mut slots: Vec<Option<FileOutcome>> = vec![None; paths.len()];
    for (index, outcome) in rx {
        slots[index] = Some(outcome);
    }
    let mut out = BatchOutcome::default();
    for slot in slots {
        if let Some(outcome) = slot {
            collect(outcome, &mut out);
        }
    }
    out
}

/// Detection → decode → normalization for one file. Pure given the
/// file's bytes; the only I/O is the read itself.
fn process_path(path: &Path, normalizer: &WaveformNormalizer) -> FileOutcome {
    let path_str = path.display().to_string();

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path_str, %err, "skipping unreadable file");
            return FileOutcome {
                record: None,
                diagnostic: Some(Diagnostic::new(
                    &path_str,
                    DecodeErrorKind::FileNotFound,
                    err.to_string(),
                )),
            };
        }
    };

    let format = detect(path, Some(&bytes[..bytes.len().min(crate::detect::SNIFF_LEN)]));
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_str.as_str());

    match decode_with_format(format, &bytes, filename) {
        Ok(record) => {
            let record = normalizer.normalize(record);
            let diagnostic = if format != SourceFormat::Generic && !record.has_waveform() {
                debug!(path = %path_str, format = format.as_str(), "waveform unavailable; metadata only");
                Some(Diagnostic::new(
                    &path_str,
                    DecodeErrorKind::PartialDecode,
                    format!("{} structure yielded no waveform; metadata only", format.as_str()),
                ))
            } else {
                None
            };
            FileOutcome {
                record: Some(record),
                diagnostic,
            }
        }
        Err(err) => {
            let err = err.at(&path_str);
            warn!(path = %path_str, %err, "decode failed");
            FileOutcome {
                record: None,
                diagnostic: Some(Diagnostic::from_error(&err)),
            }
        }
    }
}

fn collect(outcome: FileOutcome, out: &mut BatchOutcome) {
    if let Some(record) = outcome.record {
        out.records.push(record);
    }
    if let Some(diagnostic) = outcome.diagnostic {
        out.diagnostics.push(diagnostic);
    }
}

fn empty_batch_outcome() -> BatchOutcome {
    BatchOutcome {
        records: Vec::new(),
        diagnostics: vec![Diagnostic::new(
            "",
            DecodeErrorKind::EmptyBatch,
            "no input paths supplied",
        )],
    }
}
