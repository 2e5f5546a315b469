//! Somnolog - ingestion engine for vendor sleep-therapy device logs
//!
//! Somnolog normalizes heterogeneous vendor binary log files into
//! structured session records through a one-way pipeline: format
//! detection → vendor decode → waveform normalization → batch
//! aggregation. An unknown or unsupported file degrades gracefully
//! instead of aborting a batch.
//!
//! ## Supported formats
//!
//! - **ResMed S9**: EDF+ header/signal-record layout
//! - **ResMed AirSense 10**: proprietary fixed-record binary
//! - **Philips Respironics**: chunked container (metadata extraction)
//! - **Generic fallback**: date-only extraction for unknown files

pub mod batch;
pub mod cursor;
pub mod dates;
pub mod decoders;
pub mod detect;
pub mod error;
pub mod normalize;
pub mod types;

pub use batch::{parse_all, parse_all_parallel, BatchOutcome, BatchSummary, CancelToken};
pub use dates::{session_date_from_filename, UNKNOWN_DATE};
pub use decoders::decode_with_format;
pub use detect::{detect, detect_file};
pub use error::{DecodeError, DecodeErrorKind};
pub use normalize::{WaveformNormalizer, CANONICAL_SAMPLE_INTERVAL_MINUTES};
pub use types::{Diagnostic, SessionRecord, SourceFormat};

/// Somnolog version reported by the CLI
pub const SOMNOLOG_VERSION: &str = env!("CARGO_PKG_VERSION");
