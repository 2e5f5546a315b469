//! Error types for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure classes a decoder or the batch aggregator can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodeErrorKind {
    /// Path did not resolve to a readable file
    FileNotFound,
    /// Detector could not classify and the generic fallback still failed
    UnsupportedFormat,
    /// Header shorter than required or failed validation
    CorruptHeader,
    /// No complete data record recoverable
    TruncatedRecord,
    /// Integrity field did not match the data it covers
    ChecksumMismatch,
    /// Non-fatal: metadata recovered, waveform not
    PartialDecode,
    /// The input path list itself was empty
    EmptyBatch,
}

impl DecodeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeErrorKind::FileNotFound => "file not found",
            DecodeErrorKind::UnsupportedFormat => "unsupported format",
            DecodeErrorKind::CorruptHeader => "corrupt header",
            DecodeErrorKind::TruncatedRecord => "truncated record",
            DecodeErrorKind::ChecksumMismatch => "checksum mismatch",
            DecodeErrorKind::PartialDecode => "partial decode",
            DecodeErrorKind::EmptyBatch => "empty batch",
        }
    }

    /// Fatal kinds skip the file; non-fatal kinds only annotate it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DecodeErrorKind::PartialDecode)
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode failure tied to one source file.
///
/// Created by a decoder (or the aggregator, for I/O failures), consumed
/// by the aggregator's diagnostics log, never retried.
#[derive(Debug, Clone, Error)]
#[error("{kind} in {path}{}", offset_suffix(.offset))]
pub struct DecodeError {
    /// Offending file, as given to the aggregator
    pub path: String,
    pub kind: DecodeErrorKind,
    /// Byte offset into the source buffer where structure broke down
    pub offset: Option<usize>,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Re-targets the error at a fuller path. Decoders only see the
    /// filename; the aggregator restores the path it was handed.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

fn offset_suffix(offset: &Option<usize>) -> String {
    match offset {
        Some(o) => format!(" at byte {o}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_offset_when_present() {
        let err = DecodeError::new(DecodeErrorKind::CorruptHeader, "night.edf").with_offset(42);
        assert_eq!(err.to_string(), "corrupt header in night.edf at byte 42");

        let err = DecodeError::new(DecodeErrorKind::TruncatedRecord, "night.001");
        assert_eq!(err.to_string(), "truncated record in night.001");
    }

    #[test]
    fn test_retarget_path() {
        let err = DecodeError::new(DecodeErrorKind::FileNotFound, "a.edf").at("/data/a.edf");
        assert_eq!(err.path, "/data/a.edf");
    }

    #[test]
    fn test_only_partial_decode_is_non_fatal() {
        assert!(!DecodeErrorKind::PartialDecode.is_fatal());
        assert!(DecodeErrorKind::CorruptHeader.is_fatal());
        assert!(DecodeErrorKind::ChecksumMismatch.is_fatal());
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        let json = serde_json::to_string(&DecodeErrorKind::CorruptHeader).unwrap();
        assert_eq!(json, "\"corruptHeader\"");
    }
}
