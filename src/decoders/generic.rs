//! Generic fallback decoder
//!
//! Used for files the detector could not classify. Extracts only the
//! date from the filename; waveform and numeric fields stay absent or
//! zero. Measurement data is never invented for an unknown layout.

use crate::dates::session_date_from_filename;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{SessionRecord, SourceFormat};

pub fn decode_generic(bytes: &[u8], filename: &str) -> Result<SessionRecord, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::new(DecodeErrorKind::UnsupportedFormat, filename));
    }
    Ok(SessionRecord::metadata_only(
        session_date_from_filename(filename),
        SourceFormat::Generic,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::UNKNOWN_DATE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zero_byte_file_is_unsupported() {
        let err = decode_generic(&[], "empty.bin").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnsupportedFormat);
        assert_eq!(err.path, "empty.bin");
    }

    #[test]
    fn test_extracts_date_only() {
        let record = decode_generic(b"opaque vendor blob", "export_20240115.bin").unwrap();
        assert_eq!(record.date, "2024-01-15");
        assert_eq!(record.source_format, SourceFormat::Generic);
        assert!(record.pressure_data.is_empty());
        assert!(record.leak_data.is_empty());
        assert_eq!(record.ahi, 0.0);
        assert_eq!(record.avg_pressure, 0.0);
        assert_eq!(record.usage_duration_minutes(), 0);
    }

    #[test]
    fn test_undated_filename_gets_sentinel() {
        let record = decode_generic(b"blob", "mystery.bin").unwrap();
        assert_eq!(record.date, UNKNOWN_DATE);
    }
}
