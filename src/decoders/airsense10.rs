//! ResMed AirSense 10 decoder
//!
//! Proprietary binary layout: a fixed 512-byte header followed by
//! 16-byte records of {u64 LE Unix-seconds timestamp, f32 LE pressure
//! sample, f32 LE leak sample}. Devices commonly flush partial
//! buffers, so a dangling partial record at end-of-buffer is discarded
//! silently rather than treated as corruption.

use tracing::debug;

use crate::cursor::Cursor;
use crate::dates::session_date_from_filename;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{SessionRecord, SourceFormat};

pub const AIRSENSE10_HEADER_LEN: usize = 512;
pub const AIRSENSE10_RECORD_LEN: usize = 16;

/// Sample interval assumed when the timestamps cannot establish one
const FALLBACK_INTERVAL_MINUTES: f64 = 1.0;

pub fn decode_airsense10(bytes: &[u8], filename: &str) -> Result<SessionRecord, DecodeError> {
    if bytes.len() < AIRSENSE10_HEADER_LEN {
        return Err(DecodeError::new(DecodeErrorKind::CorruptHeader, filename)
            .with_offset(bytes.len()));
    }

    let mut cur = Cursor::new(bytes);
    cur.skip(AIRSENSE10_HEADER_LEN)
        .map_err(|e| DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(e.offset))?;

    let mut timestamps = Vec::new();
    let mut pressure_data = Vec::new();
    let mut leak_data = Vec::new();

    while cur.remaining() >= AIRSENSE10_RECORD_LEN {
        let short = |e: crate::cursor::ShortRead| {
            DecodeError::new(DecodeErrorKind::TruncatedRecord, filename).with_offset(e.offset)
        };
        let timestamp = cur.read_u64_le().map_err(short)?;
        let pressure = cur.read_f32_le().map_err(short)?;
        let leak = cur.read_f32_le().map_err(short)?;

        timestamps.push(timestamp);
        pressure_data.push(pressure as f64);
        leak_data.push(leak as f64);
    }

    if pressure_data.is_empty() {
        return Err(DecodeError::new(DecodeErrorKind::TruncatedRecord, filename)
            .with_offset(AIRSENSE10_HEADER_LEN));
    }
    if cur.remaining() > 0 {
        debug!(
            file = filename,
            dropped = cur.remaining(),
            "discarding dangling partial record"
        );
    }

    let avg_pressure = mean(&pressure_data);
    let leak_rate = mean(&leak_data);
    let (sample_interval_minutes, usage_minutes) = timing(&timestamps);

    let mut record = SessionRecord {
        date: session_date_from_filename(filename),
        source_format: SourceFormat::ResMedAirSense10,
        ahi: 0.0, // the sample stream carries no event channel
        usage_hours: 0,
        usage_minutes: 0,
        avg_pressure,
        leak_rate,
        pressure_data,
        leak_data,
        sample_interval_minutes,
    };
    record.set_usage_minutes(usage_minutes);
    Ok(record)
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Derives the sample interval (minutes) and usage duration (whole
/// minutes) from the record timestamps. A single record, or a
/// non-advancing clock, yields the fallback interval and zero usage.
fn timing(timestamps: &[u64]) -> (f64, u32) {
    if timestamps.len() < 2 {
        return (FALLBACK_INTERVAL_MINUTES, 0);
    }
    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];
    if last <= first {
        return (FALLBACK_INTERVAL_MINUTES, 0);
    }
    let span_secs = (last - first) as f64;
    let interval = span_secs / ((timestamps.len() - 1) as f64 * 60.0);
    let usage = (span_secs / 60.0).round() as u32;
    (interval, usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer(records: &[(u64, f32, f32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RMA1");
        buf.resize(AIRSENSE10_HEADER_LEN, 0);
        for &(ts, pressure, leak) in records {
            buf.extend_from_slice(&ts.to_le_bytes());
            buf.extend_from_slice(&pressure.to_le_bytes());
            buf.extend_from_slice(&leak.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_three_records_average_and_lengths() {
        let buf = buffer(&[
            (1705276800, 10.0, 5.0),
            (1705276860, 11.0, 6.0),
            (1705276920, 12.0, 7.0),
        ]);
        let record = decode_airsense10(&buf, "20240115_000000.001").unwrap();

        assert_eq!(record.date, "2024-01-15");
        assert_eq!(record.avg_pressure, 11.0);
        assert_eq!(record.leak_rate, 6.0);
        assert_eq!(record.pressure_data, vec![10.0, 11.0, 12.0]);
        assert_eq!(record.leak_data, vec![5.0, 6.0, 7.0]);
        // 60-second cadence
        assert_eq!(record.sample_interval_minutes, 1.0);
        assert_eq!(record.usage_duration_minutes(), 2);
    }

    #[test]
    fn test_waveform_length_matches_whole_records() {
        for extra in [0usize, 1, 15] {
            let mut buf = buffer(&[(100, 10.0, 5.0), (160, 11.0, 6.0)]);
            buf.extend(std::iter::repeat(0xAB).take(extra));
            let record = decode_airsense10(&buf, "n.001").unwrap();
            let expected = (buf.len() - AIRSENSE10_HEADER_LEN) / AIRSENSE10_RECORD_LEN;
            assert_eq!(record.pressure_data.len(), expected);
            assert_eq!(record.leak_data.len(), expected);
        }
    }

    #[test]
    fn test_short_header_is_corrupt() {
        let err = decode_airsense10(&[0u8; 511], "n.001").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::CorruptHeader);
        assert_eq!(err.offset, Some(511));
    }

    #[test]
    fn test_header_only_is_truncated() {
        let buf = vec![0u8; AIRSENSE10_HEADER_LEN];
        let err = decode_airsense10(&buf, "n.001").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TruncatedRecord);

        // A partial record alone is no better
        let mut buf = vec![0u8; AIRSENSE10_HEADER_LEN];
        buf.extend_from_slice(&[0u8; 15]);
        let err = decode_airsense10(&buf, "n.001").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::TruncatedRecord);
    }

    #[test]
    fn test_single_record_gets_fallback_timing() {
        let buf = buffer(&[(1705276800, 9.5, 3.0)]);
        let record = decode_airsense10(&buf, "n.001").unwrap();
        assert_eq!(record.pressure_data.len(), 1);
        assert_eq!(record.sample_interval_minutes, 1.0);
        assert_eq!(record.usage_duration_minutes(), 0);
    }

    #[test]
    fn test_usage_splits_hours_and_minutes() {
        // 7h31m between first and last record
        let buf = buffer(&[(0, 10.0, 5.0), (451 * 60, 12.0, 6.0)]);
        let record = decode_airsense10(&buf, "n.001").unwrap();
        assert_eq!(record.usage_hours, 7);
        assert_eq!(record.usage_minutes, 31);
    }
}
