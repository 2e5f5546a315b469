//! ResMed S9 decoder (EDF+ layout)
//!
//! S9 nightly logs follow the European Data Format: a fixed 256-byte
//! ASCII header, a field-major signal subheader (256 bytes per
//! signal), then data records of interleaved 16-bit little-endian
//! channel samples. Digital values map to physical units through the
//! per-signal linear calibration declared in the subheader.
//!
//! The decoder tolerates a trailing partial record by dropping it and
//! reports `TruncatedRecord` only when no complete record exists.

use chrono::NaiveDate;
use tracing::debug;

use crate::cursor::{Cursor, ShortRead};
use crate::dates::{session_date_from_filename, UNKNOWN_DATE};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::normalize::CANONICAL_SAMPLE_INTERVAL_MINUTES;
use crate::types::{SessionRecord, SourceFormat};

pub const EDF_HEADER_LEN: usize = 256;

/// Per-signal subheader size (field-major across signals)
const SIGNAL_HEADER_LEN: usize = 256;

const FALLBACK_INTERVAL_MINUTES: f64 = 1.0;

struct EdfHeader {
    start_date: Option<NaiveDate>,
    /// -1 when the recording did not finalize the count
    data_records: i64,
    record_duration_secs: f64,
    signal_count: usize,
}

struct EdfSignal {
    label: String,
    physical_min: f64,
    physical_max: f64,
    digital_min: i32,
    digital_max: i32,
    samples_per_record: usize,
}

impl EdfSignal {
    /// Linear digital→physical mapping over the declared ranges
    fn to_physical(&self, digital: i16) -> f64 {
        let digital_range = (self.digital_max - self.digital_min) as f64;
        if digital_range == 0.0 {
            return self.physical_min;
        }
        let gain = (self.physical_max - self.physical_min) / digital_range;
        self.physical_min + gain * (digital as i32 - self.digital_min) as f64
    }
}

pub fn decode_resmed_s9(bytes: &[u8], filename: &str) -> Result<SessionRecord, DecodeError> {
    if bytes.len() < EDF_HEADER_LEN {
        return Err(DecodeError::new(DecodeErrorKind::CorruptHeader, filename)
            .with_offset(bytes.len()));
    }

    let mut cur = Cursor::new(bytes);
    let header = parse_header(&mut cur, filename)?;
    let signals = parse_signal_headers(&mut cur, header.signal_count, filename)?;

    let pressure_idx = find_channel(&signals, &["press"]);
    let leak_idx = find_channel(&signals, &["leak", "lk"]);
    let ahi_idx = find_channel(&signals, &["ahi"]);

    let truncated = |e: ShortRead| {
        DecodeError::new(DecodeErrorKind::TruncatedRecord, filename).with_offset(e.offset)
    };

    let record_len: usize = signals.iter().map(|s| s.samples_per_record * 2).sum();
    let mut records_read = 0usize;
    let mut pressure_data = Vec::new();
    let mut leak_data = Vec::new();
    let mut ahi_samples = Vec::new();

    if record_len > 0 {
        while cur.remaining() >= record_len {
            if header.data_records >= 0 && records_read as i64 >= header.data_records {
                break;
            }
            for (idx, signal) in signals.iter().enumerate() {
                if Some(idx) == pressure_idx {
                    for _ in 0..signal.samples_per_record {
                        pressure_data.push(signal.to_physical(cur.read_i16_le().map_err(truncated)?));
                    }
                } else if Some(idx) == leak_idx {
                    for _ in 0..signal.samples_per_record {
                        leak_data.push(signal.to_physical(cur.read_i16_le().map_err(truncated)?));
                    }
                } else if Some(idx) == ahi_idx {
                    for _ in 0..signal.samples_per_record {
                        ahi_samples.push(signal.to_physical(cur.read_i16_le().map_err(truncated)?));
                    }
                } else {
                    cur.skip(signal.samples_per_record * 2).map_err(truncated)?;
                }
            }
            records_read += 1;
        }
        if cur.remaining() > 0 {
            debug!(file = filename, dropped = cur.remaining(), "dropping trailing partial record");
        }
    }

    if records_read == 0 {
        return Err(DecodeError::new(DecodeErrorKind::TruncatedRecord, filename)
            .with_offset(cur.position()));
    }

    // The waveform pair is all-or-nothing: lengths must match, so both
    // channels are required and must share one sampling rate.
    let waveforms = match (pressure_idx, leak_idx) {
        (Some(p), Some(l))
            if signals[p].samples_per_record == signals[l].samples_per_record =>
        {
            Some((pressure_data, leak_data, signals[p].samples_per_record))
        }
        _ => {
            debug!(file = filename, "pressure/leak channel pair unavailable; metadata only");
            None
        }
    };

    let usage_secs = records_read as f64 * header.record_duration_secs;
    let ahi = if ahi_samples.is_empty() {
        0.0
    } else {
        (ahi_samples.iter().sum::<f64>() / ahi_samples.len() as f64).max(0.0)
    };

    let date = match session_date_from_filename(filename) {
        d if d == UNKNOWN_DATE => header
            .start_date
            .map(|start| start.format("%Y-%m-%d").to_string())
            .unwrap_or(d),
        d => d,
    };

    let (pressure_data, leak_data, sample_interval_minutes) = match waveforms {
        Some((pressure, leak, samples_per_record)) => {
            let interval = header.record_duration_secs / (samples_per_record as f64 * 60.0);
            let interval = if interval > 0.0 {
                interval
            } else {
                FALLBACK_INTERVAL_MINUTES
            };
            (pressure, leak, interval)
        }
        None => (Vec::new(), Vec::new(), CANONICAL_SAMPLE_INTERVAL_MINUTES),
    };

    let avg_pressure = mean_or_zero(&pressure_data);
    let leak_rate = mean_or_zero(&leak_data);

    let mut record = SessionRecord {
        date,
        source_format: SourceFormat::ResMedS9,
        ahi,
        usage_hours: 0,
        usage_minutes: 0,
        avg_pressure,
        leak_rate,
        pressure_data,
        leak_data,
        sample_interval_minutes,
    };
    record.set_usage_minutes((usage_secs / 60.0).round() as u32);
    Ok(record)
}

fn parse_header(cur: &mut Cursor<'_>, filename: &str) -> Result<EdfHeader, DecodeError> {
    let corrupt = |e: ShortRead| {
        DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(e.offset)
    };

    let version = cur.ascii(8).map_err(corrupt)?;
    if version != "0" {
        return Err(DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(0));
    }
    // patient identification block; not carried into session records
    cur.skip(80).map_err(corrupt)?;
    let recording_id = cur.ascii(80).map_err(corrupt)?;
    let start_date = parse_start_date(&cur.ascii(8).map_err(corrupt)?);
    cur.skip(8).map_err(corrupt)?; // start time
    let declared_header_bytes = cur.ascii(8).map_err(corrupt)?.parse::<usize>().ok();
    cur.skip(44).map_err(corrupt)?; // reserved
    let data_records = cur.ascii(8).map_err(corrupt)?.parse::<i64>().unwrap_or(-1);
    let record_duration_secs = cur.ascii(8).map_err(corrupt)?.parse::<f64>().unwrap_or(0.0);
    let signal_count_offset = cur.position();
    let signal_count = cur
        .ascii(4)
        .map_err(corrupt)?
        .parse::<usize>()
        .map_err(|_| {
            DecodeError::new(DecodeErrorKind::CorruptHeader, filename)
                .with_offset(signal_count_offset)
        })?;

    // The declared size must cover this header plus the subheaders
    if let Some(declared) = declared_header_bytes {
        if declared != EDF_HEADER_LEN + signal_count * SIGNAL_HEADER_LEN {
            return Err(DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(184));
        }
    }

    debug!(recording = %recording_id, signals = signal_count, "parsed edf header");
    Ok(EdfHeader {
        start_date,
        data_records,
        record_duration_secs,
        signal_count,
    })
}

/// EDF start date is `dd.mm.yy` with the 1985 clipping-date pivot:
/// 85–99 → 19xx, 00–84 → 20xx.
fn parse_start_date(field: &str) -> Option<NaiveDate> {
    let mut parts = field.split('.');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let yy: i32 = parts.next()?.trim().parse().ok()?;
    let year = if (85..=99).contains(&yy) { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_signal_headers(
    cur: &mut Cursor<'_>,
    count: usize,
    filename: &str,
) -> Result<Vec<EdfSignal>, DecodeError> {
    let corrupt = |e: ShortRead| {
        DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(e.offset)
    };

    let mut labels = Vec::with_capacity(count);
    for _ in 0..count {
        labels.push(cur.ascii(16).map_err(corrupt)?);
    }
    cur.skip(count * 80).map_err(corrupt)?; // transducer types
    cur.skip(count * 8).map_err(corrupt)?; // physical dimensions

    let physical_min = numeric_column::<f64>(cur, count, 8, filename)?;
    let physical_max = numeric_column::<f64>(cur, count, 8, filename)?;
    let digital_min = numeric_column::<i32>(cur, count, 8, filename)?;
    let digital_max = numeric_column::<i32>(cur, count, 8, filename)?;
    cur.skip(count * 80).map_err(corrupt)?; // prefiltering
    let samples_per_record = numeric_column::<usize>(cur, count, 8, filename)?;
    cur.skip(count * 32).map_err(corrupt)?; // reserved

    Ok(labels
        .into_iter()
        .zip(physical_min)
        .zip(physical_max)
        .zip(digital_min)
        .zip(digital_max)
        .zip(samples_per_record)
        .map(
            |(((((label, physical_min), physical_max), digital_min), digital_max), spr)| EdfSignal {
                label,
                physical_min,
                physical_max,
                digital_min,
                digital_max,
                samples_per_record: spr,
            },
        )
        .collect())
}

/// One field-major column of fixed-width ASCII numbers, one per signal
fn numeric_column<T: std::str::FromStr>(
    cur: &mut Cursor<'_>,
    count: usize,
    width: usize,
    filename: &str,
) -> Result<Vec<T>, DecodeError> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = cur.position();
        let text = cur.ascii(width).map_err(|e| {
            DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(e.offset)
        })?;
        let value = text.parse::<T>().map_err(|_| {
            DecodeError::new(DecodeErrorKind::CorruptHeader, filename).with_offset(offset)
        })?;
        values.push(value);
    }
    Ok(values)
}

fn find_channel(signals: &[EdfSignal], prefixes: &[&str]) -> Option<usize> {
    signals.iter().position(|s| {
        let label = s.label.to_ascii_lowercase();
        prefixes.iter().any(|p| label.starts_with(p))
    })
}

fn mean_or_zero(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}
