//! Waveform normalization
//!
//! Decoders emit waveforms at whatever interval the vendor layout
//! dictates. This module reconciles them onto one canonical interval
//! so waveforms from different nights and formats are directly
//! comparable. Resampling is linear interpolation over the native
//! span; the grid never extends past the last native sample. Records
//! without a waveform pass through untouched — absence is preserved,
//! not synthesized.

use crate::types::SessionRecord;

/// Default spacing between waveform samples after normalization
pub const CANONICAL_SAMPLE_INTERVAL_MINUTES: f64 = 5.0;

/// Tolerance for "already at the canonical interval"
const INTERVAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct WaveformNormalizer {
    canonical_interval_minutes: f64,
}

impl Default for WaveformNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformNormalizer {
    pub fn new() -> Self {
        Self {
            canonical_interval_minutes: CANONICAL_SAMPLE_INTERVAL_MINUTES,
        }
    }

    /// `interval_minutes` must be finite and positive.
    pub fn with_interval(interval_minutes: f64) -> Self {
        debug_assert!(interval_minutes.is_finite() && interval_minutes > 0.0);
        Self {
            canonical_interval_minutes: interval_minutes,
        }
    }

    pub fn canonical_interval_minutes(&self) -> f64 {
        self.canonical_interval_minutes
    }

    /// Resamples the record's waveforms onto the canonical interval.
    ///
    /// No-op when the record carries no waveform, when it is already
    /// canonical, or when a single sample spans no duration to
    /// interpolate over. Idempotent: a canonical record round-trips
    /// unchanged.
    pub fn normalize(&self, record: SessionRecord) -> SessionRecord {
        if record.pressure_data.len() < 2
            || record.pressure_data.len() != record.leak_data.len()
        {
            return record;
        }
        if (record.sample_interval_minutes - self.canonical_interval_minutes).abs()
            < INTERVAL_EPSILON
        {
            return record;
        }

        let native = record.sample_interval_minutes;
        let pressure_data = resample(&record.pressure_data, native, self.canonical_interval_minutes);
        let leak_data = resample(&record.leak_data, native, self.canonical_interval_minutes);
        SessionRecord {
            pressure_data,
            leak_data,
            sample_interval_minutes: self.canonical_interval_minutes,
            ..record
        }
    }
}

/// Linear interpolation of `samples` (spaced `native` minutes apart)
/// onto a grid spaced `canonical` minutes apart over the same span.
/// The last grid point never exceeds the last native sample position.
fn resample(samples: &[f64], native: f64, canonical: f64) -> Vec<f64> {
    let span = (samples.len() - 1) as f64 * native;
    let count = (span / canonical).floor() as usize + 1;
    (0..count)
        .map(|k| {
            let position = k as f64 * canonical / native;
            let lo = (position.floor() as usize).min(samples.len() - 1);
            let hi = (lo + 1).min(samples.len() - 1);
            let frac = position - lo as f64;
            samples[lo] * (1.0 - frac) + samples[hi] * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFormat;
    use pretty_assertions::assert_eq;

    fn record_with(pressure: Vec<f64>, leak: Vec<f64>, interval: f64) -> SessionRecord {
        let mut record =
            SessionRecord::metadata_only("2024-01-15".to_string(), SourceFormat::ResMedAirSense10);
        record.pressure_data = pressure;
        record.leak_data = leak;
        record.sample_interval_minutes = interval;
        record
    }

    #[test]
    fn test_upsampled_record_interpolates_linearly() {
        // 10-minute native cadence onto the 5-minute canonical grid
        let record = record_with(vec![10.0, 20.0, 30.0], vec![0.0, 4.0, 8.0], 10.0);
        let normalized = WaveformNormalizer::new().normalize(record);

        assert_eq!(normalized.sample_interval_minutes, 5.0);
        assert_eq!(normalized.pressure_data, vec![10.0, 15.0, 20.0, 25.0, 30.0]);
        assert_eq!(normalized.leak_data, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_downsampling_never_extrapolates() {
        // 2-minute native cadence, 5 samples spanning 8 minutes
        let record = record_with(
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![5.0, 4.0, 3.0, 2.0, 1.0],
            2.0,
        );
        let normalized = WaveformNormalizer::new().normalize(record);

        // grid points at 0 and 5 minutes only; 10 would pass the end
        assert_eq!(normalized.pressure_data.len(), 2);
        assert_eq!(normalized.pressure_data[0], 1.0);
        assert_eq!(normalized.pressure_data[1], 3.5);
        assert_eq!(normalized.leak_data, vec![5.0, 2.5]);
    }

    #[test]
    fn test_waveform_lengths_stay_equal() {
        let record = record_with(vec![1.0; 7], vec![2.0; 7], 3.0);
        let normalized = WaveformNormalizer::new().normalize(record);
        assert_eq!(normalized.pressure_data.len(), normalized.leak_data.len());
    }

    #[test]
    fn test_idempotent_on_canonical_record() {
        let record = record_with(vec![10.0, 12.0, 11.0], vec![5.0, 5.5, 6.0], 10.0);
        let normalizer = WaveformNormalizer::new();
        let once = normalizer.normalize(record);
        let twice = normalizer.normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_waveform_passes_through() {
        let record = SessionRecord::metadata_only("2024-01-15".to_string(), SourceFormat::Generic);
        let normalized = WaveformNormalizer::new().normalize(record.clone());
        assert_eq!(record, normalized);
        assert!(normalized.pressure_data.is_empty());
    }

    #[test]
    fn test_single_sample_passes_through() {
        let record = record_with(vec![9.0], vec![3.0], 1.0);
        let normalized = WaveformNormalizer::new().normalize(record.clone());
        assert_eq!(record, normalized);
    }

    #[test]
    fn test_custom_interval() {
        let record = record_with(vec![0.0, 10.0], vec![0.0, 10.0], 2.0);
        let normalized = WaveformNormalizer::with_interval(1.0).normalize(record);
        assert_eq!(normalized.sample_interval_minutes, 1.0);
        assert_eq!(normalized.pressure_data, vec![0.0, 5.0, 10.0]);
    }
}
