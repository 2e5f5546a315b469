//! Core types for the ingestion pipeline
//!
//! This module defines the structures that flow through each stage:
//! the vendor format tag, the per-night session record, and the
//! per-file diagnostic surfaced alongside the record collection.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeErrorKind};

/// Vendor format tag for provenance tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    #[serde(rename = "resmed-s9")]
    ResMedS9,
    #[serde(rename = "resmed-airsense10")]
    ResMedAirSense10,
    #[serde(rename = "philips-respironics")]
    PhilipsRespironics,
    #[serde(rename = "generic")]
    Generic,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::ResMedS9 => "resmed-s9",
            SourceFormat::ResMedAirSense10 => "resmed-airsense10",
            SourceFormat::PhilipsRespironics => "philips-respironics",
            SourceFormat::Generic => "generic",
        }
    }
}

/// One night of therapy, normalized across vendor formats.
///
/// Serialized field names are the wire contract consumed by the
/// reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Calendar date (`YYYY-MM-DD`), or the `unknown-date` sentinel
    pub date: String,
    #[serde(rename = "sourceFormat")]
    pub source_format: SourceFormat,
    /// Apnea-hypopnea index, events per hour of use
    pub ahi: f64,
    #[serde(rename = "usageHours")]
    pub usage_hours: u32,
    /// Minutes component of the usage duration, always in 0..=59
    #[serde(rename = "usageMinutes")]
    pub usage_minutes: u32,
    /// Mean therapy pressure, cmH2O
    #[serde(rename = "avgPressure")]
    pub avg_pressure: f64,
    /// Mean mask leak, L/min
    #[serde(rename = "leakRate")]
    pub leak_rate: f64,
    #[serde(rename = "pressureData")]
    pub pressure_data: Vec<f64>,
    /// Always the same length as `pressure_data`
    #[serde(rename = "leakData")]
    pub leak_data: Vec<f64>,
    /// Spacing between waveform samples, minutes
    #[serde(rename = "sampleIntervalMinutes")]
    pub sample_interval_minutes: f64,
}

impl SessionRecord {
    /// A record carrying only what could honestly be extracted: the
    /// date. Waveforms stay empty and numeric fields zero rather than
    /// being invented.
    pub fn metadata_only(date: String, source_format: SourceFormat) -> Self {
        Self {
            date,
            source_format,
            ahi: 0.0,
            usage_hours: 0,
            usage_minutes: 0,
            avg_pressure: 0.0,
            leak_rate: 0.0,
            pressure_data: Vec::new(),
            leak_data: Vec::new(),
            sample_interval_minutes: crate::normalize::CANONICAL_SAMPLE_INTERVAL_MINUTES,
        }
    }

    /// Splits a total-minutes duration into the hours/minutes pair,
    /// keeping the minutes component in 0..=59.
    pub fn set_usage_minutes(&mut self, total_minutes: u32) {
        self.usage_hours = total_minutes / 60;
        self.usage_minutes = total_minutes % 60;
    }

    pub fn usage_duration_minutes(&self) -> u32 {
        self.usage_hours * 60 + self.usage_minutes
    }

    pub fn has_waveform(&self) -> bool {
        !self.pressure_data.is_empty()
    }
}

/// Per-file diagnostic surfaced to logging/telemetry collaborators.
///
/// Emitted for failed and downgraded files alike; never silently
/// dropped by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    #[serde(rename = "errorKind")]
    pub kind: DecodeErrorKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, kind: DecodeErrorKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_error(err: &DecodeError) -> Self {
        Self {
            path: err.path.clone(),
            kind: err.kind,
            detail: err.to_string(),
        }
    }
}
