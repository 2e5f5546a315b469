//! Session date extraction from device filenames
//!
//! Every decoder resolves the session date the same way: scan the
//! filename for an 8-digit `YYYYMMDD` run. Vendors that embed a date
//! in the file header use it only as a fallback.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Sentinel date when no calendar date can be recovered for a session
pub const UNKNOWN_DATE: &str = "unknown-date";

fn date_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})(\d{2})(\d{2})").expect("static pattern"))
}

/// Extracts a session date from a filename like `20240115_123456.edf`,
/// formatted `YYYY-MM-DD`. The first 8-digit run forming a real
/// calendar date wins; filenames without one yield [`UNKNOWN_DATE`].
pub fn session_date_from_filename(filename: &str) -> String {
    for caps in date_run().captures_iter(filename) {
        let y: i32 = caps[1].parse().unwrap_or(0);
        let m: u32 = caps[2].parse().unwrap_or(0);
        let d: u32 = caps[3].parse().unwrap_or(0);
        if NaiveDate::from_ymd_opt(y, m, d).is_some() {
            return format!("{y:04}-{m:02}-{d:02}");
        }
    }
    UNKNOWN_DATE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extracts_date_from_typical_export_name() {
        assert_eq!(session_date_from_filename("20240115_123456.edf"), "2024-01-15");
    }

    #[test]
    fn test_no_digit_run_yields_sentinel() {
        assert_eq!(session_date_from_filename("night_data.edf"), UNKNOWN_DATE);
        assert_eq!(session_date_from_filename(""), UNKNOWN_DATE);
    }

    #[test]
    fn test_first_valid_run_wins() {
        assert_eq!(
            session_date_from_filename("backup_20231231_20240101.001"),
            "2023-12-31"
        );
    }

    #[test]
    fn test_invalid_calendar_run_is_skipped() {
        // 9999-99-99 is not a date; the later run is
        assert_eq!(session_date_from_filename("v99999999_20240229.001"), "2024-02-29");
        assert_eq!(session_date_from_filename("v99999999.001"), UNKNOWN_DATE);
    }
}
