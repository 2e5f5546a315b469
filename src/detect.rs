//! Format detection
//!
//! Classifies a file into a vendor format from its path and, for
//! extension families used ambiguously by multiple vendors, a magic
//! signature in the leading header bytes. Detection never fails:
//! unresolvable input classifies as [`SourceFormat::Generic`] so the
//! pipeline can still attempt best-effort extraction.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::types::SourceFormat;

/// Magic tag opening an AirSense 10 header
pub const AIRSENSE10_MAGIC: &[u8; 4] = b"RMA1";

/// File-version bytes a Respironics chunk container may open with
pub const PHILIPS_VERSIONS: [u8; 2] = [0x02, 0x03];

/// Header bytes [`detect`] needs to resolve an ambiguous extension
pub const SNIFF_LEN: usize = 4;

/// Classifies `path` into a vendor format.
///
/// Decision order: exact extension match first, then magic resolution
/// for the `.001` family shared by ResMed AirSense 10 and Philips
/// Respironics, then `Generic`.
pub fn detect(path: &Path, header: Option<&[u8]>) -> SourceFormat {
    match extension_of(path).as_deref() {
        Some("edf") => SourceFormat::ResMedS9,
        Some("001") => resolve_001(header),
        _ => SourceFormat::Generic,
    }
}

/// Classifies `path`, sniffing the leading header bytes from disk when
/// the extension alone is ambiguous. I/O failure during the sniff
/// degrades to extension-only classification rather than erroring.
pub fn detect_file(path: &Path) -> SourceFormat {
    let mut buf = [0u8; SNIFF_LEN];
    let header = if extension_of(path).as_deref() == Some("001") {
        match read_leading(path, &mut buf) {
            Ok(n) => Some(&buf[..n]),
            Err(err) => {
                debug!(path = %path.display(), %err, "header sniff failed");
                None
            }
        }
    } else {
        None
    };
    detect(path, header)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn resolve_001(header: Option<&[u8]>) -> SourceFormat {
    match header {
        Some(h) if h.len() >= AIRSENSE10_MAGIC.len() && h.starts_with(AIRSENSE10_MAGIC) => {
            SourceFormat::ResMedAirSense10
        }
        Some(h) if !h.is_empty() && PHILIPS_VERSIONS.contains(&h[0]) => {
            SourceFormat::PhilipsRespironics
        }
        _ => SourceFormat::Generic,
    }
}

fn read_leading(path: &Path, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut file = File::open(path)?;
    let mut filled = 0;
    // read() may return short; fill until EOF or the buffer is full
    loop {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 || filled + n == buf.len() {
            return Ok(filled + n);
        }
        filled += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_edf_extension_is_resmed_s9() {
        assert_eq!(
            detect(Path::new("20240115_123456.edf"), None),
            SourceFormat::ResMedS9
        );
        assert_eq!(
            detect(Path::new("NIGHT.EDF"), None),
            SourceFormat::ResMedS9
        );
    }

    #[test]
    fn test_001_resolved_by_magic() {
        let path = Path::new("20240115.001");
        assert_eq!(
            detect(path, Some(b"RMA1\x00\x00")),
            SourceFormat::ResMedAirSense10
        );
        assert_eq!(
            detect(path, Some(&[0x02, 0x10, 0x00])),
            SourceFormat::PhilipsRespironics
        );
        assert_eq!(
            detect(path, Some(&[0x03])),
            SourceFormat::PhilipsRespironics
        );
    }

    #[test]
    fn test_unresolvable_is_generic_never_error() {
        let path = Path::new("20240115.001");
        assert_eq!(detect(path, None), SourceFormat::Generic);
        assert_eq!(detect(path, Some(b"????")), SourceFormat::Generic);
        assert_eq!(detect(path, Some(&[])), SourceFormat::Generic);
        assert_eq!(detect(Path::new("notes.txt"), None), SourceFormat::Generic);
        assert_eq!(detect(Path::new("no_extension"), None), SourceFormat::Generic);
    }

    #[test]
    fn test_detect_file_sniffs_magic() {
        let dir = tempfile::tempdir().unwrap();
        let air = dir.path().join("20240115.001");
        std::fs::write(&air, b"RMA1 rest of header").unwrap();
        assert_eq!(detect_file(&air), SourceFormat::ResMedAirSense10);

        let missing = dir.path().join("absent.001");
        assert_eq!(detect_file(&missing), SourceFormat::Generic);
    }
}
