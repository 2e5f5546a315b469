//! Vendor decoders
//!
//! One decoder per supported format, each a pure function from raw
//! bytes to a session record or a structured decode error. Dispatch is
//! an exhaustive match over the format tag, so adding a vendor means
//! adding a variant and one decoder module.

mod airsense10;
mod generic;
mod philips;
mod resmed_s9;

pub use airsense10::{decode_airsense10, AIRSENSE10_HEADER_LEN, AIRSENSE10_RECORD_LEN};
pub use generic::decode_generic;
pub use philips::{decode_philips, PHILIPS_MIN_LEN};
pub use resmed_s9::{decode_resmed_s9, EDF_HEADER_LEN};

use crate::error::DecodeError;
use crate::types::{SessionRecord, SourceFormat};

/// Decodes `bytes` with the decoder matching `format`.
///
/// `filename` is only consulted for date extraction; decoders never
/// touch the filesystem.
pub fn decode_with_format(
    format: SourceFormat,
    bytes: &[u8],
    filename: &str,
) -> Result<SessionRecord, DecodeError> {
    match format {
        SourceFormat::ResMedS9 => decode_resmed_s9(bytes, filename),
        SourceFormat::ResMedAirSense10 => decode_airsense10(bytes, filename),
        SourceFormat::PhilipsRespironics => decode_philips(bytes, filename),
        SourceFormat::Generic => decode_generic(bytes, filename),
    }
}
