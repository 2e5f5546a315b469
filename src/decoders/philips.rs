//! Philips Respironics decoder
//!
//! Chunked container: each chunk is {file-version u8, total length
//! u16 LE, chunk type u8, payload, additive checksum u8 over the
//! preceding chunk bytes}. Payload field semantics are vendor
//! documentation only, so the decoder validates framing and integrity,
//! then extracts metadata alone. It never invents measurement data:
//! unparseable structure downgrades to a metadata-only record instead
//! of failing the file, and the aggregator reports the downgrade as a
//! non-fatal diagnostic.

use tracing::debug;

use crate::cursor::Cursor;
use crate::dates::session_date_from_filename;
use crate::detect::PHILIPS_VERSIONS;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{SessionRecord, SourceFormat};

/// Anything shorter cannot hold a single framed chunk
pub const PHILIPS_MIN_LEN: usize = 16;

/// version + length + type
const CHUNK_HEADER_LEN: usize = 4;

pub fn decode_philips(bytes: &[u8], filename: &str) -> Result<SessionRecord, DecodeError> {
    if bytes.len() < PHILIPS_MIN_LEN {
        return Err(DecodeError::new(DecodeErrorKind::CorruptHeader, filename)
            .with_offset(bytes.len()));
    }

    match walk_chunks(bytes) {
        Ok(chunks) => {
            debug!(file = filename, chunks, "respironics container framed cleanly");
        }
        Err(ChunkFault::Framing { offset }) => {
            debug!(
                file = filename,
                offset, "unparseable respironics framing; downgrading to metadata"
            );
        }
        Err(ChunkFault::Checksum { offset }) => {
            return Err(DecodeError::new(DecodeErrorKind::ChecksumMismatch, filename)
                .with_offset(offset));
        }
    }

    // Chunk payload semantics are unavailable, so even a clean
    // container yields metadata only. The aggregator logs the
    // PartialDecode diagnostic for any non-generic record without a
    // waveform.
    Ok(SessionRecord::metadata_only(
        session_date_from_filename(filename),
        SourceFormat::PhilipsRespironics,
    ))
}

enum ChunkFault {
    Framing { offset: usize },
    Checksum { offset: usize },
}

/// Walks every chunk in the container, verifying framing and the
/// trailing additive checksums. Returns the chunk count.
fn walk_chunks(bytes: &[u8]) -> Result<usize, ChunkFault> {
    let mut cur = Cursor::new(bytes);
    let mut chunks = 0;

    while cur.remaining() > 0 {
        let start = cur.position();
        let framing = |_| ChunkFault::Framing { offset: start };

        let version = cur.read_u8().map_err(framing)?;
        if !PHILIPS_VERSIONS.contains(&version) {
            return Err(ChunkFault::Framing { offset: start });
        }
        let length = cur.read_u16_le().map_err(framing)? as usize;
        if length < CHUNK_HEADER_LEN + 1 || length > bytes.len() - start {
            return Err(ChunkFault::Framing { offset: start });
        }
        let _chunk_type = cur.read_u8().map_err(framing)?;
        cur.skip(length - CHUNK_HEADER_LEN - 1).map_err(framing)?;

        let checksum_offset = cur.position();
        let stored = cur.read_u8().map_err(framing)?;
        let computed = additive_checksum(&bytes[start..checksum_offset]);
        if stored != computed {
            return Err(ChunkFault::Checksum {
                offset: checksum_offset,
            });
        }
        chunks += 1;
    }

    Ok(chunks)
}

fn additive_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}
