//! GZIP stream handling
//!
//! Decompression is incremental: output is produced in chunks and the read
//! stops the moment the running total passes the ceiling. Concatenated
//! members are treated as one stream, as `gzip -d` does.

use super::{BoundedRead, ExtractionLimits, read_bounded};
use crate::errors::{IngestError, IngestResult};
use flate2::read::MultiGzDecoder;

/// gzip magic bytes (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[inline]
pub fn is_gzip_magic(header: &[u8]) -> bool {
    header.len() >= 2 && header[0] == GZIP_MAGIC[0] && header[1] == GZIP_MAGIC[1]
}

pub(crate) fn decompress(bytes: &[u8], limits: &ExtractionLimits) -> IngestResult<Vec<u8>> {
    if !is_gzip_magic(bytes) {
        return Err(IngestError::format("not a GZIP stream"));
    }

    let mut decoder = MultiGzDecoder::new(bytes);
    // DMARC XML typically inflates 10-20x; `read_bounded` clamps the hint.
    let hint = (bytes.len() as u64).saturating_mul(16);

    match read_bounded(&mut decoder, limits.max_uncompressed_size, hint) {
        Ok(BoundedRead::Complete(xml)) => Ok(xml),
        Ok(BoundedRead::LimitExceeded { produced }) => {
            tracing::warn!(
                "GZIP stream of {} bytes inflated past {} bytes (stopped at {})",
                bytes.len(),
                limits.max_uncompressed_size,
                produced
            );
            Err(IngestError::ArchiveBomb {
                limit: limits.max_uncompressed_size,
            })
        }
        Err(e) => {
            tracing::debug!("Failed to inflate GZIP stream: {}", e);
            Err(IngestError::format("corrupt GZIP stream"))
        }
    }
}
