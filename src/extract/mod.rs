//! Archive extraction for incoming report attachments
//!
//! Reports arrive from untrusted senders as plain XML, ZIP archives or GZIP
//! streams. This module turns the raw bytes into bounded XML bytes:
//!
//! - the raw upload is size-checked before any decompression happens
//! - ZIP archives are checked for entry count and declared sizes, then the
//!   selected entry is streamed through a byte-count cutoff
//! - GZIP streams are decompressed incrementally with the same cutoff
//!
//! Declared archive metadata is never trusted on its own: every
//! decompression path stops as soon as produced bytes pass the ceiling, and
//! the output buffer never grows beyond it.

use crate::errors::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

mod gzip;
mod zipfile;

pub use gzip::{GZIP_MAGIC, is_gzip_magic};

/// Maximum raw upload size (10 MiB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum uncompressed XML size (100 MiB)
pub const MAX_UNCOMPRESSED_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of entries in a ZIP archive
pub const MAX_FILES_IN_ARCHIVE: usize = 10;

/// Filename suffixes accepted for report attachments
pub const ACCEPTED_SUFFIXES: [&str; 4] = [".xml", ".zip", ".gz", ".gzip"];

const READ_CHUNK: usize = 64 * 1024;

/// Most that a size hint may reserve up front (1 MiB)
const INITIAL_CAPACITY: usize = READ_CHUNK * 16;

/// Resource ceilings applied during extraction.
///
/// The defaults are the fixed interoperability limits. Configuration may
/// tighten them; `DmarcConfig::validate` refuses anything looser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    pub max_file_size: u64,
    pub max_uncompressed_size: u64,
    pub max_files_in_archive: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_uncompressed_size: MAX_UNCOMPRESSED_SIZE,
            max_files_in_archive: MAX_FILES_IN_ARCHIVE,
        }
    }
}

/// Container format, chosen from the declared filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Xml,
    Zip,
    Gzip,
}

impl ArchiveFormat {
    /// Detect the container from the filename suffix (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.trim().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".gz") || name.ends_with(".gzip") {
            Some(ArchiveFormat::Gzip)
        } else if name.ends_with(".xml") {
            Some(ArchiveFormat::Xml)
        } else {
            None
        }
    }
}

/// Extract report XML using the fixed default limits
pub fn extract(bytes: &[u8], filename: &str) -> IngestResult<Vec<u8>> {
    extract_with_limits(bytes, filename, &ExtractionLimits::default())
}

/// Extract report XML from a raw upload
///
/// # Errors
/// - `SizeLimitExceeded` when the raw upload is over `max_file_size`
/// - `Format` for unsupported suffixes, corrupt containers or empty content
/// - `TooManyEntries` / `ArchiveBomb` when a container trips the ceilings
pub fn extract_with_limits(
    bytes: &[u8],
    filename: &str,
    limits: &ExtractionLimits,
) -> IngestResult<Vec<u8>> {
    let size = bytes.len() as u64;
    if size > limits.max_file_size {
        tracing::warn!(
            "Rejecting {}: {} bytes exceeds raw limit of {} bytes",
            filename,
            size,
            limits.max_file_size
        );
        return Err(IngestError::SizeLimitExceeded {
            size,
            limit: limits.max_file_size,
        });
    }

    let format = ArchiveFormat::from_filename(filename).ok_or_else(|| {
        tracing::debug!("Rejecting {}: unsupported file suffix", filename);
        IngestError::format("expected a .xml, .zip, .gz or .gzip file")
    })?;

    let xml = match format {
        ArchiveFormat::Xml => bytes.to_vec(),
        ArchiveFormat::Zip => zipfile::extract_xml_entry(bytes, limits)?,
        ArchiveFormat::Gzip => gzip::decompress(bytes, limits)?,
    };

    if xml.is_empty() {
        return Err(IngestError::format("no XML content found"));
    }

    tracing::trace!(
        "Extracted {} bytes of XML from {} ({:?})",
        xml.len(),
        filename,
        format
    );
    Ok(xml)
}

/// Outcome of a capped read
#[derive(Debug)]
pub(crate) enum BoundedRead {
    Complete(Vec<u8>),
    LimitExceeded { produced: u64 },
}

/// Read a stream to the end, stopping once more than `limit` bytes appear.
///
/// `size_hint` seeds the initial capacity, clamped to both `limit` and
/// `INITIAL_CAPACITY`; a declared size alone never reserves more than that.
/// Growth follows the bytes actually produced and never exceeds `limit`.
pub(crate) fn read_bounded<R: Read>(
    reader: &mut R,
    limit: u64,
    size_hint: u64,
) -> io::Result<BoundedRead> {
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let initial = usize::try_from(size_hint)
        .unwrap_or(usize::MAX)
        .min(limit)
        .min(INITIAL_CAPACITY);
    let mut out = Vec::with_capacity(initial);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let produced = out.len() + n;
        if produced > limit {
            return Ok(BoundedRead::LimitExceeded {
                produced: produced as u64,
            });
        }

        if out.capacity() < produced {
            let target = out.capacity().saturating_mul(2).max(produced).min(limit);
            out.reserve_exact(target - out.len());
        }
        out.extend_from_slice(&chunk[..n]);
    }

    Ok(BoundedRead::Complete(out))
}
