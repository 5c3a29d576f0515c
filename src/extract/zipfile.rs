//! ZIP container handling
//!
//! Entry counts and declared sizes come from the central directory and are
//! untrusted: they are checked up front, and the selected entry is still
//! read through `read_bounded` so a mis-declared size cannot get past the
//! ceiling.

use super::{BoundedRead, ExtractionLimits, read_bounded};
use crate::errors::{IngestError, IngestResult};
use std::io::Cursor;
use zip::ZipArchive;

/// Return the bytes of the first `.xml` entry in the archive
pub(crate) fn extract_xml_entry(bytes: &[u8], limits: &ExtractionLimits) -> IngestResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        tracing::debug!("Failed to open ZIP archive: {}", e);
        IngestError::format("corrupt ZIP archive")
    })?;

    let entries = archive.len();
    if entries > limits.max_files_in_archive {
        tracing::warn!(
            "ZIP archive lists {} entries (limit {})",
            entries,
            limits.max_files_in_archive
        );
        return Err(IngestError::TooManyEntries {
            entries,
            limit: limits.max_files_in_archive,
        });
    }

    let mut declared_total: u64 = 0;
    let mut xml_entry: Option<(usize, u64)> = None;
    for index in 0..entries {
        let entry = archive.by_index_raw(index).map_err(|e| {
            tracing::debug!("Failed to read ZIP entry {}: {}", index, e);
            IngestError::format("corrupt ZIP archive")
        })?;
        declared_total = declared_total.saturating_add(entry.size());
        if xml_entry.is_none() && entry.name().to_ascii_lowercase().ends_with(".xml") {
            xml_entry = Some((index, entry.size()));
        }
    }

    if declared_total > limits.max_uncompressed_size {
        tracing::warn!(
            "ZIP archive declares {} uncompressed bytes (limit {})",
            declared_total,
            limits.max_uncompressed_size
        );
        return Err(IngestError::ArchiveBomb {
            limit: limits.max_uncompressed_size,
        });
    }

    let (index, declared) =
        xml_entry.ok_or_else(|| IngestError::format("no XML report inside ZIP archive"))?;

    if declared > limits.max_uncompressed_size {
        return Err(IngestError::ArchiveBomb {
            limit: limits.max_uncompressed_size,
        });
    }

    let mut entry = archive.by_index(index).map_err(|e| {
        tracing::debug!("Failed to open ZIP entry {}: {}", index, e);
        IngestError::format("unsupported or encrypted ZIP entry")
    })?;

    match read_bounded(&mut entry, limits.max_uncompressed_size, declared) {
        Ok(BoundedRead::Complete(xml)) => Ok(xml),
        Ok(BoundedRead::LimitExceeded { produced }) => {
            tracing::warn!(
                "ZIP entry declared {} bytes but produced over {} (stopped at {})",
                declared,
                limits.max_uncompressed_size,
                produced
            );
            Err(IngestError::ArchiveBomb {
                limit: limits.max_uncompressed_size,
            })
        }
        Err(e) => {
            tracing::debug!("Failed to inflate ZIP entry {}: {}", index, e);
            Err(IngestError::format("corrupt ZIP entry"))
        }
    }
}
