//! Typed failures for the ingestion pipeline
//!
//! Every variant carries either a static reason or plain byte/entry counts,
//! so the `Display` output is always safe to hand back to a caller. Detailed
//! diagnostics (parser messages, archive library errors) are logged through
//! `tracing` at the point of failure and never stored in the error itself.

use thiserror::Error;

/// Coarse grouping used for logging and presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The upload is not something we can process (wrong type, no XML inside).
    Input,
    /// The upload tripped one of the resource ceilings.
    Security,
    /// The XML could not be turned into a report.
    Parse,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Security => "security",
            ErrorCategory::Parse => "parse",
        };
        f.write_str(s)
    }
}

/// Failure raised while extracting or decoding a single upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("unsupported report file: {reason}")]
    Format { reason: &'static str },

    #[error("file too large ({size} bytes); maximum is {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("uncompressed content exceeds {limit} bytes; possible archive bomb")]
    ArchiveBomb { limit: u64 },

    #[error("archive contains too many files ({entries}); maximum is {limit}")]
    TooManyEntries { entries: usize, limit: usize },

    #[error("malformed report XML: {reason}")]
    MalformedXml { reason: &'static str },

    #[error("report does not name a policy domain")]
    MissingDomain,
}

impl IngestError {
    pub fn format(reason: &'static str) -> Self {
        IngestError::Format { reason }
    }

    pub fn malformed(reason: &'static str) -> Self {
        IngestError::MalformedXml { reason }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Format { .. } => ErrorCategory::Input,
            IngestError::SizeLimitExceeded { .. }
            | IngestError::ArchiveBomb { .. }
            | IngestError::TooManyEntries { .. } => ErrorCategory::Security,
            IngestError::MalformedXml { .. } | IngestError::MissingDomain => ErrorCategory::Parse,
        }
    }

    /// Short stable label, suitable for log fields and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Format { .. } => "format_error",
            IngestError::SizeLimitExceeded { .. } => "size_limit_exceeded",
            IngestError::ArchiveBomb { .. } => "archive_bomb",
            IngestError::TooManyEntries { .. } => "too_many_entries",
            IngestError::MalformedXml { .. } => "malformed_xml",
            IngestError::MissingDomain => "missing_domain",
        }
    }
}

/// Result type alias for the ingestion pipeline
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(IngestError::format("x").category(), ErrorCategory::Input);
        assert_eq!(
            IngestError::ArchiveBomb { limit: 1 }.category(),
            ErrorCategory::Security
        );
        assert_eq!(
            IngestError::TooManyEntries { entries: 11, limit: 10 }.category(),
            ErrorCategory::Security
        );
        assert_eq!(IngestError::MissingDomain.category(), ErrorCategory::Parse);
        assert_eq!(ErrorCategory::Security.to_string(), "security");
    }

    #[test]
    fn test_messages_are_summaries() {
        let err = IngestError::SizeLimitExceeded {
            size: 10 * 1024 * 1024 + 1,
            limit: 10 * 1024 * 1024,
        };
        assert_eq!(
            err.to_string(),
            "file too large (10485761 bytes); maximum is 10485760 bytes"
        );
        assert_eq!(
            IngestError::malformed("document is not well-formed").to_string(),
            "malformed report XML: document is not well-formed"
        );
        assert_eq!(IngestError::MissingDomain.kind(), "missing_domain");
    }
}
