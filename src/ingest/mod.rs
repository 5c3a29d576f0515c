//! Ingestion pipeline: raw attachments in, stored reports out
//!
//! [`Ingestor`] drives extraction, decoding and storage for single uploads
//! and for batches (a mailbox scan, a multi-file upload). In a batch, every
//! item succeeds or fails on its own; one bad attachment never stops the
//! rest.
//!
//! Extraction and decoding run on the worker pool when the batch is large
//! enough. Reports are then added to the store in submission order, so the
//! policy a domain ends up with does not depend on thread scheduling.

use crate::config::{ExecutionMode, IngestConfig};
use crate::errors::{IngestError, IngestResult};
use crate::extract::{ACCEPTED_SUFFIXES, ExtractionLimits, extract_with_limits};
use crate::parallel::ExecutionStrategy;
use crate::report::{Report, decode};
use crate::store::StatsStore;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::sync::Arc;


/// Content types that mark a mail part as a report attachment
pub const REPORT_CONTENT_TYPES: [&str; 5] = [
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/xml",
    "text/xml",
];

/// An attachment or upload as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    /// Declared filename; picks the container format
    pub filename: String,
}

impl RawUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }
}

/// Whether a mail part looks like an aggregate report attachment.
///
/// Matches on filename suffix first, then on the declared content type
/// (parameters such as `; name=...` are ignored).
pub fn is_report_attachment(filename: &str, content_type: Option<&str>) -> bool {
    let name = filename.trim().to_ascii_lowercase();
    if ACCEPTED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return true;
    }

    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .is_some_and(|ct| REPORT_CONTENT_TYPES.contains(&ct.as_str()))
}

/// Result of storing one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub domain: String,
    pub report_id: String,
    /// Messages covered by the report
    pub processed_records: u64,
}

impl UploadReceipt {
    fn for_report(report: &Report) -> Self {
        Self {
            domain: report.domain().to_string(),
            report_id: report.metadata().report_id.clone(),
            processed_records: report.summary().total_count,
        }
    }
}

/// One item of a batch that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub filename: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: IngestError,
}

fn serialize_error<S: Serializer>(error: &IngestError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Summary of a processed batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Reports decoded and stored
    pub reports_found: usize,
    /// One per stored report, in submission order
    pub receipts: Vec<UploadReceipt>,
    /// One per failed item, in submission order
    pub failures: Vec<BatchFailure>,
    /// Domains first seen during this batch, sorted
    pub new_domains: Vec<String>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives extract → decode → store
pub struct Ingestor {
    store: Arc<StatsStore>,
    limits: ExtractionLimits,
    mode: ExecutionMode,
    workers: usize,
    min_files_for_parallel: usize,
}

impl Ingestor {
    pub fn new(store: Arc<StatsStore>, config: &IngestConfig, limits: ExtractionLimits) -> Self {
        let workers = ExecutionStrategy::calculate_optimal_workers(
            config.max_threads,
            config.thread_percentage,
        );
        tracing::debug!(
            "Ingestor ready: mode {:?}, up to {} workers",
            config.mode,
            workers
        );
        Self {
            store,
            limits,
            mode: config.mode,
            workers,
            min_files_for_parallel: config.min_files_for_parallel,
        }
    }

    pub fn store(&self) -> &Arc<StatsStore> {
        &self.store
    }

    pub fn limits(&self) -> &ExtractionLimits {
        &self.limits
    }

    /// Extract and decode without touching the store
    pub fn parse(&self, upload: &RawUpload) -> IngestResult<Report> {
        let xml = extract_with_limits(&upload.bytes, &upload.filename, &self.limits)?;
        decode(&xml)
    }

    /// Parse one upload and add it to the store
    pub fn ingest(&self, upload: RawUpload) -> IngestResult<UploadReceipt> {
        let report = self.parse(&upload).inspect_err(|e| {
            tracing::warn!("Rejected {}: {} ({})", upload.filename, e, e.category());
        })?;
        let receipt = UploadReceipt::for_report(&report);
        self.store.add_report(report);
        tracing::info!(
            "Stored report {} for {} ({} messages)",
            receipt.report_id,
            receipt.domain,
            receipt.processed_records
        );
        Ok(receipt)
    }

    /// Strategy used for a batch of `items` uploads
    pub fn strategy_for(&self, items: usize) -> ExecutionStrategy {
        match self.mode {
            ExecutionMode::Sequential => ExecutionStrategy::Sequential,
            ExecutionMode::Parallel => ExecutionStrategy::Parallel {
                workers: self.workers,
            },
            ExecutionMode::Auto => {
                ExecutionStrategy::auto(items, self.min_files_for_parallel, self.workers)
            }
        }
    }

    /// Process a batch, isolating per-item failures
    pub fn ingest_batch(&self, uploads: Vec<RawUpload>) -> BatchOutcome {
        let strategy = self.strategy_for(uploads.len());
        tracing::debug!("Processing {} uploads ({:?})", uploads.len(), strategy);

        let parsed = strategy
            .execute(uploads.iter().collect::<Vec<_>>(), |upload: &RawUpload| {
                self.parse(upload)
            })
            .unwrap_or_else(|e| {
                tracing::error!("Parallel parsing failed, retrying sequentially: {:#}", e);
                uploads.iter().map(|upload| self.parse(upload)).collect()
            });

        let mut outcome = BatchOutcome::default();
        let mut new_domains = BTreeSet::new();

        for (upload, result) in uploads.iter().zip(parsed) {
            match result {
                Ok(report) => {
                    let receipt = UploadReceipt::for_report(&report);
                    if self.store.add_report(report) {
                        new_domains.insert(receipt.domain.clone());
                    }
                    outcome.reports_found += 1;
                    outcome.receipts.push(receipt);
                }
                Err(error) => {
                    tracing::warn!(
                        "Error processing {}: {} ({})",
                        upload.filename,
                        error,
                        error.kind()
                    );
                    outcome.failures.push(BatchFailure {
                        filename: upload.filename.clone(),
                        error,
                    });
                }
            }
        }

        outcome.new_domains = new_domains.into_iter().collect();
        tracing::info!(
            "Batch complete: {} reports stored, {} failed, {} new domains",
            outcome.reports_found,
            outcome.failures.len(),
            outcome.new_domains.len()
        );
        outcome
    }
}
