//! # dmarcguard - DMARC aggregate report ingestion
//!
//! Turns DMARC aggregate feedback reports (RFC 7489) received from
//! untrusted senders into per-domain and per-source compliance statistics.
//!
//! ## Features
//!
//! - **Bounded extraction**: plain, ZIP and GZIP attachments under hard size
//!   and entry-count ceilings, with streaming cutoffs for decompression bombs
//! - **Hardened decoding**: XML with any DOCTYPE is refused, so entity
//!   expansion (XXE, billion laughs) cannot happen
//! - **Concurrent aggregation**: a shared in-memory store with per-domain
//!   locking and consistent snapshots
//! - **Batch ingestion**: parallel parsing with per-item failure isolation
//!
//! ## Quick Start
//!
//! ```rust
//! use dmarcguard::{DmarcConfig, Ingestor, RawUpload, StatsStore};
//! use std::sync::Arc;
//!
//! let config = DmarcConfig::default();
//! let store = Arc::new(StatsStore::new());
//! let ingestor = Ingestor::new(Arc::clone(&store), &config.ingest, config.limits);
//!
//! let xml = "<feedback><policy_published><domain>example.com</domain></policy_published>\
//!            <record><row><source_ip>192.0.2.1</source_ip><count>3</count>\
//!            <policy_evaluated><spf>pass</spf></policy_evaluated></row></record></feedback>";
//! let receipt = ingestor.ingest(RawUpload::new(xml, "report.xml")).unwrap();
//! assert_eq!(receipt.processed_records, 3);
//!
//! let summary = store.get_domain_summary("example.com").unwrap();
//! assert_eq!(summary.compliance_rate, 100.0);
//! ```

pub mod config;
pub mod errors;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod parallel;
pub mod report;
pub mod store;

pub use config::DmarcConfig;
pub use errors::{ErrorCategory, IngestError, IngestResult};
pub use extract::{ExtractionLimits, extract, extract_with_limits};
pub use ingest::{
    BatchFailure, BatchOutcome, Ingestor, RawUpload, UploadReceipt, is_report_attachment,
};
pub use report::{Report, decode};
pub use store::{DomainSummary, ReportEntry, SourceStat, StatsStore, StoreOverview};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
