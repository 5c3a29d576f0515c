//! Configuration for the ingestion engine
//!
//! Values come from the embedded `default-config.toml`, an optional TOML
//! file and `DMARCGUARD_` environment variables, in that order of priority.
//! See [`DmarcConfig::load`].

use crate::extract::ExtractionLimits;
use serde::{Deserialize, Serialize};

mod core;


pub use self::core::ENV_PREFIX;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmarcConfig {
    /// Extraction ceilings; can only be tightened
    pub limits: ExtractionLimits,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

/// How a batch chooses between sequential and parallel processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Parallel once a batch reaches `min_files_for_parallel`
    #[default]
    Auto,
    Sequential,
    Parallel,
}

/// Batch ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub mode: ExecutionMode,
    /// Worker cap (0 = no cap)
    pub max_threads: usize,
    /// Share of CPU cores to use (1-100)
    pub thread_percentage: u8,
    pub min_files_for_parallel: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Auto,
            max_threads: 0,
            thread_percentage: 75,
            min_files_for_parallel: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
