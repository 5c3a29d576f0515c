//! DMARC aggregate report model (RFC 7489, Appendix C)
//!
//! A `Report` is built once by [`decode`] and never mutated afterwards.
//! Every field documents its missing-value policy: the policy domain is the
//! only required value; everything else falls back to a documented default.

use crate::errors::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};

mod decode;
pub mod domain;

#[cfg(test)]
mod tests;

pub use decode::decode;

/// Result value that counts as an authentication pass
pub const PASS: &str = "pass";

/// `<report_metadata>` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Missing → empty string
    pub report_id: String,
    /// Missing → empty string
    pub org_name: String,
    /// `<email>`; missing → empty string
    pub contact_email: String,
    /// `<date_range><begin>` in Unix seconds; missing → 0
    pub begin_timestamp: i64,
    /// `<date_range><end>` in Unix seconds; missing → 0
    pub end_timestamp: i64,
}

/// `<policy_published>` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPublished {
    /// Required and non-empty
    pub domain: String,
    /// DKIM alignment mode; missing → "r"
    pub adkim: String,
    /// SPF alignment mode; missing → "r"
    pub aspf: String,
    /// Requested policy; missing → "none"
    pub p: String,
    /// Subdomain policy; missing → inherits `p`
    pub sp: Option<String>,
    /// Sampling percentage; missing → 100
    pub pct: u32,
}

impl PolicyPublished {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            adkim: "r".to_string(),
            aspf: "r".to_string(),
            p: "none".to_string(),
            sp: None,
            pct: 100,
        }
    }

    /// Effective subdomain policy
    pub fn subdomain_policy(&self) -> &str {
        self.sp.as_deref().unwrap_or(&self.p)
    }
}

/// One raw `<spf>` or `<dkim>` entry under `<auth_results>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub domain: String,
    /// Lower-cased
    pub result: String,
    /// DKIM only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// One `<record>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub source_ip: String,
    pub count: u64,
    /// Lower-cased; missing → "none"
    pub disposition: String,
    /// Lower-cased; missing → empty
    pub dkim_result: String,
    /// Lower-cased; missing → empty
    pub spf_result: String,
    pub header_from: String,
    pub spf: Vec<AuthResult>,
    pub dkim: Vec<AuthResult>,
}

impl RecordEntry {
    pub fn new(source_ip: impl Into<String>, count: u64) -> Self {
        Self {
            source_ip: source_ip.into(),
            count,
            disposition: "none".to_string(),
            dkim_result: String::new(),
            spf_result: String::new(),
            header_from: String::new(),
            spf: Vec::new(),
            dkim: Vec::new(),
        }
    }

    /// Either aligned mechanism passing is sufficient for DMARC
    pub fn passed(&self) -> bool {
        self.spf_result == PASS || self.dkim_result == PASS
    }
}

/// Message counts for one report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: u64,
    pub passed_count: u64,
    pub failed_count: u64,
    /// Percentage, unrounded; 0 when there are no messages
    pub pass_rate: f64,
}

impl Summary {
    /// Summary with saturating sums; `passed_count <= total_count` always holds
    pub fn from_records(records: &[RecordEntry]) -> Self {
        let total_count = records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.count));
        let passed_count = records
            .iter()
            .filter(|r| r.passed())
            .fold(0u64, |acc, r| acc.saturating_add(r.count));
        Self::from_counts(total_count, passed_count)
    }

    /// Summary, or `None` when the message counts do not fit in a `u64`
    pub fn checked_from_records(records: &[RecordEntry]) -> Option<Self> {
        let total_count = records
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.count))?;
        let passed_count = records
            .iter()
            .filter(|r| r.passed())
            .try_fold(0u64, |acc, r| acc.checked_add(r.count))?;
        Some(Self::from_counts(total_count, passed_count))
    }

    fn from_counts(total_count: u64, passed_count: u64) -> Self {
        Self {
            total_count,
            passed_count,
            failed_count: total_count - passed_count,
            pass_rate: percentage(passed_count, total_count),
        }
    }
}

/// A decoded aggregate report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    metadata: ReportMetadata,
    policy: PolicyPublished,
    records: Vec<RecordEntry>,
    summary: Summary,
}

impl Report {
    /// Assemble a report; the summary is always derived from `records`.
    ///
    /// Counts that overflow saturate at `u64::MAX`; decoding uses
    /// [`Report::try_new`] and rejects such reports instead.
    pub fn new(
        metadata: ReportMetadata,
        policy: PolicyPublished,
        records: Vec<RecordEntry>,
    ) -> Self {
        let summary = Summary::from_records(&records);
        Self {
            metadata,
            policy,
            records,
            summary,
        }
    }

    /// Like [`Report::new`], but message counts that overflow are an error
    pub fn try_new(
        metadata: ReportMetadata,
        policy: PolicyPublished,
        records: Vec<RecordEntry>,
    ) -> IngestResult<Self> {
        let summary = Summary::checked_from_records(&records)
            .ok_or_else(|| IngestError::malformed("message count out of range"))?;
        Ok(Self {
            metadata,
            policy,
            records,
            summary,
        })
    }

    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    pub fn policy(&self) -> &PolicyPublished {
        &self.policy
    }

    pub fn domain(&self) -> &str {
        &self.policy.domain
    }

    pub fn records(&self) -> &[RecordEntry] {
        &self.records
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

/// `part / whole * 100`, or 0 for an empty whole
pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Round to one decimal place, ties to even
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
