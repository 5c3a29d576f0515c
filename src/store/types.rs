use crate::report::{PASS, PolicyPublished, RecordEntry, Report, percentage, round1};
use serde::Serialize;

/// Domain filed for reports that carry no policy domain
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Running totals for one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub total_count: u64,
    pub passed_count: u64,
    pub failed_count: u64,
    pub reports_processed: u64,
    /// Percentage rounded to one decimal; 0 when no messages were seen
    pub compliance_rate: f64,
    /// Policy from the most recently added report
    pub policy: PolicyPublished,
}

impl DomainSummary {
    pub(crate) fn new(domain: String, policy: PolicyPublished) -> Self {
        Self {
            domain,
            total_count: 0,
            passed_count: 0,
            failed_count: 0,
            reports_processed: 0,
            compliance_rate: 0.0,
            policy,
        }
    }

    /// Fold one report's counts in; all fields move together
    pub(crate) fn absorb(&mut self, report: &Report) {
        let summary = report.summary();
        self.total_count = self.total_count.saturating_add(summary.total_count);
        self.passed_count = self.passed_count.saturating_add(summary.passed_count);
        self.failed_count = self.total_count - self.passed_count;
        self.reports_processed += 1;
        self.compliance_rate = round1(percentage(self.passed_count, self.total_count));
        self.policy = report.policy().clone();
    }
}

/// Accumulated view of one sending source for a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStat {
    pub source_ip: String,
    /// Sum of message counts over every record from this source
    pub count: u64,
    pub spf_result: String,
    pub dkim_result: String,
    pub disposition: String,
    /// `pass` or `fail`, derived from the last seen record
    dmarc: String,
}

impl SourceStat {
    pub fn new(source_ip: impl Into<String>) -> Self {
        Self {
            source_ip: source_ip.into(),
            count: 0,
            spf_result: String::new(),
            dkim_result: String::new(),
            disposition: String::new(),
            dmarc: "fail".to_string(),
        }
    }

    /// Add the record's count and take its results as the current ones.
    ///
    /// Counts accumulate; results are last-write-wins, so the outcome for a
    /// source reflects the most recently applied record rather than a
    /// majority over its history.
    pub fn record_last_seen(&mut self, record: &RecordEntry) {
        self.count = self.count.saturating_add(record.count);
        self.spf_result.clone_from(&record.spf_result);
        self.dkim_result.clone_from(&record.dkim_result);
        self.disposition.clone_from(&record.disposition);
        self.dmarc = if record.passed() { PASS } else { "fail" }.to_string();
    }

    /// `pass` or `fail`; serialized as `dmarc`
    pub fn dmarc_result(&self) -> &str {
        &self.dmarc
    }
}

/// One row of a domain's report listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub report_id: String,
    pub org_name: String,
    pub begin_timestamp: i64,
    pub end_timestamp: i64,
    pub total_count: u64,
    pub passed_count: u64,
    pub failed_count: u64,
    /// Rounded to one decimal
    pub pass_rate: f64,
    /// Requested policy (`p`) of this report
    pub policy: String,
}

impl From<&Report> for ReportEntry {
    fn from(report: &Report) -> Self {
        let meta = report.metadata();
        let summary = report.summary();
        Self {
            report_id: meta.report_id.clone(),
            org_name: meta.org_name.clone(),
            begin_timestamp: meta.begin_timestamp,
            end_timestamp: meta.end_timestamp,
            total_count: summary.total_count,
            passed_count: summary.passed_count,
            failed_count: summary.failed_count,
            pass_rate: round1(summary.pass_rate),
            policy: report.policy().p.clone(),
        }
    }
}

/// Store-wide totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreOverview {
    pub total_domains: usize,
    pub total_emails: u64,
    pub total_passed: u64,
    pub overall_pass_rate: f64,
    pub reports_processed: u64,
    pub domains: Vec<DomainSummary>,
}

impl StoreOverview {
    pub(crate) fn from_summaries(domains: Vec<DomainSummary>) -> Self {
        let total_emails = domains
            .iter()
            .fold(0u64, |acc, d| acc.saturating_add(d.total_count));
        let total_passed = domains
            .iter()
            .fold(0u64, |acc, d| acc.saturating_add(d.passed_count));
        Self {
            total_domains: domains.len(),
            total_emails,
            total_passed,
            overall_pass_rate: round1(percentage(total_passed, total_emails)),
            reports_processed: domains
                .iter()
                .fold(0u64, |acc, d| acc.saturating_add(d.reports_processed)),
            domains,
        }
    }
}
