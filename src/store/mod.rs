//! In-memory statistics store
//!
//! Maps each domain to its report history, running summary and per-source
//! breakdown. The store is an explicit value shared as `Arc<StatsStore>`;
//! every method takes `&self` and is safe to call from many threads.
//!
//! Locking: the domain map sits behind one `RwLock` and each domain's state
//! behind its own. Locks are always taken map first, then domain. Removal
//! marks the domain state as retired while the map is write-locked, so a
//! writer that fetched the state just before a delete notices and retries.

use crate::report::Report;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

mod types;


pub use types::{DomainSummary, ReportEntry, SourceStat, StoreOverview, UNKNOWN_DOMAIN};

type SharedState = Arc<RwLock<DomainState>>;

/// Everything the store keeps for one domain
#[derive(Debug)]
struct DomainState {
    reports: Vec<Arc<Report>>,
    summary: DomainSummary,
    sources: HashMap<String, SourceStat>,
    retired: bool,
}

impl DomainState {
    fn new(domain: &str, first: &Arc<Report>) -> Self {
        let mut state = Self {
            reports: Vec::new(),
            summary: DomainSummary::new(domain.to_string(), first.policy().clone()),
            sources: HashMap::new(),
            retired: false,
        };
        state.apply(first);
        state
    }

    fn apply(&mut self, report: &Arc<Report>) {
        self.summary.absorb(report);
        for record in report.records() {
            self.sources
                .entry(record.source_ip.clone())
                .or_insert_with(|| SourceStat::new(record.source_ip.clone()))
                .record_last_seen(record);
        }
        self.reports.push(Arc::clone(report));
    }
}

/// Concurrent per-domain aggregation of decoded reports
#[derive(Debug, Default)]
pub struct StatsStore {
    domains: RwLock<HashMap<String, SharedState>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a report into its domain's statistics.
    ///
    /// Never fails. Returns `true` when this report created the domain.
    /// Reports without a policy domain are filed under [`UNKNOWN_DOMAIN`].
    pub fn add_report(&self, report: Report) -> bool {
        let report = Arc::new(report);
        let domain = match report.domain() {
            "" => UNKNOWN_DOMAIN,
            d => d,
        };

        loop {
            let existing = read_lock(&self.domains).get(domain).cloned();
            let Some(state) = existing else { break };

            let mut guard = write_lock(&state);
            if !guard.retired {
                guard.apply(&report);
                return false;
            }
            tracing::trace!("Domain {} was removed during update; retrying", domain);
        }

        let mut map = write_lock(&self.domains);
        if let Some(state) = map.get(domain) {
            write_lock(state).apply(&report);
            return false;
        }

        tracing::debug!("Tracking new domain {}", domain);
        map.insert(
            domain.to_string(),
            Arc::new(RwLock::new(DomainState::new(domain, &report))),
        );
        true
    }

    /// Every domain with at least one report
    pub fn get_domains(&self) -> BTreeSet<String> {
        read_lock(&self.domains).keys().cloned().collect()
    }

    pub fn contains_domain(&self, domain: &str) -> bool {
        read_lock(&self.domains).contains_key(domain)
    }

    /// Number of tracked domains
    pub fn len(&self) -> usize {
        read_lock(&self.domains).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent snapshot of a domain's running summary
    pub fn get_domain_summary(&self, domain: &str) -> Option<DomainSummary> {
        self.with_domain(domain, |state| state.summary.clone())
    }

    /// Summaries of every domain, sorted by domain name
    pub fn get_all_domain_summaries(&self) -> Vec<DomainSummary> {
        let states: Vec<SharedState> = read_lock(&self.domains).values().cloned().collect();
        let mut summaries: Vec<DomainSummary> = states
            .iter()
            .filter_map(|state| {
                let guard = read_lock(state);
                (!guard.retired).then(|| guard.summary.clone())
            })
            .collect();
        summaries.sort_by(|a, b| a.domain.cmp(&b.domain));
        summaries
    }

    /// Report listing for a domain, newest period first.
    ///
    /// Ordered by end timestamp descending; reports with equal end
    /// timestamps list the most recently added first.
    pub fn get_domain_reports(&self, domain: &str, limit: Option<usize>) -> Vec<ReportEntry> {
        let mut reports = self
            .with_domain(domain, |state| state.reports.clone())
            .unwrap_or_default();
        reports.reverse();
        reports.sort_by(|a, b| {
            b.metadata()
                .end_timestamp
                .cmp(&a.metadata().end_timestamp)
        });
        if let Some(limit) = limit {
            reports.truncate(limit);
        }
        reports.iter().map(|r| ReportEntry::from(r.as_ref())).collect()
    }

    /// Full detail of one stored report; the latest added wins on duplicate ids
    pub fn get_report(&self, domain: &str, report_id: &str) -> Option<Arc<Report>> {
        self.with_domain(domain, |state| {
            state
                .reports
                .iter()
                .rev()
                .find(|r| r.metadata().report_id == report_id)
                .cloned()
        })
        .flatten()
    }

    /// Per-source breakdown, highest volume first (ties by source IP)
    pub fn get_domain_sources(&self, domain: &str) -> Vec<SourceStat> {
        let mut sources: Vec<SourceStat> = self
            .with_domain(domain, |state| state.sources.values().cloned().collect())
            .unwrap_or_default();
        sources.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source_ip.cmp(&b.source_ip))
        });
        sources
    }

    /// Drop a domain and everything recorded for it
    pub fn delete_domain(&self, domain: &str) -> bool {
        let mut map = write_lock(&self.domains);
        match map.remove(domain) {
            Some(state) => {
                write_lock(&state).retired = true;
                tracing::info!("Deleted domain {}", domain);
                true
            }
            None => false,
        }
    }

    /// Drop every domain
    pub fn clear(&self) {
        let mut map = write_lock(&self.domains);
        for state in map.values() {
            write_lock(state).retired = true;
        }
        let removed = map.len();
        map.clear();
        tracing::info!("Cleared {} domains from the store", removed);
    }

    /// Store-wide totals plus every domain summary
    pub fn overview(&self) -> StoreOverview {
        StoreOverview::from_summaries(self.get_all_domain_summaries())
    }

    fn with_domain<T>(&self, domain: &str, f: impl FnOnce(&DomainState) -> T) -> Option<T> {
        let state = read_lock(&self.domains).get(domain).cloned()?;
        let guard = read_lock(&state);
        if guard.retired {
            return None;
        }
        Some(f(&guard))
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
