//! XML decoding for aggregate reports
//!
//! The parser is configured to refuse any DOCTYPE outright, so no entity
//! (internal or external) can ever be declared, let alone expanded. Parser
//! errors are logged here and replaced with fixed summaries before they
//! leave the module.

use super::domain::is_valid_domain_name;
use super::{AuthResult, PolicyPublished, RecordEntry, Report, ReportMetadata};
use crate::errors::{IngestError, IngestResult};
use roxmltree::{Document, Node, ParsingOptions};
use std::str::FromStr;

/// Upper bound on parsed nodes; a record is ~25 nodes, so this allows
/// well over 100k records per report.
const MAX_XML_NODES: u32 = 5_000_000;

/// Decode report XML into a [`Report`]
///
/// # Errors
/// - `MalformedXml` for non-UTF-8 input, any DOCTYPE, structural parse
///   failures, invalid numeric fields or message counts that overflow
/// - `MissingDomain` when `policy_published/domain` is absent or empty
pub fn decode(xml: &[u8]) -> IngestResult<Report> {
    let text = std::str::from_utf8(xml).map_err(|e| {
        tracing::debug!("Report XML is not valid UTF-8: {}", e);
        IngestError::malformed("report is not valid UTF-8")
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut options = ParsingOptions::default();
    options.allow_dtd = false;
    options.nodes_limit = MAX_XML_NODES;

    let doc = Document::parse_with_options(text, options).map_err(|e| match e {
        roxmltree::Error::DtdDetected => {
            tracing::warn!("Refused report XML containing a DOCTYPE declaration");
            IngestError::malformed("DTDs and entity declarations are not allowed")
        }
        roxmltree::Error::NodesLimitReached => {
            tracing::warn!("Report XML exceeds {} nodes", MAX_XML_NODES);
            IngestError::malformed("document has too many elements")
        }
        other => {
            tracing::debug!("Error parsing DMARC XML: {}", other);
            IngestError::malformed("document is not well-formed")
        }
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "feedback" {
        tracing::debug!("Unexpected root element <{}>", root.tag_name().name());
    }

    let metadata = parse_metadata(child(root, "report_metadata"))?;
    let policy = parse_policy(child(root, "policy_published"))?;
    let records = children(root, "record")
        .map(parse_record)
        .collect::<IngestResult<Vec<_>>>()?;

    let report = Report::try_new(metadata, policy, records).inspect_err(|_| {
        tracing::warn!("Report message counts overflow a 64-bit total");
    })?;
    let summary = report.summary();
    tracing::info!("Parsed DMARC report for domain: {}", report.domain());
    tracing::debug!(
        "Found {} record entries with {} total messages (passed: {}, failed: {})",
        report.records().len(),
        summary.total_count,
        summary.passed_count,
        summary.failed_count
    );

    Ok(report)
}

fn parse_metadata(node: Option<Node>) -> IngestResult<ReportMetadata> {
    let Some(node) = node else {
        return Ok(ReportMetadata::default());
    };
    let date_range = child(node, "date_range");

    Ok(ReportMetadata {
        report_id: text_of(Some(node), "report_id"),
        org_name: text_of(Some(node), "org_name"),
        contact_email: text_of(Some(node), "email"),
        begin_timestamp: number_of(date_range, "begin", 0)?,
        end_timestamp: number_of(date_range, "end", 0)?,
    })
}

fn parse_policy(node: Option<Node>) -> IngestResult<PolicyPublished> {
    let domain = text_of(node, "domain");
    if domain.is_empty() {
        tracing::debug!("Report has no policy_published/domain");
        return Err(IngestError::MissingDomain);
    }
    if !is_valid_domain_name(&domain) {
        tracing::warn!("Policy domain {:?} does not look like a hostname", domain);
    }

    let mut policy = PolicyPublished::new(domain);
    policy.adkim = text_or(node, "adkim", &policy.adkim);
    policy.aspf = text_or(node, "aspf", &policy.aspf);
    policy.p = text_or(node, "p", &policy.p);
    policy.sp = Some(text_of(node, "sp")).filter(|sp| !sp.is_empty());
    policy.pct = number_of(node, "pct", 100)?;
    Ok(policy)
}

fn parse_record(node: Node) -> IngestResult<RecordEntry> {
    let row = child(node, "row");
    let evaluated = row.and_then(|r| child(r, "policy_evaluated"));
    let auth = child(node, "auth_results");

    let mut record = RecordEntry::new(text_of(row, "source_ip"), number_of(row, "count", 0)?);
    record.disposition = text_or(evaluated, "disposition", "none").to_lowercase();
    record.dkim_result = text_of(evaluated, "dkim").to_lowercase();
    record.spf_result = text_of(evaluated, "spf").to_lowercase();
    record.header_from = text_of(child(node, "identifiers"), "header_from");

    if let Some(auth) = auth {
        record.spf = children(auth, "spf").map(|n| auth_result(n, false)).collect();
        record.dkim = children(auth, "dkim").map(|n| auth_result(n, true)).collect();
    }

    Ok(record)
}

fn auth_result(node: Node, with_selector: bool) -> AuthResult {
    AuthResult {
        domain: text_of(Some(node), "domain"),
        result: text_of(Some(node), "result").to_lowercase(),
        selector: if with_selector {
            Some(text_of(Some(node), "selector")).filter(|s| !s.is_empty())
        } else {
            None
        },
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

/// Trimmed text of a named child, or empty when either is missing
fn text_of(node: Option<Node>, name: &str) -> String {
    node.and_then(|n| child(n, name))
        .and_then(|c| c.text())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn text_or(node: Option<Node>, name: &str, default: &str) -> String {
    let text = text_of(node, name);
    if text.is_empty() { default.to_string() } else { text }
}

/// Numeric child; missing or empty falls back to `default`, garbage is an error
fn number_of<T: FromStr>(node: Option<Node>, name: &str, default: T) -> IngestResult<T> {
    let text = text_of(node, name);
    if text.is_empty() {
        return Ok(default);
    }
    text.parse().map_err(|_| {
        tracing::debug!("Invalid numeric value for <{}>: {:?}", name, text);
        IngestError::malformed("invalid numeric field")
    })
}
