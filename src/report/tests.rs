use super::*;
use crate::errors::IngestError;

const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<feedback>
    <report_metadata>
        <org_name>google.com</org_name>
        <email>noreply-dmarc-support@google.com</email>
        <report_id>123456789</report_id>
        <date_range>
            <begin>1597449600</begin>
            <end>1597535999</end>
        </date_range>
    </report_metadata>
    <policy_published>
        <domain>example.com</domain>
        <adkim>r</adkim>
        <aspf>s</aspf>
        <p>quarantine</p>
        <sp>none</sp>
        <pct>50</pct>
    </policy_published>
    <record>
        <row>
            <source_ip>203.0.113.1</source_ip>
            <count>2</count>
            <policy_evaluated>
                <disposition>none</disposition>
                <dkim>PASS</dkim>
                <spf>fail</spf>
            </policy_evaluated>
        </row>
        <identifiers>
            <header_from>example.com</header_from>
        </identifiers>
        <auth_results>
            <dkim>
                <domain>example.com</domain>
                <result>pass</result>
                <selector>default</selector>
            </dkim>
            <spf>
                <domain>example.com</domain>
                <result>Fail</result>
            </spf>
        </auth_results>
    </record>
    <record>
        <row>
            <source_ip>198.51.100.7</source_ip>
            <count>3</count>
            <policy_evaluated>
                <disposition>Reject</disposition>
                <dkim>fail</dkim>
                <spf>fail</spf>
            </policy_evaluated>
        </row>
        <identifiers>
            <header_from>example.com</header_from>
        </identifiers>
    </record>
</feedback>
"#;

fn minimal(policy_body: &str, records: &str) -> String {
    format!(
        "<feedback><policy_published>{}</policy_published>{}</feedback>",
        policy_body, records
    )
}

#[test]
fn test_decode_sample_report() {
    let report = decode(SAMPLE_XML.as_bytes()).unwrap();

    let meta = report.metadata();
    assert_eq!(meta.org_name, "google.com");
    assert_eq!(meta.contact_email, "noreply-dmarc-support@google.com");
    assert_eq!(meta.report_id, "123456789");
    assert_eq!(meta.begin_timestamp, 1597449600);
    assert_eq!(meta.end_timestamp, 1597535999);

    let policy = report.policy();
    assert_eq!(report.domain(), "example.com");
    assert_eq!(policy.adkim, "r");
    assert_eq!(policy.aspf, "s");
    assert_eq!(policy.p, "quarantine");
    assert_eq!(policy.subdomain_policy(), "none");
    assert_eq!(policy.pct, 50);

    assert_eq!(report.records().len(), 2);
    let first = &report.records()[0];
    assert_eq!(first.source_ip, "203.0.113.1");
    assert_eq!(first.count, 2);
    assert_eq!(first.disposition, "none");
    assert_eq!(first.dkim_result, "pass");
    assert_eq!(first.spf_result, "fail");
    assert_eq!(first.header_from, "example.com");
    assert_eq!(first.dkim.len(), 1);
    assert_eq!(first.dkim[0].selector.as_deref(), Some("default"));
    assert_eq!(first.spf[0].result, "fail");
    assert_eq!(first.spf[0].selector, None);

    let second = &report.records()[1];
    assert_eq!(second.disposition, "reject");
    assert!(second.spf.is_empty() && second.dkim.is_empty());
}

#[test]
fn test_summary_invariants() {
    let report = decode(SAMPLE_XML.as_bytes()).unwrap();
    let summary = report.summary();
    assert_eq!(summary.total_count, 5);
    assert_eq!(summary.passed_count, 2);
    assert_eq!(summary.failed_count, 3);
    assert!((summary.pass_rate - 40.0).abs() < f64::EPSILON);
}

#[test]
fn test_either_mechanism_passes() {
    let records = vec![
        RecordEntry {
            spf_result: "pass".into(),
            ..RecordEntry::new("192.0.2.1", 4)
        },
        RecordEntry {
            dkim_result: "pass".into(),
            ..RecordEntry::new("192.0.2.2", 6)
        },
        RecordEntry::new("192.0.2.3", 0),
    ];
    let summary = Summary::from_records(&records);
    assert_eq!(summary.total_count, 10);
    assert_eq!(summary.passed_count, 10);
    assert_eq!(summary.failed_count, 0);
}

#[test]
fn test_empty_report_summary() {
    let report = decode(minimal("<domain>example.com</domain>", "").as_bytes()).unwrap();
    assert!(report.records().is_empty());
    assert_eq!(*report.summary(), Summary::default());
    assert_eq!(report.summary().pass_rate, 0.0);
}

#[test]
fn test_missing_values_use_defaults() {
    let xml = minimal(
        "<domain> example.org </domain>",
        "<record><row><source_ip>192.0.2.9</source_ip></row></record>",
    );
    let report = decode(xml.as_bytes()).unwrap();

    assert_eq!(*report.metadata(), ReportMetadata::default());
    let policy = report.policy();
    assert_eq!(policy.domain, "example.org");
    assert_eq!(policy.p, "none");
    assert_eq!(policy.adkim, "r");
    assert_eq!(policy.aspf, "r");
    assert_eq!(policy.sp, None);
    assert_eq!(policy.subdomain_policy(), "none");
    assert_eq!(policy.pct, 100);

    let record = &report.records()[0];
    assert_eq!(record.count, 0);
    assert_eq!(record.disposition, "none");
    assert_eq!(record.dkim_result, "");
    assert!(!record.passed());
}

#[test]
fn test_missing_domain() {
    let err = decode(minimal("<p>none</p>", "").as_bytes()).unwrap_err();
    assert_eq!(err, IngestError::MissingDomain);

    let err = decode(minimal("<domain>   </domain>", "").as_bytes()).unwrap_err();
    assert_eq!(err, IngestError::MissingDomain);

    let err = decode(b"<feedback></feedback>").unwrap_err();
    assert_eq!(err, IngestError::MissingDomain);
}

#[test]
fn test_external_entity_never_resolved() {
    let xml = r#"<?xml version="1.0"?>
<!DOCTYPE feedback [
  <!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<feedback>
  <policy_published><domain>&xxe;</domain></policy_published>
</feedback>"#;
    let err = decode(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, IngestError::MalformedXml { .. }));
    assert!(!err.to_string().contains("passwd"));
}

#[test]
fn test_entity_expansion_refused() {
    let xml = r#"<?xml version="1.0"?>
<!DOCTYPE lolz [
  <!ENTITY lol "lol">
  <!ENTITY lol2 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">
  <!ENTITY lol3 "&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;">
]>
<feedback><policy_published><domain>&lol3;</domain></policy_published></feedback>"#;
    let err = decode(xml.as_bytes()).unwrap_err();
    assert_eq!(
        err,
        IngestError::malformed("DTDs and entity declarations are not allowed")
    );
}

#[test]
fn test_malformed_inputs() {
    let err = decode(b"<feedback><policy_published>").unwrap_err();
    assert_eq!(err, IngestError::malformed("document is not well-formed"));

    let err = decode(&[0xff, 0xfe, 0x00]).unwrap_err();
    assert_eq!(err, IngestError::malformed("report is not valid UTF-8"));

    let xml = minimal(
        "<domain>example.com</domain>",
        "<record><row><count>lots</count></row></record>",
    );
    let err = decode(xml.as_bytes()).unwrap_err();
    assert_eq!(err, IngestError::malformed("invalid numeric field"));

    let xml = minimal("<domain>example.com</domain><pct>-5</pct>", "");
    assert!(decode(xml.as_bytes()).is_err());
}

#[test]
fn test_namespaced_and_bom_input() {
    let xml = "\u{feff}<feedback xmlns=\"urn:ietf:params:xml:ns:dmarc-2.0\">\
        <policy_published><domain>example.net</domain></policy_published>\
        <record><row><source_ip>192.0.2.1</source_ip><count>7</count>\
        <policy_evaluated><spf>pass</spf></policy_evaluated></row></record>\
        </feedback>";
    let report = decode(xml.as_bytes()).unwrap();
    assert_eq!(report.domain(), "example.net");
    assert_eq!(report.summary().passed_count, 7);
}

#[test]
fn test_odd_domain_still_accepted() {
    let report = decode(minimal("<domain>localhost</domain>", "").as_bytes()).unwrap();
    assert_eq!(report.domain(), "localhost");
}

#[test]
fn test_report_serializes() {
    let report = decode(SAMPLE_XML.as_bytes()).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["policy"]["domain"], "example.com");
    assert_eq!(value["summary"]["total_count"], 5);
    assert_eq!(value["records"][1]["source_ip"], "198.51.100.7");
    assert!(value["records"][1]["spf"].as_array().unwrap().is_empty());
}

#[test]
fn test_rounding() {
    assert_eq!(round1(percentage(1, 3)), 33.3);
    assert_eq!(round1(percentage(2, 3)), 66.7);
    assert_eq!(round1(percentage(0, 0)), 0.0);
    assert_eq!(round1(percentage(5, 5)), 100.0);
    // 6.25 sits exactly on the tie and goes to the even digit
    assert_eq!(round1(percentage(1, 16)), 6.2);
    assert_eq!(round1(percentage(3, 16)), 18.8);
}

#[test]
fn test_overflowing_counts_are_rejected() {
    let records = "<record><row><source_ip>192.0.2.1</source_ip><count>18446744073709551615</count>\
                     <policy_evaluated><spf>pass</spf></policy_evaluated></row></record>\
                   <record><row><source_ip>192.0.2.2</source_ip><count>1</count>\
                     <policy_evaluated><spf>fail</spf></policy_evaluated></row></record>";
    let err = decode(minimal("<domain>example.com</domain>", records).as_bytes()).unwrap_err();
    assert_eq!(err, IngestError::malformed("message count out of range"));
}

#[test]
fn test_largest_single_count_is_accepted() {
    let records = "<record><row><source_ip>192.0.2.1</source_ip><count>18446744073709551615</count>\
                     <policy_evaluated><spf>fail</spf></policy_evaluated></row></record>";
    let report = decode(minimal("<domain>example.com</domain>", records).as_bytes()).unwrap();
    let summary = report.summary();
    assert_eq!(summary.total_count, u64::MAX);
    assert_eq!(summary.failed_count, u64::MAX);
    assert_eq!(summary.passed_count, 0);
}

#[test]
fn test_hand_built_report_saturates() {
    let records = vec![
        RecordEntry {
            spf_result: "pass".to_string(),
            ..RecordEntry::new("192.0.2.1", u64::MAX)
        },
        RecordEntry::new("192.0.2.2", 1),
    ];
    let policy = PolicyPublished::new("example.com");
    let report = Report::new(ReportMetadata::default(), policy, records);
    let summary = report.summary();
    assert_eq!(summary.total_count, u64::MAX);
    assert_eq!(summary.passed_count, u64::MAX);
    assert_eq!(summary.failed_count, 0);
}
