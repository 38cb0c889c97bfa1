use std::io::Write;
use std::sync::Arc;

use logstory::config::NarrativeConfig;
use logstory::detection::{detect_findings, StreamingDetector};
use logstory::input::extract_events_with_year;
use logstory::models::{EventKind, Finding, TargetKind};
use logstory::{Analyzer, DetectionParams, NarrativeClient, Playbook, SqliteAnalysisStore};

const AUTH_LOG: &str = "\
Mar 10 12:00:00 web01 sshd[101]: Failed password for root from 10.0.0.5 port 50001 ssh2
Mar 10 12:00:30 web01 sshd[102]: Failed password for root from 10.0.0.5 port 50002 ssh2
Mar 10 12:01:00 web01 sshd[103]: Failed password for invalid user admin from 10.0.0.5 port 50003 ssh2
Mar 10 12:01:30 web01 sshd[104]: Failed password for root from 10.0.0.5 port 50004 ssh2
Mar 10 12:02:00 web01 sshd[105]: Failed password for root from 10.0.0.5 port 50005 ssh2
Mar 10 12:03:00 web01 sshd[106]: Failed password for root from 10.0.0.5 port 50006 ssh2
Mar 10 12:03:10 web01 sshd[107]: Accepted publickey for deploy from 192.168.1.20 port 40022 ssh2
Mar 10 12:04:00 web01 sshd[108]: Accepted password for root from 10.0.0.5 port 50007 ssh2
Mar 10 12:04:05 web01 systemd[1]: Started Session 42 of user root.
";

#[test]
fn test_extract_then_detect() {
    let events = extract_events_with_year(AUTH_LOG, 2024);
    assert_eq!(events.len(), 8);
    assert_eq!(
        events.iter().filter(|e| e.kind == EventKind::Failed).count(),
        6
    );

    let findings = detect_findings(&events, 5, 5);

    // ip burst, root burst (5 of its failures fall within the window), success after failures
    assert_eq!(findings.len(), 3);
    assert!(matches!(
        &findings[0],
        Finding::BruteForceBurst { target_kind: TargetKind::Ip, target_value, count: 5, .. }
            if target_value == "10.0.0.5"
    ));
    assert!(matches!(
        &findings[1],
        Finding::BruteForceBurst { target_kind: TargetKind::User, target_value, count: 5, .. }
            if target_value == "root"
    ));
    assert!(matches!(
        &findings[2],
        Finding::PostFailureSuccess { user, preceding_failure_count: 6, .. } if user == "root"
    ));
}

#[test]
fn test_streaming_agrees_with_batch() {
    let events = extract_events_with_year(AUTH_LOG, 2024);
    let params = DetectionParams::default();

    let mut detector = StreamingDetector::new(params);
    let streamed = detector.observe_all(&events);
    let batch = detect_findings(&events, params.failed_threshold, params.window_minutes);

    assert_eq!(streamed.len(), batch.len());
    for finding in &batch {
        assert!(streamed.contains(finding), "missing {:?}", finding);
    }
}

#[tokio::test]
async fn test_file_analysis_recorded_in_history() {
    let mut log_file = tempfile::NamedTempFile::new().unwrap();
    log_file.write_all(AUTH_LOG.as_bytes()).unwrap();
    log_file.flush().unwrap();

    let narrator = NarrativeClient::with_api_key(NarrativeConfig::default(), None);
    let playbook = Playbook::parse(
        "## Block brute force sources\nFirewall the ip with repeated failed logins.\n\
         ## Investigate successful login\nA successful login after failures may be a compromise.\n",
    );
    let store = Arc::new(SqliteAnalysisStore::in_memory().unwrap());
    let analyzer = Analyzer::new(DetectionParams::default(), narrator, playbook)
        .with_store(store)
        .with_top_k(1);

    let report = analyzer.analyze_file(log_file.path()).await.unwrap();

    assert_eq!(report.summary.total_events, 8);
    assert_eq!(report.summary.unique_ips, 2);
    assert_eq!(report.summary.unique_users, 3);
    assert_eq!(report.findings.len(), 3);
    assert_eq!(report.recommendations.len(), 1);

    let history = analyzer.history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(Some(history[0].id), report.id);
    assert_eq!(history[0].narrative, report.narrative);
}
