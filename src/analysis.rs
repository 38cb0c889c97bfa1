//! End-to-end analysis of an uploaded auth log
//!
//! extract → detect → digest → narrative → recommendations → history.
//! Only persistence failures are reported as errors; narrative and playbook
//! problems degrade to their fallbacks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::detection::{detect_with_params, DetectionParams};
use crate::input::extract_events_from_bytes;
use crate::models::{AnalysisRecord, AuthEvent, Finding, Recommendation};
use crate::narrative::{build_digest, NarrativeClient};
use crate::persistence::{AnalysisStore, PersistenceError};
use crate::recommend::{Playbook, Ranker, TermOverlapRanker};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Event as shown in the analysis event table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// `%Y-%m-%d %H:%M:%S`, or "N/A" when unresolved
    pub timestamp: String,
    pub user: String,
    pub ip: String,
    /// "Failed" or "Accepted"
    pub status: String,
    pub raw: String,
}

impl From<&AuthEvent> for EventRow {
    fn from(event: &AuthEvent) -> Self {
        EventRow {
            timestamp: event
                .timestamp
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            user: event.user.clone(),
            ip: event.source_address.clone(),
            status: event.kind.status_label().to_string(),
            raw: event.raw_line.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_events: usize,
    pub failed_attempts: usize,
    pub successful_logins: usize,
    pub unique_ips: usize,
    pub unique_users: usize,
}

impl AnalysisSummary {
    pub fn from_events(events: &[AuthEvent]) -> Self {
        AnalysisSummary {
            total_events: events.len(),
            failed_attempts: events.iter().filter(|e| e.is_failure()).count(),
            successful_logins: events.iter().filter(|e| e.is_success()).count(),
            unique_ips: events
                .iter()
                .map(|e| e.source_address.as_str())
                .collect::<HashSet<_>>()
                .len(),
            unique_users: events
                .iter()
                .map(|e| e.user.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

/// Full result of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// History id; `None` when no store is attached
    pub id: Option<i64>,
    pub narrative: String,
    pub recommendations: Vec<Recommendation>,
    pub events: Vec<EventRow>,
    pub findings: Vec<Finding>,
    pub summary: AnalysisSummary,
}

/// Runs analyses and manages their history
pub struct Analyzer {
    params: DetectionParams,
    narrator: NarrativeClient,
    playbook: Playbook,
    ranker: Box<dyn Ranker>,
    top_k: usize,
    store: Option<Arc<dyn AnalysisStore>>,
}

impl Analyzer {
    /// Build an analyzer from configuration (playbook loaded from its configured path)
    pub fn from_config(config: &Config) -> Self {
        Analyzer {
            params: config.detection.params(),
            narrator: NarrativeClient::new(config.narrative.clone()),
            playbook: Playbook::load_or_empty(&config.recommendations.playbook_path),
            ranker: Box::new(TermOverlapRanker),
            top_k: config.recommendations.top_k,
            store: None,
        }
    }

    pub fn new(params: DetectionParams, narrator: NarrativeClient, playbook: Playbook) -> Self {
        Analyzer {
            params,
            narrator,
            playbook,
            ranker: Box::new(TermOverlapRanker),
            top_k: 3,
            store: None,
        }
    }

    /// Attach a history store; analyses are saved and history becomes available
    pub fn with_store(mut self, store: Arc<dyn AnalysisStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Replace the playbook used for recommendations
    pub fn with_playbook(mut self, playbook: Playbook) -> Self {
        self.playbook = playbook;
        self
    }

    /// Analyse a log file on disk
    pub async fn analyze_file(
        &self,
        path: &std::path::Path,
    ) -> Result<AnalysisReport, AnalysisError> {
        let raw = tokio::fs::read(path).await?;
        self.analyze_bytes(&path.display().to_string(), &raw).await
    }

    /// Analyse raw text
    pub async fn analyze(&self, source: &str, text: &str) -> Result<AnalysisReport, AnalysisError> {
        self.analyze_bytes(source, text.as_bytes()).await
    }

    /// Analyse raw bytes; undecodable sequences are tolerated
    pub async fn analyze_bytes(
        &self,
        source: &str,
        raw: &[u8],
    ) -> Result<AnalysisReport, AnalysisError> {
        let events = extract_events_from_bytes(raw);
        let findings = detect_with_params(&events, self.params);
        log::info!(
            "Analysed {}: {} event(s), {} finding(s)",
            source,
            events.len(),
            findings.len()
        );

        let digest = build_digest(&findings);
        let narrative = self.narrator.generate(&digest).await;
        let recommendations = self
            .ranker
            .rank(&narrative, &self.playbook.sections, self.top_k);

        let id = match self.store {
            Some(ref store) => Some(store.save_analysis(source, &narrative, &recommendations)?),
            None => None,
        };

        Ok(AnalysisReport {
            id,
            narrative,
            recommendations,
            events: events.iter().map(EventRow::from).collect(),
            summary: AnalysisSummary::from_events(&events),
            findings,
        })
    }

    /// Past analyses, newest first; empty without a store
    pub fn history(&self, limit: usize) -> Result<Vec<AnalysisRecord>, AnalysisError> {
        match self.store {
            Some(ref store) => Ok(store.list_analyses(limit)?),
            None => Ok(Vec::new()),
        }
    }

    /// One past analysis by id
    pub fn lookup(&self, id: i64) -> Result<Option<AnalysisRecord>, AnalysisError> {
        match self.store {
            Some(ref store) => Ok(store.get_analysis(id)?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NarrativeConfig;
    use crate::persistence::SqliteAnalysisStore;

    fn offline_analyzer() -> Analyzer {
        let narrator = NarrativeClient::with_api_key(NarrativeConfig::default(), None);
        let playbook = Playbook::parse(
            "## Brute force\nBlock the ip after failed logins.\n## Account takeover\nRotate credentials after a successful login.\n",
        );
        Analyzer::new(DetectionParams::default(), narrator, playbook)
    }

    fn sample_log() -> String {
        let mut lines: Vec<String> = (0..6)
            .map(|i| {
                format!(
                    "Mar 10 12:0{}:00 web01 sshd[{}]: Failed password for root from 10.0.0.5 port 5000{} ssh2",
                    i / 2,
                    100 + i,
                    i
                )
            })
            .collect();
        lines.push("Mar 10 12:04:00 web01 sshd[200]: Accepted password for root from 10.0.0.5 port 50010 ssh2".to_string());
        lines.push("Mar 10 12:05:00 web01 CRON[1]: pam_unix(cron:session): session closed for user root".to_string());
        lines.join("\n")
    }

    #[tokio::test]
    async fn test_analyze_without_store() {
        let report = offline_analyzer().analyze("sample.log", &sample_log()).await.unwrap();

        assert!(report.id.is_none());
        assert_eq!(report.events.len(), 7);
        assert_eq!(report.findings.len(), 3);
        assert_eq!(report.narrative, build_digest(&report.findings));
        assert_eq!(
            report.summary,
            AnalysisSummary {
                total_events: 7,
                failed_attempts: 6,
                successful_logins: 1,
                unique_ips: 1,
                unique_users: 1,
            }
        );
        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(report.events[6].status, "Accepted");
    }

    #[tokio::test]
    async fn test_analyze_persists_and_lists() {
        let store = Arc::new(SqliteAnalysisStore::in_memory().unwrap());
        let analyzer = offline_analyzer().with_store(store).with_top_k(1);

        let report = analyzer.analyze("sample.log", &sample_log()).await.unwrap();
        let id = report.id.unwrap();

        let record = analyzer.lookup(id).unwrap().unwrap();
        assert_eq!(record.source, "sample.log");
        assert_eq!(record.narrative, report.narrative);
        assert_eq!(record.recommendations.len(), 1);
        assert_eq!(analyzer.history(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quiet_log() {
        let report = offline_analyzer()
            .analyze("quiet.log", "nothing here\n")
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert!(report.findings.is_empty());
        assert_eq!(report.narrative, crate::narrative::NO_FINDINGS_DIGEST);
    }

    #[test]
    fn test_event_row_without_timestamp() {
        let event = AuthEvent {
            kind: crate::models::EventKind::Failed,
            timestamp: None,
            user: "root".to_string(),
            source_address: "1.1.1.1".to_string(),
            raw_line: "raw".to_string(),
        };
        let row = EventRow::from(&event);
        assert_eq!(row.timestamp, "N/A");
        assert_eq!(row.status, "Failed");
    }
}
