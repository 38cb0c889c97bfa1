//! Incremental burst detection for live log streams
//!
//! Tracks failure timestamps per source address and per user in sliding
//! windows, retiring expired entries as newer events arrive. Events are
//! expected in non-decreasing timestamp order, as produced by tailing a log.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet, VecDeque};

use super::burst::DetectionParams;
use crate::models::{AuthEvent, Finding, TargetKind};

/// Sliding window of failure timestamps for one key
#[derive(Debug, Clone, Default)]
struct WindowEntry {
    timestamps: VecDeque<NaiveDateTime>,
}

impl WindowEntry {
    /// Drop timestamps more than `window_seconds` before `now`
    fn retire(&mut self, now: NaiveDateTime, window_seconds: i64) {
        while let Some(front) = self.timestamps.front() {
            if (now - *front).num_seconds() > window_seconds {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn add_and_retire(&mut self, timestamp: NaiveDateTime, window_seconds: i64) {
        self.timestamps.push_back(timestamp);
        self.retire(timestamp, window_seconds);
    }

    fn count_within(&self, now: NaiveDateTime, window_seconds: i64) -> usize {
        self.timestamps
            .iter()
            .filter(|t| {
                let delta = (now - **t).num_seconds();
                (0..=window_seconds).contains(&delta)
            })
            .count()
    }
}

/// Streaming counterpart of [`detect_with_params`](super::detect_with_params)
///
/// Each key reports at most one burst while its window stays alive, matching
/// the batch scan. Once [`prune`](Self::prune) drops an idle key, that key may
/// report again, which keeps memory bounded by the active keys.
pub struct StreamingDetector {
    params: DetectionParams,
    per_ip_failures: HashMap<String, WindowEntry>,
    per_user_failures: HashMap<String, WindowEntry>,
    reported: HashSet<(TargetKind, String)>,
    latest: Option<NaiveDateTime>,
    events_seen: usize,
}

impl StreamingDetector {
    pub fn new(params: DetectionParams) -> Self {
        StreamingDetector {
            params,
            per_ip_failures: HashMap::new(),
            per_user_failures: HashMap::new(),
            reported: HashSet::new(),
            latest: None,
            events_seen: 0,
        }
    }

    /// Feed one event; returns findings it completes (possibly none)
    ///
    /// Events without a resolved timestamp are ignored.
    pub fn observe(&mut self, event: &AuthEvent) -> Vec<Finding> {
        let Some(ts) = event.timestamp else {
            return Vec::new();
        };
        self.events_seen += 1;
        self.latest = Some(self.latest.map_or(ts, |latest| latest.max(ts)));

        let window = self.params.window_seconds();
        let mut findings = Vec::new();

        if event.is_failure() {
            let ip_entry = self
                .per_ip_failures
                .entry(event.source_address.clone())
                .or_default();
            ip_entry.add_and_retire(ts, window);
            if let Some(finding) = self.check_burst(TargetKind::Ip, &event.source_address, ts) {
                findings.push(finding);
            }

            let user_entry = self.per_user_failures.entry(event.user.clone()).or_default();
            user_entry.add_and_retire(ts, window);
            if let Some(finding) = self.check_burst(TargetKind::User, &event.user, ts) {
                findings.push(finding);
            }
        } else {
            let preceding = self
                .per_ip_failures
                .get_mut(&event.source_address)
                .map(|entry| {
                    entry.retire(ts, window);
                    entry.count_within(ts, window)
                })
                .unwrap_or(0);

            if preceding > 0 {
                findings.push(Finding::PostFailureSuccess {
                    source_address: event.source_address.clone(),
                    user: event.user.clone(),
                    success_time: ts,
                    preceding_failure_count: preceding,
                });
            }
        }

        findings
    }

    /// Feed a batch of events in order and collect everything they trigger
    pub fn observe_all<'a, I>(&mut self, events: I) -> Vec<Finding>
    where
        I: IntoIterator<Item = &'a AuthEvent>,
    {
        events
            .into_iter()
            .flat_map(|event| self.observe(event))
            .collect()
    }

    fn check_burst(&mut self, kind: TargetKind, key: &str, ts: NaiveDateTime) -> Option<Finding> {
        let entry = match kind {
            TargetKind::Ip => self.per_ip_failures.get(key)?,
            TargetKind::User => self.per_user_failures.get(key)?,
        };

        let count = entry.timestamps.len();
        if count < self.params.threshold() {
            return None;
        }

        let window_start = *entry.timestamps.front()?;
        if !self.reported.insert((kind, key.to_string())) {
            return None;
        }

        log::debug!("Streaming burst for {} {} ({} failures)", kind, key, count);
        Some(Finding::BruteForceBurst {
            target_kind: kind,
            target_value: key.to_string(),
            count,
            window_start,
            window_end: ts,
        })
    }

    /// Drop keys whose whole window has expired relative to `now` (log time)
    ///
    /// Dropped keys also forget that they already reported a burst.
    pub fn prune(&mut self, now: NaiveDateTime) {
        let window = self.params.window_seconds();
        let mut expired: Vec<(TargetKind, String)> = Vec::new();

        for (kind, map) in [
            (TargetKind::Ip, &mut self.per_ip_failures),
            (TargetKind::User, &mut self.per_user_failures),
        ] {
            map.retain(|key, entry| {
                entry.retire(now, window);
                let keep = !entry.timestamps.is_empty();
                if !keep {
                    expired.push((kind, key.clone()));
                }
                keep
            });
        }

        for key in &expired {
            self.reported.remove(key);
        }
    }

    /// Prune against the newest event timestamp seen so far
    ///
    /// Unlike pruning against the host clock, this is unaffected by logs that
    /// lag behind or run ahead of the local time.
    pub fn prune_idle(&mut self) {
        if let Some(latest) = self.latest {
            self.prune(latest);
        }
    }

    /// Newest event timestamp observed
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.latest
    }

    /// Number of keys currently holding failures in their window
    pub fn tracked_keys(&self) -> usize {
        self.per_ip_failures.len() + self.per_user_failures.len()
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }
}

impl Default for StreamingDetector {
    fn default() -> Self {
        Self::new(DetectionParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detect_with_params;
    use crate::models::EventKind;
    use chrono::{Duration, NaiveDate};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn create_event(kind: EventKind, user: &str, ip: &str, offset_secs: i64) -> AuthEvent {
        AuthEvent {
            kind,
            timestamp: Some(base() + Duration::seconds(offset_secs)),
            user: user.to_string(),
            source_address: ip.to_string(),
            raw_line: String::new(),
        }
    }

    #[test]
    fn test_burst_fires_once_per_key() {
        let mut detector = StreamingDetector::new(DetectionParams::new(3, 5));

        let mut emitted = Vec::new();
        for i in 0..6 {
            let event = create_event(EventKind::Failed, &format!("u{}", i), "1.1.1.1", i * 10);
            let findings = detector.observe(&event);
            if i == 2 {
                assert_eq!(findings.len(), 1, "third failure crosses the threshold");
            }
            emitted.extend(findings);
        }

        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn test_expired_failures_are_retired() {
        let mut detector = StreamingDetector::new(DetectionParams::new(3, 1));

        detector.observe(&create_event(EventKind::Failed, "a", "2.2.2.2", 0));
        detector.observe(&create_event(EventKind::Failed, "b", "2.2.2.2", 10));
        let findings = detector.observe(&create_event(EventKind::Failed, "c", "2.2.2.2", 200));
        assert!(findings.is_empty());

        detector.prune(base() + Duration::seconds(1000));
        assert_eq!(detector.tracked_keys(), 0);
    }

    #[test]
    fn test_success_after_failures() {
        let mut detector = StreamingDetector::default();

        detector.observe(&create_event(EventKind::Failed, "root", "3.3.3.3", 0));
        detector.observe(&create_event(EventKind::Failed, "root", "3.3.3.3", 30));
        let findings = detector.observe(&create_event(EventKind::Succeeded, "root", "3.3.3.3", 300));

        assert_eq!(
            findings,
            vec![Finding::PostFailureSuccess {
                source_address: "3.3.3.3".to_string(),
                user: "root".to_string(),
                success_time: base() + Duration::seconds(300),
                preceding_failure_count: 2,
            }]
        );

        let findings = detector.observe(&create_event(EventKind::Succeeded, "root", "3.3.3.3", 331));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_matches_batch_scan_for_ordered_input() {
        let mut events: Vec<AuthEvent> = (0..8)
            .map(|i| create_event(EventKind::Failed, "root", "10.0.0.5", i * 20))
            .collect();
        events.push(create_event(EventKind::Succeeded, "root", "10.0.0.5", 200));
        events.extend((0..5).map(|i| create_event(EventKind::Failed, "guest", "10.0.0.6", 400 + i * 100)));

        let params = DetectionParams::default();
        let mut detector = StreamingDetector::new(params);
        let mut streamed = detector.observe_all(&events);
        let mut batch = detect_with_params(&events, params);

        let key = |f: &Finding| f.description();
        streamed.sort_by_key(key);
        batch.sort_by_key(key);
        assert_eq!(streamed, batch);
    }

    #[test]
    fn test_untimed_events_ignored() {
        let mut detector = StreamingDetector::new(DetectionParams::new(1, 5));
        let mut event = create_event(EventKind::Failed, "root", "4.4.4.4", 0);
        event.timestamp = None;

        assert!(detector.observe(&event).is_empty());
        assert_eq!(detector.events_seen(), 0);
    }

    #[test]
    fn test_prune_between_polls_keeps_live_windows() {
        // one event per poll, pruning after each one like the watcher loop
        let mut detector = StreamingDetector::default();
        let mut emitted = Vec::new();

        for i in 0..6 {
            let event = create_event(EventKind::Failed, "root", "10.0.0.5", i * 10);
            emitted.extend(detector.observe(&event));
            detector.prune_idle();
        }

        assert_eq!(emitted.len(), 2);
        assert_eq!(detector.latest_timestamp(), Some(base() + Duration::seconds(50)));
        assert_eq!(detector.tracked_keys(), 2);
    }

    #[test]
    fn test_prune_idle_without_events() {
        let mut detector = StreamingDetector::default();
        detector.prune_idle();
        assert_eq!(detector.tracked_keys(), 0);
        assert!(detector.latest_timestamp().is_none());
    }

    #[test]
    fn test_pruned_key_can_report_again() {
        let mut detector = StreamingDetector::new(DetectionParams::new(2, 1));

        detector.observe(&create_event(EventKind::Failed, "a", "6.6.6.6", 0));
        assert_eq!(
            detector.observe(&create_event(EventKind::Failed, "a", "6.6.6.6", 10)).len(),
            2
        );

        // another source moves log time past the window
        detector.observe(&create_event(EventKind::Failed, "b", "7.7.7.7", 1000));
        detector.prune_idle();
        assert_eq!(detector.tracked_keys(), 2);
        assert!(detector.reported.is_empty());

        detector.observe(&create_event(EventKind::Failed, "a", "6.6.6.6", 1010));
        let findings = detector.observe(&create_event(EventKind::Failed, "a", "6.6.6.6", 1020));
        assert_eq!(findings.len(), 2);
    }
}
