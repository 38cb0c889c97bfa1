//! Batch burst detection
//!
//! Scans a complete, bounded event list for brute-force bursts (per source
//! address and per user) and for successful logins that follow failures from
//! the same address.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{AuthEvent, Finding, TargetKind};

/// Tunables for burst detection
///
/// Non-positive values are accepted: a threshold below one behaves as one
/// (every failure is a burst) and a negative window behaves as a zero-length
/// window, where only failures sharing the same second fall together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Failures needed inside one window to report a burst
    pub failed_threshold: i64,
    /// Window length in minutes (closed interval)
    pub window_minutes: i64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        DetectionParams {
            failed_threshold: 5,
            window_minutes: 5,
        }
    }
}

impl DetectionParams {
    pub fn new(failed_threshold: i64, window_minutes: i64) -> Self {
        DetectionParams {
            failed_threshold,
            window_minutes,
        }
    }

    /// Effective threshold, never below one
    pub fn threshold(&self) -> usize {
        self.failed_threshold.max(1) as usize
    }

    /// Effective window length in seconds, never negative
    pub fn window_seconds(&self) -> i64 {
        self.window_minutes.max(0).saturating_mul(60)
    }
}

/// Detect findings with an explicit threshold and window
pub fn detect_findings(
    events: &[AuthEvent],
    failed_threshold: i64,
    window_minutes: i64,
) -> Vec<Finding> {
    detect_with_params(events, DetectionParams::new(failed_threshold, window_minutes))
}

/// Detect findings over a full event list
///
/// Output order: address bursts, user bursts (buckets in first-seen order),
/// then post-failure successes in chronological order of the success.
pub fn detect_with_params(events: &[AuthEvent], params: DetectionParams) -> Vec<Finding> {
    let timed = sorted_timed(events);
    let mut findings = Vec::new();

    let failures: Vec<&TimedEvent> = timed.iter().filter(|t| t.event.is_failure()).collect();
    let by_ip = group_by(&failures, |e| &e.source_address);
    let by_user = group_by(&failures, |e| &e.user);

    for (key, bucket) in &by_ip {
        if let Some(finding) = first_burst(TargetKind::Ip, key, bucket, params) {
            findings.push(finding);
        }
    }
    for (key, bucket) in &by_user {
        if let Some(finding) = first_burst(TargetKind::User, key, bucket, params) {
            findings.push(finding);
        }
    }

    let ip_index: HashMap<&str, &Vec<&TimedEvent>> = by_ip
        .iter()
        .map(|(key, bucket)| (key.as_str(), bucket))
        .collect();
    let window = params.window_seconds();

    for success in timed.iter().filter(|t| t.event.is_success()) {
        let preceding = ip_index
            .get(success.event.source_address.as_str())
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|f| {
                        let delta = (success.ts - f.ts).num_seconds();
                        (0..=window).contains(&delta)
                    })
                    .count()
            })
            .unwrap_or(0);

        if preceding > 0 {
            findings.push(Finding::PostFailureSuccess {
                source_address: success.event.source_address.clone(),
                user: success.event.user.clone(),
                success_time: success.ts,
                preceding_failure_count: preceding,
            });
        }
    }

    log::debug!(
        "Burst scan over {} timed event(s) produced {} finding(s)",
        timed.len(),
        findings.len()
    );
    findings
}

/// An event whose timestamp resolved
struct TimedEvent<'a> {
    ts: NaiveDateTime,
    event: &'a AuthEvent,
}

/// Drop untimed events and stable-sort the rest by timestamp
fn sorted_timed(events: &[AuthEvent]) -> Vec<TimedEvent<'_>> {
    let mut timed: Vec<TimedEvent<'_>> = events
        .iter()
        .filter_map(|event| event.timestamp.map(|ts| TimedEvent { ts, event }))
        .collect();
    timed.sort_by_key(|t| t.ts);
    timed
}

/// Group events by key, keeping buckets in the order their key was first seen
fn group_by<'a, 'e, F>(events: &[&'a TimedEvent<'e>], key_fn: F) -> Vec<(String, Vec<&'a TimedEvent<'e>>)>
where
    F: Fn(&AuthEvent) -> &String,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<&'a TimedEvent<'e>>)> = Vec::new();

    for &timed in events {
        let key = key_fn(timed.event);
        match positions.get(key.as_str()) {
            Some(&pos) => buckets[pos].1.push(timed),
            None => {
                positions.insert(key.as_str(), buckets.len());
                buckets.push((key.clone(), vec![timed]));
            }
        }
    }

    buckets
}

/// Two-pointer scan; reports only the first window that reaches the threshold
fn first_burst(
    target_kind: TargetKind,
    key: &str,
    bucket: &[&TimedEvent<'_>],
    params: DetectionParams,
) -> Option<Finding> {
    let threshold = params.threshold();
    if bucket.len() < threshold {
        return None;
    }

    let window = params.window_seconds();
    let mut start = 0;

    for i in 0..bucket.len() {
        while (bucket[i].ts - bucket[start].ts).num_seconds() > window {
            start += 1;
        }

        let count = i - start + 1;
        if count >= threshold {
            return Some(Finding::BruteForceBurst {
                target_kind,
                target_value: key.to_string(),
                count,
                window_start: bucket[start].ts,
                window_end: bucket[i].ts,
            });
        }
    }

    None
}
