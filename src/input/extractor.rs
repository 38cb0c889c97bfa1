//! Auth log event extraction
//!
//! Turns raw syslog-style SSH auth text into an ordered list of
//! [`AuthEvent`]s. Lines end at `\n`, `\r\n` or a bare `\r`; lines that
//! match neither the failed nor the accepted grammar are skipped.
//!
//! Syslog timestamps carry no year. They are resolved against the current
//! calendar year at extraction time, so a log captured in December and
//! analysed in January resolves into the wrong year. Callers that know the
//! capture year should use [`extract_events_with_year`].

use chrono::{Datelike, Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{AuthEvent, EventKind};

static FAILED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<ts>\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}).*?(?:Failed password|Authentication failure|authentication failure) for(?: invalid user)? (?P<user>\S+) from (?P<ip>\d+\.\d+\.\d+\.\d+)",
    )
    .expect("failed-login pattern is valid")
});

static ACCEPTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<ts>\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}).*?(?:Accepted password|session opened for user|Accepted publickey) for (?P<user>\S+) from (?P<ip>\d+\.\d+\.\d+\.\d+)",
    )
    .expect("accepted-login pattern is valid")
});

/// Extract events from log text, resolving timestamps against the current year
pub fn extract_events(raw_text: &str) -> Vec<AuthEvent> {
    extract_events_with_year(raw_text, Local::now().year())
}

/// Extract events from raw bytes; undecodable sequences are replaced, not rejected
pub fn extract_events_from_bytes(raw: &[u8]) -> Vec<AuthEvent> {
    extract_events(&String::from_utf8_lossy(raw))
}

/// Extract events from log text using an explicit reference year
pub fn extract_events_with_year(raw_text: &str, year: i32) -> Vec<AuthEvent> {
    // bare '\r' separates lines too; the empty piece of a "\r\n" never matches
    let events: Vec<AuthEvent> = raw_text
        .split(['\n', '\r'])
        .filter_map(|line| parse_line(line, year))
        .collect();

    log::debug!("Extracted {} auth event(s)", events.len());
    events
}

/// Parse a single line; the failed grammar takes precedence over the accepted one
pub fn parse_line(line: &str, year: i32) -> Option<AuthEvent> {
    let (kind, caps) = match FAILED_RE.captures(line) {
        Some(caps) => (EventKind::Failed, caps),
        None => (EventKind::Succeeded, ACCEPTED_RE.captures(line)?),
    };

    Some(AuthEvent {
        kind,
        timestamp: resolve_timestamp(&caps["ts"], year),
        user: caps["user"].to_string(),
        source_address: caps["ip"].to_string(),
        raw_line: line.to_string(),
    })
}

/// Resolve a year-less syslog timestamp ("Mar  3 14:02:11") in the given year
pub fn resolve_timestamp(syslog_ts: &str, year: i32) -> Option<NaiveDateTime> {
    let normalized = syslog_ts.split_whitespace().collect::<Vec<_>>().join(" ");
    let with_year = format!("{} {}", normalized, year);

    match NaiveDateTime::parse_from_str(&with_year, "%b %d %H:%M:%S %Y") {
        Ok(ts) => Some(ts),
        Err(e) => {
            log::debug!("Unresolvable syslog timestamp '{}': {}", syslog_ts, e);
            None
        }
    }
}
