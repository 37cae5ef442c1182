//! In-memory debug sink: every inbound and outbound frame, newest last.
//!
//! Bounded by line count, not entry count: a multi-line frame occupies
//! several lines and the oldest lines are evicted first. Recording never
//! fails and never affects protocol behavior.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use chrono::{SecondsFormat, Utc};
use tracing::debug;

pub const MAX_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Inbound => "-->",
            Direction::Outbound => "<--",
        }
    }
}

pub struct DebugLog {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::with_max_lines(MAX_LINES)
    }
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_lines(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(max_lines.min(MAX_LINES))),
            max_lines,
        }
    }

    /// Record a raw frame.
    pub fn record(&self, direction: Direction, project: &str, raw: &str) {
        debug!(
            component = "debug_log",
            event = "frame",
            direction = ?direction,
            project = %project,
            bytes = raw.len(),
        );
        self.append(format!("[{}] {} {}", timestamp(), direction.arrow(), project), raw);
    }

    /// Record an outbound frame that had no connection to go to.
    pub fn record_undelivered(&self, project: &str, raw: &str) {
        self.append(
            format!("[{}] {} {} (no peer)", timestamp(), Direction::Outbound.arrow(), project),
            raw,
        );
    }

    /// Record a transport or decode problem that produced no frame.
    pub fn note(&self, project: &str, message: &str) {
        self.append(format!("[{}] !! {}", timestamp(), project), message);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn append(&self, header: String, body: &str) {
        let mut lines = self.lock();
        let mut body_lines = body.lines();
        let first = body_lines.next().unwrap_or_default();
        lines.push_back(format!("{header} {first}"));
        lines.extend(body_lines.map(str::to_string));

        while lines.len() > self.max_lines {
            lines.pop_front();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_direction_and_project() {
        let log = DebugLog::new();
        log.record(Direction::Inbound, "/p", r#"{"clientRequest":{}}"#);
        log.record(Direction::Outbound, "/p", r#"{"serverResponse":{}}"#);

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("--> /p {\"clientRequest\""));
        assert!(lines[1].contains("<-- /p {\"serverResponse\""));
    }

    #[test]
    fn multi_line_frames_count_each_line() {
        let log = DebugLog::new();
        log.record(Direction::Outbound, "/p", "{\n  \"a\": 1\n}");
        assert_eq!(log.len(), 3);
        assert_eq!(log.lines()[1], "  \"a\": 1");
    }

    #[test]
    fn evicts_oldest_lines_past_the_bound() {
        let log = DebugLog::new();
        for i in 0..(MAX_LINES + 25) {
            log.record(Direction::Inbound, "/p", &format!("frame-{i}"));
        }

        let lines = log.lines();
        assert_eq!(lines.len(), MAX_LINES);
        assert!(lines[0].ends_with("frame-25"));
        assert!(lines[MAX_LINES - 1].ends_with(&format!("frame-{}", MAX_LINES + 24)));
    }

    #[test]
    fn eviction_can_split_an_entry() {
        let log = DebugLog::with_max_lines(3);
        log.record(Direction::Inbound, "/p", "a\nb");
        log.record(Direction::Inbound, "/p", "c\nd");

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "b");
        assert!(lines[1].ends_with(" c"));
        assert_eq!(lines[2], "d");
    }

    #[test]
    fn lines_carry_utc_timestamps() {
        let log = DebugLog::new();
        log.note("/p", "hello");

        let line = &log.lines()[0];
        let stamp = line
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
            .map(|(stamp, _)| stamp)
            .expect("timestamp prefix");
        let parsed = chrono::DateTime::parse_from_rfc3339(stamp).expect("rfc3339 timestamp");
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn notes_are_marked() {
        let log = DebugLog::new();
        log.note("/p", "parse failed");
        assert!(log.lines()[0].contains("!! /p parse failed"));
    }
}
