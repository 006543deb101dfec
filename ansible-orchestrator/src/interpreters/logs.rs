//! Free-text log output → timestamped entries
//!
//! Timestamp formats are tried in a fixed order: ISO-8601, Apache, syslog.
//! A line carrying none of them continues the previous entry.

use crate::error::Result;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::{Captures, Regex};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    Iso8601,
    Apache,
    Syslog,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogTime {
    Zoned(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Timestamp text as it appeared in the line
    pub timestamp: Option<String>,
    pub format: Option<TimestampFormat>,
    /// Absent for year-less formats or unparseable calendar values
    pub time: Option<LogTime>,
    /// First line plus any continuation lines, newline separated
    pub text: String,
}

pub struct LogInterpreter {
    iso: Regex,
    apache: Regex,
    syslog: Regex,
}

impl LogInterpreter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            iso: Regex::new(
                r"(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2})(?:[.,](\d+))?(Z|[+-]\d{2}:?\d{2})?",
            )?,
            apache: Regex::new(r"(\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2})(?: ([+-]\d{4}))?")?,
            syslog: Regex::new(r"[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}")?,
        })
    }

    pub fn parse(&self, output: &str) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = Vec::new();
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            match self.recognize(line) {
                Some((format, timestamp, time)) => entries.push(LogEntry {
                    timestamp: Some(timestamp),
                    format: Some(format),
                    time,
                    text: line.to_string(),
                }),
                None => match entries.last_mut() {
                    Some(previous) => {
                        previous.text.push('\n');
                        previous.text.push_str(line);
                    }
                    None => entries.push(LogEntry {
                        timestamp: None,
                        format: None,
                        time: None,
                        text: line.to_string(),
                    }),
                },
            }
        }
        entries
    }

    fn recognize(&self, line: &str) -> Option<(TimestampFormat, String, Option<LogTime>)> {
        if let Some(caps) = self.iso.captures(line) {
            return Some((TimestampFormat::Iso8601, caps[0].to_string(), iso_time(&caps)));
        }
        if let Some(caps) = self.apache.captures(line) {
            return Some((TimestampFormat::Apache, caps[0].to_string(), apache_time(&caps)));
        }
        self.syslog
            .find(line)
            .map(|m| (TimestampFormat::Syslog, m.as_str().to_string(), None))
    }
}

fn iso_time(caps: &Captures<'_>) -> Option<LogTime> {
    let fraction = caps.get(3).map(|f| format!(".{}", f.as_str())).unwrap_or_default();
    let local = format!("{}T{}{}", &caps[1], &caps[2], fraction);

    match caps.get(4).map(|z| z.as_str()) {
        Some("Z") => DateTime::parse_from_str(&format!("{}+00:00", local), "%Y-%m-%dT%H:%M:%S%.f%z")
            .ok()
            .map(LogTime::Zoned),
        Some(zone) => DateTime::parse_from_str(&format!("{}{}", local, zone), "%Y-%m-%dT%H:%M:%S%.f%z")
            .ok()
            .map(LogTime::Zoned),
        None => NaiveDateTime::parse_from_str(&local, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(LogTime::Local),
    }
}

fn apache_time(caps: &Captures<'_>) -> Option<LogTime> {
    match caps.get(2) {
        Some(_) => DateTime::parse_from_str(&caps[0], "%d/%b/%Y:%H:%M:%S %z")
            .ok()
            .map(LogTime::Zoned),
        None => NaiveDateTime::parse_from_str(&caps[1], "%d/%b/%Y:%H:%M:%S")
            .ok()
            .map(LogTime::Local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_iso_with_zone() {
        let entries = LogInterpreter::new()
            .unwrap()
            .parse("2024-03-01T12:30:45.250+02:00 nginx: reload");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].format, Some(TimestampFormat::Iso8601));
        match &entries[0].time {
            Some(LogTime::Zoned(t)) => {
                assert_eq!(t.offset().local_minus_utc(), 7200);
                assert_eq!(t.hour(), 12);
            }
            other => panic!("unexpected time: {other:?}"),
        }
    }

    #[test]
    fn test_iso_space_separated_without_zone() {
        let entries = LogInterpreter::new().unwrap().parse("2024-03-01 08:00:00,123 INFO started");
        match &entries[0].time {
            Some(LogTime::Local(t)) => assert_eq!((t.month(), t.day()), (3, 1)),
            other => panic!("unexpected time: {other:?}"),
        }
    }

    #[test]
    fn test_apache_access_line() {
        let line = r#"10.0.0.5 - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.1" 200 612"#;
        let entries = LogInterpreter::new().unwrap().parse(line);
        assert_eq!(entries[0].format, Some(TimestampFormat::Apache));
        assert_eq!(entries[0].timestamp.as_deref(), Some("10/Oct/2023:13:55:36 -0700"));
        assert!(matches!(entries[0].time, Some(LogTime::Zoned(_))));
    }

    #[test]
    fn test_syslog_has_no_calendar_value() {
        let entries = LogInterpreter::new()
            .unwrap()
            .parse("Mar  1 12:00:01 web01 sshd[811]: Accepted publickey");
        assert_eq!(entries[0].format, Some(TimestampFormat::Syslog));
        assert_eq!(entries[0].timestamp.as_deref(), Some("Mar  1 12:00:01"));
        assert!(entries[0].time.is_none());
    }

    #[test]
    fn test_continuation_lines() {
        let output = "\
2024-03-01T10:00:00Z app: request failed
Traceback (most recent call last):
  File \"app.py\", line 3
2024-03-01T10:00:05Z app: recovered
";
        let entries = LogInterpreter::new().unwrap().parse(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text.lines().count(), 3);
        assert!(entries[0].text.ends_with("line 3"));
        assert!(entries[1].text.contains("recovered"));
    }

    #[test]
    fn test_leading_untimed_line_kept() {
        let entries = LogInterpreter::new()
            .unwrap()
            .parse("==> /var/log/app.log <==\nJan 5 00:00:00 host app: x");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp.is_none());
    }

    #[test]
    fn test_iso_preferred_over_syslog() {
        let entries = LogInterpreter::new()
            .unwrap()
            .parse("Mar  1 12:00:01 host app: event at 2024-03-01T12:00:00");
        assert_eq!(entries[0].format, Some(TimestampFormat::Iso8601));
    }
}
