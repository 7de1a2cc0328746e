//! Structured JSON logger
//!
//! - One log line = one JSON object = one event
//! - `event` first, `severity` second, remaining fields sorted by key
//! - Synchronous, no buffering
//!
//! INFO and below go to stdout, ERROR and FATAL to stderr. Front ends that
//! own stdout (the CLI report) redirect everything to stderr with
//! `Logger::set_target(LogTarget::Stderr)`.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-entity detail
    Trace = 0,
    /// Normal lifecycle transitions
    Info = 1,
    /// A single index failed, the batch continues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn is_error(&self) -> bool {
        *self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// stdout, errors to stderr
    Split = 0,
    /// everything to stderr
    Stderr = 1,
    /// discard
    Off = 2,
}

static TARGET: AtomicU8 = AtomicU8::new(LogTarget::Split as u8);

/// Structured logger
pub struct Logger;

impl Logger {
    /// Select the process-wide log target
    pub fn set_target(target: LogTarget) {
        TARGET.store(target as u8, Ordering::Relaxed);
    }

    pub fn target() -> LogTarget {
        match TARGET.load(Ordering::Relaxed) {
            1 => LogTarget::Stderr,
            2 => LogTarget::Off,
            _ => LogTarget::Split,
        }
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::render(severity, event, fields);
        match Self::target() {
            LogTarget::Off => {}
            LogTarget::Stderr => Self::write_line(&mut io::stderr(), &line),
            LogTarget::Split if severity.is_error() => Self::write_line(&mut io::stderr(), &line),
            LogTarget::Split => Self::write_line(&mut io::stdout(), &line),
        }
    }

    /// Render one log line, newline included
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut output = String::with_capacity(128);

        output.push_str("{\"event\":");
        push_json_string(&mut output, event);
        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);

        for (key, value) in sorted {
            output.push(',');
            push_json_string(&mut output, key);
            output.push(':');
            push_json_string(&mut output, value);
        }

        output.push_str("}\n");
        output
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // one write per line; logging must never fail the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

fn push_json_string(output: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => output.push_str(&quoted),
        Err(_) => output.push_str("\"\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_render_is_json() {
        let line = Logger::render(Severity::Warn, "POPULATION_FAILED", &[("index_id", "7")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "POPULATION_FAILED");
        assert_eq!(parsed["severity"], "WARN");
        assert_eq!(parsed["index_id"], "7");
    }

    #[test]
    fn test_render_field_order_is_deterministic() {
        let a = Logger::render(Severity::Info, "E", &[("zebra", "1"), ("apple", "2"), ("mango", "3")]);
        let b = Logger::render(Severity::Info, "E", &[("mango", "3"), ("zebra", "1"), ("apple", "2")]);
        assert_eq!(a, b);

        let apple = a.find("apple").unwrap();
        let mango = a.find("mango").unwrap();
        let zebra = a.find("zebra").unwrap();
        assert!(apple < mango && mango < zebra);
        assert!(a.find("\"event\"").unwrap() < a.find("\"severity\"").unwrap());
    }

    #[test]
    fn test_render_escapes_and_is_one_line() {
        let line = Logger::render(Severity::Info, "E", &[("failure", "bad \"value\"\nnext")]);
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["failure"], "bad \"value\"\nnext");
    }
}
