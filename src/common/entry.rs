// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the logmatch authors

//! Log entry type consumed by every matcher.
//!
//! Entries arrive from external framers/parsers (RFC3339-prefixed files, CRI
//! streams, ...) which are out of scope here; the engine only requires a
//! nanosecond timestamp, the raw line, and an optional source stream label.
//!
//! Timestamps must be non-decreasing within a single matcher's input. Equal
//! timestamps are tolerated as simultaneous events; low-resolution clocks can
//! legitimately emit several entries on the same tick.

use serde::{Deserialize, Serialize};

/// A single timestamped log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp in nanoseconds since Unix epoch.
    pub timestamp: i64,
    /// Raw log line, excluding any framing the reader stripped.
    pub line: String,
    /// Source stream label (e.g. `stdout`/`stderr`), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

impl LogEntry {
    /// Creates an entry with no stream label.
    pub fn new(timestamp: i64, line: impl Into<String>) -> Self {
        Self {
            timestamp,
            line: line.into(),
            stream: None,
        }
    }

    /// Creates an entry tagged with a source stream.
    pub fn with_stream(timestamp: i64, line: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            timestamp,
            line: line.into(),
            stream: Some(stream.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_no_stream() {
        let e = LogEntry::new(42, "boom");
        assert_eq!(e.timestamp, 42);
        assert_eq!(e.line, "boom");
        assert!(e.stream.is_none());
    }

    #[test]
    fn test_with_stream() {
        let e = LogEntry::with_stream(7, "boom", "stderr");
        assert_eq!(e.stream.as_deref(), Some("stderr"));
    }

    #[test]
    fn test_serde_roundtrip_omits_empty_stream() {
        let e = LogEntry::new(1, "x");
        let js = serde_json::to_string(&e).unwrap();
        assert!(!js.contains("stream"));
        let back: LogEntry = serde_json::from_str(&js).unwrap();
        assert_eq!(back, e);
    }
}
