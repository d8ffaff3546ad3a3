use std::fmt;

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Characters of a structured `line` kept in a preview.
pub const LINE_PREVIEW_CHARS: usize = 50;
/// Characters of an undecodable payload kept in a preview.
pub const RAW_PREVIEW_CHARS: usize = 100;

const UNKNOWN_SERVICE: &str = "unknown";

/// A log record streamed by the remote service.
///
/// Both fields are optional and unknown fields are ignored, so any JSON object decodes.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct LogLine {
    /// Name of the service that produced the line (e.g. `karaf`, `postgresql`)
    #[builder(into)]
    pub service: Option<String>,
    /// The log line itself
    #[builder(into)]
    pub line: Option<String>,
}

impl LogLine {
    /// Service name, or `unknown` when absent.
    #[must_use]
    pub fn service_or_unknown(&self) -> &str {
        self.service.as_deref().unwrap_or(UNKNOWN_SERVICE)
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.line.as_deref().unwrap_or_default();
        write!(
            f,
            "{} - {}",
            self.service_or_unknown(),
            truncate(line, LINE_PREVIEW_CHARS)
        )
    }
}

/// An inbound message, decoded when possible.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<M> {
    /// The message decoded into the parser's message type
    Parsed(M),
    /// The message could not be decoded and is kept as received
    Raw(String),
}

impl<M> Payload<M> {
    #[must_use]
    pub fn as_parsed(&self) -> Option<&M> {
        match self {
            Self::Parsed(message) => Some(message),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl<M: fmt::Display> Payload<M> {
    /// Human readable, truncated rendering used for per-message logging.
    #[must_use]
    pub fn preview(&self) -> String {
        match self {
            Self::Parsed(message) => message.to_string(),
            Self::Raw(text) => truncate(text, RAW_PREVIEW_CHARS),
        }
    }
}

/// Keep the first `max_chars` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text.split_at(cut).0),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdefghijk", 10), "abcdefghij...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn log_line_preview_truncates_line() {
        let line = LogLine::builder()
            .service("karaf")
            .line("x".repeat(60))
            .build();

        assert_eq!(line.to_string(), format!("karaf - {}...", "x".repeat(50)));
    }

    #[test]
    fn log_line_without_service_is_unknown() {
        let line = LogLine::builder().line("started").build();

        assert_eq!(line.to_string(), "unknown - started");
    }

    #[test]
    fn raw_preview_truncates_at_hundred() {
        let payload: Payload<LogLine> = Payload::Raw("y".repeat(150));

        assert_eq!(payload.preview(), format!("{}...", "y".repeat(100)));
        assert!(payload.is_raw());
        assert!(payload.as_parsed().is_none());
    }

    #[test]
    fn log_line_ignores_unknown_fields() {
        let line: LogLine =
            serde_json::from_str(r#"{"service":"keycloak","line":"ready","level":"info"}"#)
                .unwrap();

        assert_eq!(line.service.as_deref(), Some("keycloak"));
        assert_eq!(line.line.as_deref(), Some("ready"));
    }
}
