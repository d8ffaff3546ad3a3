//! Core traits for generic WebSocket infrastructure.

use std::fmt::{Debug, Display};

use crate::Result;
use crate::types::{LogLine, Payload};
use crate::ws::WsError;

/// Message parser trait for converting raw text frames to messages.
///
/// Parsing failures never tear down a connection: the client falls back to
/// [`Payload::Raw`] and keeps listening.
///
/// # Example
///
/// ```ignore
/// pub struct EventParser;
///
/// impl MessageParser for EventParser {
///     type Message = MyEvent;
///
///     fn parse(&self, text: &str) -> crate::Result<MyEvent> {
///         Ok(serde_json::from_str(text).map_err(WsError::MessageParse)?)
///     }
/// }
/// ```
pub trait MessageParser: Send + Sync + 'static {
    /// Decoded message type handed to subscribers
    type Message: Debug + Display + Clone + Send + Sync + 'static;

    /// Parse one inbound text frame.
    fn parse(&self, text: &str) -> Result<Self::Message>;

    /// Parse, falling back to the raw text on failure.
    fn decode(&self, text: String) -> (Payload<Self::Message>, Option<crate::error::Error>) {
        match self.parse(&text) {
            Ok(message) => (Payload::Parsed(message), None),
            Err(e) => (Payload::Raw(text), Some(e)),
        }
    }
}

/// Decodes `{"service": ..., "line": ...}` log records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLineParser;

impl MessageParser for LogLineParser {
    type Message = LogLine;

    fn parse(&self, text: &str) -> Result<LogLine> {
        Ok(serde_json::from_str(text).map_err(WsError::MessageParse)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn parses_structured_log_line() {
        let (payload, error) =
            LogLineParser.decode(r#"{"service":"postgresql","line":"checkpoint"}"#.to_owned());

        assert!(error.is_none());
        let line = payload.as_parsed().unwrap();
        assert_eq!(line.service.as_deref(), Some("postgresql"));
        assert_eq!(line.line.as_deref(), Some("checkpoint"));
    }

    #[test]
    fn falls_back_to_raw_text() {
        let (payload, error) = LogLineParser.decode("plain text banner".to_owned());

        assert_eq!(payload, Payload::Raw("plain text banner".to_owned()));
        let error = error.unwrap();
        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::MessageParse(_))
        ));
    }

    #[test]
    fn non_object_json_is_raw() {
        let (payload, error) = LogLineParser.decode("[1, 2, 3]".to_owned());

        assert!(payload.is_raw());
        assert!(error.is_some());
    }
}
