use serde::Serialize;

/// Event forwarded to the attached observer
///
/// Serialized with a `type` tag so the browser side can switch on it directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEvent {
    /// Plain console line
    Log { text: String },
    /// Console line tagged WARN
    Warn { text: String },
    /// Console line tagged ERROR, or anything read from stderr
    Error { text: String },
    /// Server process exited
    Stopped { text: String },
    /// Periodic resource sample
    Stats { cpu: f32, ram_mb: u64 },
}

impl LogEvent {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            LogEvent::Log { .. } => "log",
            LogEvent::Warn { .. } => "warn",
            LogEvent::Error { .. } => "error",
            LogEvent::Stopped { .. } => "stopped",
            LogEvent::Stats { .. } => "stats",
        }
    }

    /// Text payload, if the event carries one
    pub fn text(&self) -> Option<&str> {
        match self {
            LogEvent::Log { text }
            | LogEvent::Warn { text }
            | LogEvent::Error { text }
            | LogEvent::Stopped { text } => Some(text),
            LogEvent::Stats { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_serializes_text_variant_with_type_tag() {
        let event = LogEvent::Warn {
            text: "[Server thread/WARN]: low disk".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        insta::assert_snapshot!(json, @r#"{"type":"warn","text":"[Server thread/WARN]: low disk"}"#);
    }

    #[test]
    fn log_event_serializes_stats_without_text() {
        let event = LogEvent::Stats {
            cpu: 12.5,
            ram_mb: 1024,
        };
        let json = serde_json::to_string(&event).unwrap();
        insta::assert_snapshot!(json, @r#"{"type":"stats","cpu":12.5,"ram_mb":1024}"#);
    }

    #[test]
    fn log_event_kind_matches_serialized_tag() {
        let event = LogEvent::Stopped {
            text: "Server stopped".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.kind());
        assert_eq!(event.text(), Some("Server stopped"));
    }
}
