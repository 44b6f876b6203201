//! Event wire format
//!
//! One JSON object per line:
//!
//! ```text
//! {"timestamp":1760000000.123456,"type":"mode","value":"tablet","previous":"tent"}\n
//! ```
//!
//! `previous` is omitted when no prior value was broadcast. Lines longer
//! than [`MAX_LINE_LEN`] and values longer than [`MAX_VALUE_LEN`] are
//! rejected, never truncated.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted line, newline excluded
pub const MAX_LINE_LEN: usize = 512;

/// Longest accepted `value` / `previous`
pub const MAX_VALUE_LEN: usize = 32;

/// Mode value sent to subscribers when the bus shuts down
pub const SHUTDOWN_VALUE: &str = "shutdown";

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Mode,
    Orientation,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Mode => "mode",
            EventKind::Orientation => "orientation",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

impl Event {
    /// Event stamped with the current time
    pub fn new(kind: EventKind, value: &str, previous: Option<&str>) -> Self {
        Self {
            timestamp: now_secs(),
            kind,
            value: value.to_string(),
            previous: previous.map(str::to_string),
        }
    }

    /// Serialize to a newline-terminated line
    pub fn to_line(&self) -> Result<String> {
        self.check_lengths()?;
        let mut line = serde_json::to_string(self)?;
        if line.len() > MAX_LINE_LEN {
            return Err(Error::Protocol(format!(
                "message is {} bytes (max {})",
                line.len(),
                MAX_LINE_LEN
            )));
        }
        line.push('\n');
        Ok(line)
    }

    /// Parse one line (trailing newline optional)
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.len() > MAX_LINE_LEN {
            return Err(Error::Protocol(format!(
                "message is {} bytes (max {})",
                line.len(),
                MAX_LINE_LEN
            )));
        }
        let event: Event = serde_json::from_str(line)
            .map_err(|e| Error::Protocol(format!("malformed event: {}", e)))?;
        event.check_lengths()?;
        Ok(event)
    }

    fn check_lengths(&self) -> Result<()> {
        let fields = std::iter::once(("value", self.value.as_str()))
            .chain(self.previous.as_deref().map(|p| ("previous", p)));
        for (name, text) in fields {
            if text.len() > MAX_VALUE_LEN {
                return Err(Error::Protocol(format!(
                    "{} is {} bytes (max {})",
                    name,
                    text.len(),
                    MAX_VALUE_LEN
                )));
            }
        }
        Ok(())
    }
}

/// True only for the tablet mode value
pub fn is_tablet_mode(value: &str) -> bool {
    value == "tablet"
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let event = Event::new(EventKind::Mode, "tablet", Some("tent"));
        let line = event.to_line().unwrap();
        assert!(line.ends_with('\n'));

        let parsed = Event::parse(&line).unwrap();
        assert_eq!(parsed.kind, EventKind::Mode);
        assert_eq!(parsed.value, "tablet");
        assert_eq!(parsed.previous.as_deref(), Some("tent"));
    }

    #[test]
    fn test_previous_omitted() {
        let line = Event::new(EventKind::Orientation, "portrait", None)
            .to_line()
            .unwrap();
        assert!(!line.contains("previous"));
        assert!(line.contains("\"type\":\"orientation\""));
        assert!(line.starts_with("{\"timestamp\":"));
    }

    #[test]
    fn test_parse_foreign_line() {
        let event = Event::parse(
            r#"{"timestamp":1700000000.5,"type":"orientation","value":"landscape-flipped"}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::Orientation);
        assert_eq!(event.value, "landscape-flipped");
        assert_eq!(event.previous, None);
        assert_eq!(event.timestamp, 1700000000.5);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(Event::parse("not json"), Err(Error::Protocol(_))));
        assert!(Event::parse(r#"{"timestamp":1,"type":"volume","value":"x"}"#).is_err());
        assert!(Event::parse(r#"{"type":"mode","value":"x"}"#).is_err());
    }

    #[test]
    fn test_rejects_long_value() {
        let long = "x".repeat(MAX_VALUE_LEN + 1);
        assert!(Event::new(EventKind::Mode, &long, None).to_line().is_err());

        let line = format!(
            r#"{{"timestamp":1,"type":"mode","value":"laptop","previous":"{}"}}"#,
            long
        );
        assert!(matches!(Event::parse(&line), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_rejects_long_line() {
        let padding = " ".repeat(MAX_LINE_LEN);
        let line = format!(
            r#"{{"timestamp":1,"type":"mode","value":"laptop"{}}}"#,
            padding
        );
        assert!(matches!(Event::parse(&line), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_is_tablet_mode() {
        assert!(is_tablet_mode("tablet"));
        assert!(!is_tablet_mode("tent"));
        assert!(!is_tablet_mode("Tablet"));
        assert!(!is_tablet_mode(""));
    }
}
