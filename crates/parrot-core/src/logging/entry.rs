//! One line of a JSONL log file

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp with milliseconds, UTC
    pub ts: String,
    /// trace, debug, info, warn or error
    pub level: String,
    /// Identity of the agent that wrote the entry
    pub agent: String,
    /// Module path of the event
    pub target: String,
    pub msg: String,
    /// Structured fields of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        level: impl Into<String>,
        agent: impl Into<String>,
        target: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: level.into(),
            agent: agent.into(),
            target: target.into(),
            msg: msg.into(),
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Serialize to a single line without the newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_line() {
        let entry = LogEntry::new("info", "1337ABCD", "parrot_core::dispatcher", "Dispatching")
            .with_fields(serde_json::json!({ "kind": "text" }));

        let line = entry.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"agent\":\"1337ABCD\""));
        assert!(line.contains("\"kind\":\"text\""));

        let parsed = LogEntry::from_json_line(&line).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_fields_omitted_when_empty() {
        let line = LogEntry::new("warn", "X", "t", "m").to_json_line().unwrap();
        assert!(!line.contains("fields"));
    }
}
