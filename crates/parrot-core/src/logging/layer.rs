//! tracing Layer feeding a [`LogFile`]

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::entry::LogEntry;
use super::writer::LogFile;

/// Writes every event it sees to the agent's JSONL file.
///
/// Span context is not recorded; the core logs with structured fields on
/// the event itself.
pub struct JsonlLayer {
    file: Arc<LogFile>,
}

impl JsonlLayer {
    /// Create a layer writing to `{dir}/{date}_{agent}.jsonl`
    pub fn new(dir: impl AsRef<Path>, agent: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            file: Arc::new(LogFile::open(dir, agent)?),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.file.path()
    }
}

impl<S: Subscriber> Layer<S> for JsonlLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = LogEntry::new(
            metadata.level().as_str().to_lowercase(),
            self.file.agent(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        if !visitor.fields.is_empty() {
            entry = entry.with_fields(Value::Object(visitor.fields));
        }

        // A failing log sink must not take the agent down.
        let _ = self.file.append(&entry);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::read_entries;
    use tempfile::TempDir;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_layer_captures_events_with_fields() {
        let temp = TempDir::new().unwrap();
        let layer = JsonlLayer::new(temp.path(), "1337ABCD").unwrap();
        let path = layer.log_path().to_path_buf();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Dispatcher started");
            tracing::warn!(attempt = 2, identity = "ECHOECHO", "Directory lookup failed");
        });

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].msg, "Dispatcher started");
        assert_eq!(entries[0].agent, "1337ABCD");
        assert_eq!(entries[1].level, "warn");
        let fields = entries[1].fields.as_ref().unwrap();
        assert_eq!(fields["attempt"], 2);
        assert_eq!(fields["identity"], "ECHOECHO");
    }
}
