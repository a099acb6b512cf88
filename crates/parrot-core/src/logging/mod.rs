//! JSONL log files
//!
//! Optional second log sink next to the console. Every tracing event is
//! appended as one JSON object per line to a file named after the day and
//! the agent's identity:
//!
//! ```text
//! logs/
//! ├── 2026-10-19_1337ABCD.jsonl
//! └── 2026-10-20_1337ABCD.jsonl
//! ```
//!
//! ```ignore
//! use parrot_core::logging::JsonlLayer;
//! use tracing_subscriber::prelude::*;
//!
//! let layer = JsonlLayer::new("./logs", "1337ABCD")?;
//! tracing_subscriber::registry()
//!     .with(layer)
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//! ```
//!
//! Query with jq: `jq 'select(.level == "warn")' logs/*.jsonl`

mod entry;
mod layer;
mod writer;

pub use entry::LogEntry;
pub use layer::JsonlLayer;
pub use writer::{read_entries, LogFile};
