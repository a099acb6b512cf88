//! Append-only JSONL file for one agent

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::LogEntry;

/// Log file `{dir}/{date}_{agent}.jsonl`, opened for appending
pub struct LogFile {
    agent: String,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl LogFile {
    /// Open (or create) today's file for `agent` inside `dir`.
    pub fn open(dir: impl AsRef<Path>, agent: impl Into<String>) -> io::Result<Self> {
        let agent = agent.into();
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = dir.join(format!("{}_{}.jsonl", date, agent));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            agent,
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line and flush it.
    pub fn append(&self, entry: &LogEntry) -> io::Result<()> {
        let line = entry
            .to_json_line()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        let _ = self.writer.lock().flush();
    }
}

/// Read every entry of a JSONL file, skipping lines that do not parse.
pub fn read_entries(path: impl AsRef<Path>) -> io::Result<Vec<LogEntry>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| LogEntry::from_json_line(line).ok())
        .collect())
}
