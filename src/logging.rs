use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const TEXT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
const RING_CAPACITY: usize = 256;

/// One recorded tool invocation: the request, the response (or error
/// payload), and an error flag. Entries are append-only and never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub server: String,
    pub tool: String,
    pub arguments: Value,
    pub response: Value,
    pub is_error: bool,
}

/// Audit trail for tool invocations.
///
/// Every call to [`RequestLogger::record`] appends one human-readable line to
/// the text sink and one JSON line to the machine-readable sink, keeps the
/// entry in a bounded in-memory ring, and returns it for embedding in the
/// caller's response. Sink failures never abort the invocation being logged.
pub struct RequestLogger {
    text_path: PathBuf,
    json_path: PathBuf,
    recent: Mutex<VecDeque<LogEntry>>,
}

impl RequestLogger {
    /// Create a logger writing a timestamped file pair under `log_dir`.
    pub fn new(log_dir: &Path) -> Result<Self, std::io::Error> {
        fs::create_dir_all(log_dir)?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        Ok(Self {
            text_path: log_dir.join(format!("passerelle_{stamp}.log")),
            json_path: log_dir.join(format!("passerelle_{stamp}.jsonl")),
            recent: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        })
    }

    /// Record one request/response pair and return the entry.
    pub fn record(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        response: Value,
        is_error: bool,
    ) -> LogEntry {
        let entry = LogEntry {
            timestamp: chrono::Local::now().to_rfc3339(),
            server: server.to_string(),
            tool: tool.to_string(),
            arguments,
            response,
            is_error,
        };

        if let Err(err) = self.append_text(&entry) {
            warn!(path = %self.text_path.display(), error = %err, "Failed to write text log entry");
        }
        if let Err(err) = self.append_json(&entry) {
            warn!(path = %self.json_path.display(), error = %err, "Failed to write json log entry");
        }

        let mut recent = self.recent.lock().unwrap_or_else(|err| err.into_inner());
        if recent.len() == RING_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(entry.clone());

        entry
    }

    /// Snapshot of the most recent entries, oldest first.
    pub fn recent(&self) -> Vec<LogEntry> {
        let recent = self.recent.lock().unwrap_or_else(|err| err.into_inner());
        recent.iter().cloned().collect()
    }

    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    fn append_text(&self, entry: &LogEntry) -> Result<(), std::io::Error> {
        rotate_if_needed(&self.text_path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.text_path)?;
        let mut writer = BufWriter::new(file);
        let status = if entry.is_error { "ERROR" } else { "OK" };
        writeln!(
            writer,
            "{} {} {}/{} args={} response={}",
            entry.timestamp,
            status,
            entry.server,
            entry.tool,
            compact(&entry.arguments),
            compact(&entry.response),
        )?;
        writer.flush()
    }

    fn append_json(&self, entry: &LogEntry) -> Result<(), std::io::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.json_path)?;
        let mut writer = BufWriter::new(file);
        let line = serde_json::to_string(entry)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Rename the sink to a `.1` sibling once it grows past the size cap.
fn rotate_if_needed(path: &Path) -> Result<(), std::io::Error> {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return Ok(()),
    };
    if size < TEXT_LOG_MAX_BYTES {
        return Ok(());
    }

    let mut rotated = path.as_os_str().to_owned();
    rotated.push(".1");
    fs::rename(path, PathBuf::from(rotated))
}
