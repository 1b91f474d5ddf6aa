/*!
 * Partitioned response cache and audit log.
 *
 * Every exchange with the generative-text API is appended to a named
 * partition, stored as one JSON document per partition under the log
 * directory. The same store doubles as a prompt cache: looking up a prompt
 * that was answered before returns the recorded response without another
 * remote call.
 */

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, warn};

/// Reserved partition receiving every parse and validation failure
pub const ERROR_PARTITION: &str = "error";

/// One recorded exchange within a partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Model that produced the response
    pub model: String,

    /// The exact prompt as issued
    pub prompt: String,

    /// Parsed response payload; free-text responses are stored as JSON strings
    pub response: Value,

    /// Human-readable failure description for error-partition entries
    pub message: Option<String>,
}

/// Durable store of request/response exchanges, partitioned by log title
///
/// Lookups match the stored prompt against the query string byte-for-byte.
/// The match is intentionally exact: prompts that differ in whitespace or
/// formatting are distinct cache keys, so callers must construct
/// byte-identical prompts to benefit from caching.
pub struct ResponseLog {
    /// Directory holding one JSON document per partition
    log_dir: PathBuf,

    /// Serializes read-modify-rewrite cycles across all partitions
    lock: Mutex<()>,
}

impl ResponseLog {
    /// Create a store rooted at the given directory
    ///
    /// The directory is created lazily on first append, so constructing a
    /// store never touches the filesystem.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Directory this store writes partitions into
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Find the recorded response for a previously issued prompt
    ///
    /// Scans the partition in insertion order and returns the response of the
    /// first entry whose prompt equals `prompt` exactly, or `None` when the
    /// partition does not exist or holds no matching entry.
    pub fn lookup(&self, prompt: &str, partition: &str) -> Option<Value> {
        let _guard = self.lock.lock();
        let entries = self.read_partition(partition);
        let hit = entries
            .into_iter()
            .find(|entry| entry.prompt == prompt)
            .map(|entry| entry.response);
        if hit.is_some() {
            debug!("Cache hit in partition '{}' for '{}'", partition, truncate_text(prompt, 40));
        } else {
            debug!("Cache miss in partition '{}' for '{}'", partition, truncate_text(prompt, 40));
        }
        hit
    }

    /// Append an exchange to a partition, creating the partition if absent
    pub fn append(
        &self,
        model: &str,
        prompt: &str,
        response: Value,
        partition: &str,
        message: Option<String>,
    ) -> Result<()> {
        let _guard = self.lock.lock();

        let mut entries = self.read_partition(partition);
        entries.push(LogEntry {
            model: model.to_string(),
            prompt: prompt.to_string(),
            response,
            message,
        });

        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", self.log_dir.display()))?;
        let path = self.partition_path(partition);
        let content = serde_json::to_string_pretty(&entries)
            .context("Failed to serialize log entries")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write log partition: {}", path.display()))?;
        Ok(())
    }

    /// All entries currently recorded in a partition, in insertion order
    ///
    /// Primarily for diagnostics and tests; an absent partition yields an
    /// empty list.
    pub fn entries(&self, partition: &str) -> Vec<LogEntry> {
        let _guard = self.lock.lock();
        self.read_partition(partition)
    }

    fn partition_path(&self, partition: &str) -> PathBuf {
        self.log_dir.join(format!("{}.json", partition))
    }

    /// Read a partition's entries; missing or unreadable files count as empty
    fn read_partition(&self, partition: &str) -> Vec<LogEntry> {
        let path = self.partition_path(partition);
        if !path.exists() {
            return Vec::new();
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read log partition {}: {}", path.display(), err);
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Treating corrupt log partition {} as empty: {}", path.display(), err);
                Vec::new()
            }
        }
    }
}

/// Truncate text to a maximum length with ellipsis
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_length).collect::<String>())
    }
}
