//! # Mutation Journal
//!
//! Append-only, line-oriented durability log. One committed mutation = one
//! line: a crc32 checksum, a space, and the JSON entry. The checksum covers
//! the JSON bytes exactly as written.
//!
//! Replay tolerates a torn tail: the first line that fails to parse or
//! checksum ends the replay (everything before it is intact, the remainder
//! is a crash artifact). Corruption in the middle is indistinguishable from
//! a torn tail and is treated the same way, with a warning.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::observability::{log_stderr, Severity};

use super::errors::{StoreError, StoreResult};
use super::record::Record;

const JOURNAL_FILE: &str = "journal.log";

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// Record inserted
    Insert { collection: String, record: Record },
    /// Record replaced with its post-update state
    Update { collection: String, record: Record },
    /// Record deleted
    Delete { collection: String, id: String },
    /// Fields purged from every record by a schema alteration
    PurgeFields {
        collection: String,
        fields: Vec<String>,
    },
    /// Collection dropped with all its records
    DropCollection { collection: String },
}

/// Appends journal entries with checksum and immediate flush.
pub struct JournalWriter {
    file: File,
}

impl JournalWriter {
    /// Open (or create) the journal in the given data directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::Journal(format!("create {}: {}", data_dir.display(), e)))?;
        let path = journal_path(data_dir);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Journal(format!("open {}: {}", path.display(), e)))?;
        Ok(Self { file })
    }

    /// Append one entry. The entry is durable when this returns.
    pub fn append(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        let data = serde_json::to_string(entry)
            .map_err(|e| StoreError::Journal(format!("encode entry: {}", e)))?;
        let checksum = crc32fast::hash(data.as_bytes());
        let line = format!("{} {}\n", checksum, data);

        self.file
            .write_all(line.as_bytes())
            .map_err(|e| StoreError::Journal(format!("append: {}", e)))?;
        self.file
            .sync_data()
            .map_err(|e| StoreError::Journal(format!("sync: {}", e)))
    }
}

/// Replay the journal from a data directory. Returns the intact prefix.
pub fn replay(data_dir: &Path) -> StoreResult<Vec<JournalEntry>> {
    let path = journal_path(data_dir);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::Journal(format!("open {}: {}", path.display(), e))),
    };

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn_torn(&path, index, &format!("read failed: {}", e));
                break;
            }
        };
        if line.is_empty() {
            continue;
        }

        let Some((checksum_text, data)) = line.split_once(' ') else {
            warn_torn(&path, index, "missing checksum separator");
            break;
        };
        let Ok(expected) = checksum_text.parse::<u32>() else {
            warn_torn(&path, index, "unparsable checksum");
            break;
        };
        if crc32fast::hash(data.as_bytes()) != expected {
            warn_torn(&path, index, "checksum mismatch");
            break;
        }

        match serde_json::from_str::<JournalEntry>(data) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn_torn(&path, index, &format!("malformed entry: {}", e));
                break;
            }
        }
    }

    Ok(entries)
}

fn warn_torn(path: &Path, line: usize, reason: &str) {
    log_stderr(
        Severity::Warn,
        "journal.torn_tail",
        &[
            ("line", &line.to_string()),
            ("path", &path.display().to_string()),
            ("reason", reason),
        ],
    );
}

fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JOURNAL_FILE)
}
