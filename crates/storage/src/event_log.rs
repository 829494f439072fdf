// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log with durable writes.
//!
//! Each entry is durable on return from [`EventLog::log`]. A `.pending`
//! file acts as a miniature write-ahead log: the entry is written there
//! first (fsynced), then appended to the main log (fsynced), then the
//! pending file is removed. A crash at any point is recoverable.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::persistence::fsync_dir;
use substrat_core::now_iso;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log not open")]
    NotOpen,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub context: BTreeMap<String, String>,
    pub ts: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Per-agent structured event log.
pub struct EventLog {
    path: PathBuf,
    pending_path: PathBuf,
    context: BTreeMap<String, String>,
    file: Option<File>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, context: BTreeMap<String, String>) -> Self {
        let path = path.into();
        let pending_path = path.with_extension("pending");
        Self {
            path,
            pending_path,
            context,
            file: None,
        }
    }

    /// Open the log file, replaying any pending entry left by a prior crash.
    pub fn open(&mut self) -> Result<(), EventLogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.recover_pending()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if let Some(parent) = self.path.parent() {
            fsync_dir(parent)?;
        }
        self.file = Some(file);
        Ok(())
    }

    /// Append one event. Durable on return.
    pub fn log(&mut self, event: &str, data: Option<Value>) -> Result<(), EventLogError> {
        let Some(file) = self.file.as_mut() else {
            return Err(EventLogError::NotOpen);
        };
        let line = Self::serialize(&self.context, event, data)?;
        Self::write_pending(&self.pending_path, &line)?;
        file.write_all(&line)?;
        file.sync_all()?;
        Self::remove_pending(&self.pending_path)?;
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Open a second, independently-positioned handle onto the same log
    /// file and context. Used to give a wrapped provider session its own
    /// append handle without sharing a `File` with the owning scheduler's
    /// handle — safe because the cooperative scheduling model guarantees
    /// only one append is ever in flight at a time.
    pub fn reopen(&self) -> Result<EventLog, EventLogError> {
        let mut log = EventLog::new(self.path.clone(), self.context.clone());
        log.open()?;
        Ok(log)
    }

    fn serialize(
        context: &BTreeMap<String, String>,
        event: &str,
        data: Option<Value>,
    ) -> Result<Vec<u8>, EventLogError> {
        let entry = LogEntry {
            context: context.clone(),
            ts: now_iso(),
            event: event.to_string(),
            data,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        Ok(line)
    }

    fn write_pending(pending_path: &Path, line: &[u8]) -> Result<(), EventLogError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(pending_path)?;
        file.write_all(line)?;
        file.sync_all()?;
        Ok(())
    }

    fn remove_pending(pending_path: &Path) -> Result<(), EventLogError> {
        match fs::remove_file(pending_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// If a `.pending` file exists, a prior write was interrupted. Replay
    /// it onto the main log if it isn't already there.
    fn recover_pending(&self) -> Result<(), EventLogError> {
        let pending_data = match fs::read(&self.pending_path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if pending_data.is_empty() {
            Self::remove_pending(&self.pending_path)?;
            return Ok(());
        }

        truncate_partial_tail(&self.path)?;

        if self.path.exists() {
            let size = self.path.metadata()?.len();
            if size >= pending_data.len() as u64 {
                let mut f = File::open(&self.path)?;
                f.seek(SeekFrom::Start(size - pending_data.len() as u64))?;
                let mut tail = vec![0u8; pending_data.len()];
                f.read_exact(&mut tail)?;
                if tail == pending_data {
                    Self::remove_pending(&self.pending_path)?;
                    return Ok(());
                }
            }
        }

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(&pending_data)?;
        f.sync_all()?;
        Self::remove_pending(&self.pending_path)?;
        Ok(())
    }
}

/// Remove an incomplete trailing line left by a crash mid-append.
///
/// A well-formed log always ends with `\n`; anything after the last
/// newline is garbage from a torn write.
fn truncate_partial_tail(path: &Path) -> Result<(), EventLogError> {
    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() || content.ends_with(b"\n") {
        return Ok(());
    }
    let truncate_to = match content.iter().rposition(|b| *b == b'\n') {
        Some(idx) => idx + 1,
        None => 0,
    };
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(truncate_to as u64)?;
    file.sync_all()?;
    Ok(())
}

/// Read all entries from an event log file for recovery purposes.
///
/// Tolerant by design: a missing file yields an empty sequence; a corrupt
/// or truncated trailing line is dropped silently; a corrupt line anywhere
/// else in the file is skipped rather than failing the whole read. If a
/// `.pending` write-ahead file sits alongside the log and its bytes are not
/// already the tail of the main log, its entry is appended to the result.
pub fn read_log(path: &Path) -> Result<Vec<LogEntry>, EventLogError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for segment in bytes.split(|b| *b == b'\n') {
        if segment.is_empty() {
            continue;
        }
        if let Ok(text) = std::str::from_utf8(segment) {
            if let Ok(entry) = serde_json::from_str::<LogEntry>(text) {
                entries.push(entry);
            }
        }
    }

    let pending_path = path.with_extension("pending");
    if let Ok(pending_bytes) = fs::read(&pending_path) {
        let trimmed = pending_bytes
            .strip_suffix(b"\n")
            .unwrap_or(&pending_bytes);
        if !trimmed.is_empty() && !bytes.ends_with(&pending_bytes) {
            if let Ok(text) = std::str::from_utf8(trimmed) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(text) {
                    entries.push(entry);
                }
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
