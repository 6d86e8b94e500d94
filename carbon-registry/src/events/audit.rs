//! JSONL audit trail.
//!
//! Appends each registry event as one JSON line so auditors and indexers can
//! tail or replay the file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

use super::{EventSink, RegistryEvent};

/// Event sink that writes events to a JSONL file.
pub struct JsonlAuditSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlAuditSink {
    /// Open (or create) the audit file in append mode.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!("Audit logging initialized to {}", path.display());
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Path of the audit file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every event in an audit file.
    pub fn read_events(path: impl AsRef<Path>) -> std::io::Result<Vec<RegistryEvent>> {
        let content = std::fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(std::io::Error::other))
            .collect()
    }
}

impl EventSink for JsonlAuditSink {
    fn publish(&self, event: &RegistryEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize registry event: {}", e);
                return;
            }
        };

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(e) = writeln!(writer, "{}", jsonl) {
            error!(path = %self.path.display(), "Failed to write audit event: {}", e);
        }
        if let Err(e) = writer.flush() {
            error!(path = %self.path.display(), "Failed to flush audit log: {}", e);
        }
    }
}
