//! Append-only attribution log with crash-safe replay.
//!
//! One [`AttributionRecord`] per line (JSON Lines). Complete lines are always
//! valid JSON; a line torn by a crash mid-write is detected on replay and the
//! file is truncated back to the last complete row.
//!
//! Every append is fsynced before returning, so a row the caller saw succeed
//! is durable. An append that fails part way is rolled back to the end of the
//! last complete row, so later appends never land behind torn bytes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::Result;
use super::fsync::fsync_file;
use crate::types::AttributionRecord;

/// An open attribution log positioned for appending.
pub struct AttributionLog {
    file: File,
    path: PathBuf,
    rows: u64,

    /// Byte length of the complete rows.
    len: u64,
}

impl AttributionLog {
    /// Replays the log at `path`, truncating any torn tail, and opens it for
    /// appending. A missing file is created empty.
    ///
    /// Returns the log together with every row replayed, in append order.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<AttributionRecord>)> {
        let path = path.as_ref().to_path_buf();
        let records = Self::replay(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let len = file.metadata()?.len();

        let log = AttributionLog {
            file,
            path,
            rows: records.len() as u64,
            len,
        };
        Ok((log, records))
    }

    /// Appends one row and fsyncs.
    ///
    /// On failure the file is cut back to its last complete row.
    pub fn append(&mut self, record: &AttributionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.discard_torn_tail()?;
        if let Err(e) = self.write_row(&line) {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial attribution row"
                );
            }
            return Err(e);
        }

        self.len += line.len() as u64;
        self.rows += 1;
        Ok(())
    }

    fn write_row(&mut self, line: &[u8]) -> Result<()> {
        self.file.write_all(line)?;
        fsync_file(&self.file)?;
        Ok(())
    }

    /// Drops bytes past the last complete row, left by an append whose
    /// rollback also failed.
    fn discard_torn_tail(&mut self) -> Result<()> {
        let actual = self.file.metadata()?.len();
        if actual > self.len {
            warn!(
                path = %self.path.display(),
                kept = self.len,
                len = actual,
                "Discarding partial attribution row before append"
            );
            self.file.set_len(self.len)?;
        }
        Ok(())
    }

    /// Number of rows in the log, including replayed ones.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all complete rows, truncating the file at the first line that
    /// does not parse.
    fn replay(path: &Path) -> Result<Vec<AttributionRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut last_valid_pos = 0u64;
        let mut current_pos = 0u64;

        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }

            let line_start = current_pos;
            current_pos += bytes_read as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                last_valid_pos = current_pos;
                continue;
            }

            // A row without its trailing newline was not fully written even
            // if it happens to parse.
            let complete = line.ends_with('\n');
            match serde_json::from_str::<AttributionRecord>(trimmed) {
                Ok(record) if complete => {
                    records.push(record);
                    last_valid_pos = current_pos;
                }
                _ => {
                    last_valid_pos = line_start;
                    break;
                }
            }
        }

        if last_valid_pos < file_len {
            warn!(
                path = %path.display(),
                kept = last_valid_pos,
                len = file_len,
                "Truncating torn tail of attribution log"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(last_valid_pos)?;
            fsync_file(&file)?;
        }

        Ok(records)
    }
}
