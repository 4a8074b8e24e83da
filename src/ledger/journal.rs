//! Append-only revocation journal on local disk.
//!
//! One JSON record per line. Every append is flushed with `fdatasync` before
//! it is acknowledged, and the in-memory index is only updated afterwards, so
//! a record the caller saw succeed survives a crash. On open the whole file
//! is replayed into the index.
//!
//! A torn final line (crash mid-write, never acknowledged) is truncated away
//! on open. Corruption anywhere else refuses to open.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::store::{RevocationIndex, RevocationRecord, RevocationStore};
use crate::types::{Result, TurnstileError};

struct JournalWriter {
    file: File,
    /// Length of the durable, well-formed prefix
    len: u64,
}

/// Durable revocation store backed by a JSON-lines file.
pub struct JournalRevocationStore {
    path: PathBuf,
    index: RevocationIndex,
    writer: Mutex<JournalWriter>,
}

impl JournalRevocationStore {
    /// Open (or create) the journal at `path` and replay it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&path, "create directory", e))?;
        }

        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(storage_error(&path, "read", e)),
        };

        let index = RevocationIndex::default();
        let valid_len = replay(&path, &contents, &index)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| storage_error(&path, "open", e))?;

        if valid_len < contents.len() as u64 {
            warn!(
                path = %path.display(),
                dropped_bytes = contents.len() as u64 - valid_len,
                "Truncating torn tail of revocation journal"
            );
            file.set_len(valid_len)
                .await
                .map_err(|e| storage_error(&path, "truncate", e))?;
            file.sync_data()
                .await
                .map_err(|e| storage_error(&path, "sync", e))?;
        }

        info!(
            path = %path.display(),
            records = index.len(),
            "Revocation journal opened"
        );

        Ok(Self {
            path,
            index,
            writer: Mutex::new(JournalWriter {
                file,
                len: valid_len,
            }),
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load every complete line into `index`; return the length of the valid prefix.
fn replay(path: &Path, contents: &[u8], index: &RevocationIndex) -> Result<u64> {
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < contents.len() {
        line_no += 1;
        let rest = &contents[offset..];
        let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
            // No terminator: the final write never completed
            return Ok(offset as u64);
        };

        let line = &rest[..newline];
        if !line.iter().all(u8::is_ascii_whitespace) {
            let record: RevocationRecord = serde_json::from_slice(line).map_err(|e| {
                TurnstileError::Storage(format!(
                    "revocation journal {} corrupt at line {}: {}",
                    path.display(),
                    line_no,
                    e
                ))
            })?;
            index.insert(&record);
        }

        offset += newline + 1;
    }

    Ok(offset as u64)
}

fn storage_error(path: &Path, action: &str, err: std::io::Error) -> TurnstileError {
    TurnstileError::Storage(format!(
        "revocation journal {}: {} failed: {}",
        path.display(),
        action,
        err
    ))
}

#[async_trait::async_trait]
impl RevocationStore for JournalRevocationStore {
    async fn contains(&self, token_id: &str, token_value: &str) -> Result<bool> {
        Ok(self.index.contains(token_id, token_value))
    }

    async fn append(&self, record: RevocationRecord) -> Result<bool> {
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| TurnstileError::Internal(format!("Failed to encode record: {e}")))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        if self.index.covers(&record) {
            return Ok(false);
        }

        let written = async {
            writer.file.write_all(&line).await?;
            writer.file.flush().await?;
            writer.file.sync_data().await
        }
        .await;

        if let Err(err) = written {
            // Drop whatever part of the line reached the file so the next
            // append starts on a clean line
            let durable_len = writer.len;
            if let Err(truncate_err) = writer.file.set_len(durable_len).await {
                warn!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "Failed to roll back partial journal write"
                );
            }
            return Err(storage_error(&self.path, "append", err));
        }

        writer.len += line.len() as u64;
        Ok(self.index.insert(&record))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }
}
