use crate::index::{SavePlan, UrlIndex};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use snip_core::error::Result;
use snip_core::{ReadStore, ShortCode, StorageError, Store, UrlRecord, UserId, UserUrl};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

/// One line of the append-only log.
///
/// A tombstone is a full copy of the record with `deleted: true`; on replay
/// the last line for a `short_url` wins. `deleted` defaults to `false` so
/// logs written before tombstones existed still load.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    short_url: ShortCode,
    original_url: String,
    user_id: UserId,
    #[serde(default)]
    deleted: bool,
}

impl From<&UrlRecord> for LogEntry {
    fn from(record: &UrlRecord) -> Self {
        Self {
            short_url: record.short_code.clone(),
            original_url: record.original_url.clone(),
            user_id: record.user_id.clone(),
            deleted: record.deleted,
        }
    }
}

impl From<LogEntry> for UrlRecord {
    fn from(entry: LogEntry) -> Self {
        Self {
            short_code: entry.short_url,
            original_url: entry.original_url,
            user_id: entry.user_id,
            deleted: entry.deleted,
        }
    }
}

/// File-backed implementation of the [`Store`] contract.
///
/// Durable state is a JSON-lines log that is replayed into memory on open.
/// Reads are served from memory. Writes are serialized through the log
/// handle and reach the index only after the log append has been flushed, so
/// a failed write leaves no visible mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    index: RwLock<UrlIndex>,
    log: Mutex<LogWriter>,
}

/// The log handle plus what the next append needs to know about its tail.
#[derive(Debug)]
struct LogWriter {
    file: File,
    /// Set when a failed append could not be rolled back, leaving a partial
    /// line at the end of the log.
    torn: bool,
}

impl FileStore {
    /// Opens (or creates) the log at `path` and replays it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut log = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let mut content = Vec::new();
        log.read_to_end(&mut content).await?;

        let mut index = UrlIndex::default();
        let mut skipped = 0usize;
        for (line_no, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<LogEntry>(line) {
                Ok(entry) => index.apply(entry.into()),
                Err(err) => {
                    skipped += 1;
                    warn!(path = %path.display(), line = line_no + 1, error = %err, "skipping malformed log line");
                }
            }
        }

        // A torn final line must not swallow the next append.
        if content.last().is_some_and(|b| *b != b'\n') {
            log.write_all(b"\n").await?;
            log.flush().await?;
        }

        info!(path = %path.display(), records = index.len(), skipped, "file store loaded");

        Ok(Self {
            path,
            index: RwLock::new(index),
            log: Mutex::new(LogWriter {
                file: log,
                torn: false,
            }),
        })
    }

    /// Flushes and fsyncs the log.
    pub async fn close(&self) -> Result<()> {
        let mut log = self.log.lock().await;
        log.file.flush().await?;
        log.file.sync_all().await?;
        Ok(())
    }

    /// Appends one line per record and flushes.
    ///
    /// On failure the log is truncated back to its previous length so a
    /// partially written line can neither merge with the next append nor
    /// resurrect on replay.
    async fn append(&self, log: &mut LogWriter, records: &[UrlRecord]) -> Result<()> {
        let mut buf = Vec::new();
        if log.torn {
            buf.push(b'\n');
        }
        for record in records {
            serde_json::to_writer(&mut buf, &LogEntry::from(record))
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            buf.push(b'\n');
        }

        let start = log.file.metadata().await?.len();
        let written = match log.file.write_all(&buf).await {
            Ok(()) => log.file.flush().await,
            Err(err) => Err(err),
        };

        match written {
            Ok(()) => {
                log.torn = false;
                Ok(())
            }
            Err(err) => {
                match log.file.set_len(start).await {
                    Ok(()) => warn!(
                        path = %self.path.display(),
                        error = %err,
                        "append failed, log rolled back"
                    ),
                    Err(rollback) => {
                        log.torn = true;
                        error!(
                            path = %self.path.display(),
                            error = %err,
                            rollback_error = %rollback,
                            "append failed and could not be rolled back"
                        );
                    }
                }
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl ReadStore for FileStore {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "file store get");
        self.index.read().get(code)
    }

    async fn get_by_original_url(&self, original_url: &str) -> Result<ShortCode> {
        self.index.read().get_by_original_url(original_url)
    }

    async fn get_all_by_user(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        Ok(self.index.read().get_all_by_user(user))
    }

    async fn ping(&self) -> Result<()> {
        let mut log = self.log.lock().await;
        log.file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save(
        &self,
        code: &ShortCode,
        original_url: &str,
        user: &UserId,
    ) -> Result<ShortCode> {
        let mut log = self.log.lock().await;

        let plan = self.index.read().plan_save(code, original_url)?;
        if let SavePlan::Existing(existing) = plan {
            debug!(code = %existing, "original url already stored");
            return Ok(existing);
        }

        let record = UrlRecord::new(code.clone(), original_url, user.clone());
        self.append(&mut log, std::slice::from_ref(&record)).await?;
        self.index.write().apply(record);

        debug!(code = %code, user_id = %user, "stored url");
        Ok(code.clone())
    }

    async fn batch_delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<u64> {
        let mut log = self.log.lock().await;

        let tombstones = self.index.read().tombstones_for(user, codes);
        if tombstones.is_empty() {
            return Ok(0);
        }

        self.append(&mut log, &tombstones).await?;
        let deleted = tombstones.len() as u64;
        let mut index = self.index.write();
        for record in tombstones {
            index.apply(record);
        }

        debug!(user_id = %user, requested = codes.len(), deleted, "batch delete applied");
        Ok(deleted)
    }
}
