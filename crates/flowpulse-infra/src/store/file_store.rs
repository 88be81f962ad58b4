//! File-backed event store.
//!
//! One pretty-printed JSON file per workflow under `{root}/streams/`.
//! Writes are read-modify-write under a per-stream async lock and land via
//! temp file + rename, so readers never see a half-written stream and never
//! need the lock themselves.
//!
//! Content a write cannot carry forward (a corrupt file, or entries that no
//! longer parse) is copied to `{root}/quarantine/` before the stream is
//! rewritten. Quarantine lives outside the streams directory, so any
//! workflow id maps to a stream file.
//!
//! ```text
//! {root}/streams/
//!   wf-1.json
//!   team%2Fnightly.json
//! {root}/quarantine/
//!   wf-7.1772359200000.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use flowpulse_core::repository::{AppendReceipt, EventStore};
use flowpulse_types::error::StoreError;
use flowpulse_types::event::{StoredEvent, WorkflowExecutionEvent};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::format;

pub struct FileEventStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileEventStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until the
    /// first write or health check.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn streams_dir(&self) -> PathBuf {
        self.root.join("streams")
    }

    /// Directory holding stream content moved aside by writes.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join("quarantine")
    }

    /// Path of the stream file for `workflow_id`.
    pub fn stream_path(&self, workflow_id: &str) -> PathBuf {
        self.streams_dir()
            .join(format!("{}.json", format::encode_stream_key(workflow_id)))
    }

    fn stream_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Take exclusive hold of one stream. Appends to it wait until the guard
    /// is dropped; reads are unaffected.
    pub async fn lock_stream(&self, workflow_id: &str) -> OwnedMutexGuard<()> {
        self.stream_lock(&format::encode_stream_key(workflow_id))
            .lock_owned()
            .await
    }
}

/// One read-modify-write of a stream. Owns its paths so it can run detached
/// from the caller.
struct StreamWrite {
    workflow_id: String,
    key: String,
    path: PathBuf,
    streams_dir: PathBuf,
    quarantine_dir: PathBuf,
}

impl StreamWrite {
    fn failure(&self, message: String) -> StoreError {
        StoreError::WriteFailure {
            stream: self.workflow_id.clone(),
            message,
        }
    }

    async fn run(self, event: WorkflowExecutionEvent) -> Result<AppendReceipt, StoreError> {
        tokio::fs::create_dir_all(&self.streams_dir)
            .await
            .map_err(|e| self.failure(format!("cannot create streams directory: {e}")))?;

        let mut events = self.read_existing().await?;
        let sequence = events.len() as u64 + 1;
        events.push(StoredEvent {
            sequence,
            received_at: Utc::now(),
            event,
        });

        self.write(&events)
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        tracing::debug!(workflow_id = %self.workflow_id, sequence, "event appended");
        Ok(AppendReceipt { sequence, events })
    }

    /// Load the committed events. Anything that would be lost by the rewrite
    /// is quarantined first; a corrupt stream restarts empty.
    async fn read_existing(&self) -> Result<Vec<StoredEvent>, StoreError> {
        let workflow_id = self.workflow_id.as_str();
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.failure(format!("cannot read existing stream: {e}"))),
        };

        match format::decode(&bytes) {
            Ok(decoded) => {
                log_normalisation(workflow_id, &decoded);
                if decoded.skipped > 0 {
                    let preserved = self.quarantine().await?;
                    tracing::warn!(
                        workflow_id,
                        skipped = decoded.skipped,
                        preserved_at = %preserved.display(),
                        "stream copied to quarantine before dropping unreadable entries"
                    );
                }
                Ok(decoded.events)
            }
            Err(err) => {
                let preserved = self.quarantine().await?;
                tracing::warn!(
                    workflow_id,
                    error = %err,
                    preserved_at = %preserved.display(),
                    "corrupt stream moved to quarantine, starting a new stream"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Copy the current stream file into the quarantine directory. The
    /// original stays in place until the rewrite replaces it.
    async fn quarantine(&self) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(&self.quarantine_dir)
            .await
            .map_err(|e| self.failure(format!("cannot create quarantine directory: {e}")))?;

        let target = self.quarantine_dir.join(format::quarantine_file_name(
            &self.key,
            Utc::now().timestamp_millis(),
        ));
        tokio::fs::copy(&self.path, &target)
            .await
            .map_err(|e| self.failure(format!("cannot quarantine stream: {e}")))?;
        Ok(target)
    }

    async fn write(&self, events: &[StoredEvent]) -> std::io::Result<()> {
        let bytes = format::encode(&self.workflow_id, events).map_err(std::io::Error::other)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", Uuid::now_v7().simple()));
        let tmp = PathBuf::from(tmp_name);

        let result = replace_file(&tmp, &self.path, &bytes).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }
}

async fn replace_file(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, path).await
}

fn log_normalisation(workflow_id: &str, decoded: &format::DecodedStream) {
    if decoded.drifted {
        tracing::warn!(
            workflow_id,
            events = decoded.events.len(),
            "stream in legacy format, normalised"
        );
    }
    if decoded.skipped > 0 {
        tracing::warn!(
            workflow_id,
            skipped = decoded.skipped,
            "unreadable stream entries dropped"
        );
    }
}

impl EventStore for FileEventStore {
    async fn append(
        &self,
        workflow_id: &str,
        event: WorkflowExecutionEvent,
    ) -> Result<AppendReceipt, StoreError> {
        let key = format::encode_stream_key(workflow_id);
        let lock = self.stream_lock(&key);
        let write = StreamWrite {
            workflow_id: workflow_id.to_string(),
            path: self.stream_path(workflow_id),
            streams_dir: self.streams_dir(),
            quarantine_dir: self.quarantine_dir(),
            key,
        };

        // Detached: dropping this future never interrupts a write that holds
        // the stream lock.
        tokio::spawn(async move {
            let _guard = lock.lock_owned().await;
            write.run(event).await
        })
        .await
        .map_err(|e| StoreError::WriteFailure {
            stream: workflow_id.to_string(),
            message: format!("append task failed: {e}"),
        })?
    }

    async fn load_all(&self, workflow_id: &str) -> Vec<StoredEvent> {
        let path = self.stream_path(workflow_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(workflow_id, error = %e, "stream unreadable, treating as empty");
                return Vec::new();
            }
        };

        match format::decode(&bytes) {
            Ok(decoded) => {
                log_normalisation(workflow_id, &decoded);
                decoded.events
            }
            Err(err) => {
                tracing::warn!(
                    workflow_id,
                    path = %path.display(),
                    error = %err,
                    "stream content is corrupt, treating as empty"
                );
                Vec::new()
            }
        }
    }

    async fn list_streams(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match tokio::fs::read_dir(self.streams_dir()).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::ReadFailure {
                    stream: "*".to_string(),
                    message: e.to_string(),
                });
            }
        };

        let mut ids = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(StoreError::ReadFailure {
                        stream: "*".to_string(),
                        message: e.to_string(),
                    });
                }
            };
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(format::workflow_id_from_file_name)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let dir = self.streams_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", dir.display())))?;

        let probe = dir.join(format!(".health-{}", std::process::id()));
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|e| StoreError::Unavailable(format!("not writable: {e}")))?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot remove probe file: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for FileEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEventStore")
            .field("root", &self.root)
            .field("open_streams", &self.locks.len())
            .finish()
    }
}
