//! Session state persistence.
//!
//! Hook invocations are separate short-lived processes, so the per-session
//! history is the only state they share. Stores treat read-then-write as
//! best-effort: two invocations for the same session that load the same
//! snapshot and save independently lose one of the updates (last writer
//! wins). No locking is performed.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use governor_primitives::SessionId;
use tokio::fs;
use tracing::debug;

use crate::history::History;
use crate::record::HistoryEntry;
use crate::{MemoryError, MemoryResult};

/// Default cap on the number of entries kept per session.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Capability for loading and saving per-session histories.
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    /// Loads the history of a session; unknown sessions yield an empty history.
    async fn load(&self, session: &SessionId) -> MemoryResult<History>;

    /// Overwrites the history of a session, keeping at most
    /// [`max_entries`](Self::max_entries) of the newest entries.
    async fn save(&self, session: &SessionId, history: &History) -> MemoryResult<()>;

    /// Empties the history of a session.
    async fn clear(&self, session: &SessionId) -> MemoryResult<()>;

    /// Returns the per-session entry cap.
    fn max_entries(&self) -> usize;

    /// Appends an entry and persists the trimmed history, returning it.
    async fn append_and_trim(
        &self,
        session: &SessionId,
        entry: HistoryEntry,
    ) -> MemoryResult<History> {
        let mut history = self.load(session).await?;
        history.push(entry);
        history.trim_to(self.max_entries());
        self.save(session, &history).await?;
        Ok(history)
    }

    /// Flags the newest not-yet-failed entry for `tool` as failed.
    ///
    /// Returns whether an entry was flagged.
    async fn mark_last_failed(
        &self,
        session: &SessionId,
        tool: &str,
        reason: Option<String>,
    ) -> MemoryResult<bool> {
        let mut history = self.load(session).await?;
        let marked = history.mark_last_failed(tool, reason);
        self.save(session, &history).await?;
        Ok(marked)
    }
}

/// Store writing one pretty-printed JSON array per session into a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    max_entries: usize,
    io_timeout: Duration,
}

impl FileSessionStore {
    /// Creates a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] when `max_entries` is zero.
    pub fn new(
        dir: impl Into<PathBuf>,
        max_entries: usize,
        io_timeout: Duration,
    ) -> MemoryResult<Self> {
        if max_entries == 0 {
            return Err(MemoryError::InvalidConfig("max_entries must be non-zero"));
        }
        Ok(Self {
            dir: dir.into(),
            max_entries,
            io_timeout,
        })
    }

    /// Returns the directory holding the history files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing the given session.
    #[must_use]
    pub fn path_for(&self, session: &SessionId) -> PathBuf {
        self.dir.join(format!("history-{session}.json"))
    }
}

#[async_trait]
impl SessionStateStore for FileSessionStore {
    async fn load(&self, session: &SessionId) -> MemoryResult<History> {
        let path = self.path_for(session);
        bounded("history load", self.io_timeout, async {
            match fs::read(&path).await {
                Ok(data) => Ok(History::decode_lenient(&data)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(History::new()),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn save(&self, session: &SessionId, history: &History) -> MemoryResult<()> {
        let path = self.path_for(session);
        let mut trimmed = history.clone();
        trimmed.trim_to(self.max_entries);
        let data = serde_json::to_vec_pretty(&trimmed)?;

        bounded("history save", self.io_timeout, async {
            fs::create_dir_all(&self.dir).await?;
            fs::write(&path, data).await?;
            Ok::<(), MemoryError>(())
        })
        .await?;

        debug!(session = %session, entries = trimmed.len(), "history saved");
        Ok(())
    }

    async fn clear(&self, session: &SessionId) -> MemoryResult<()> {
        let path = self.path_for(session);
        bounded("history clear", self.io_timeout, async {
            if fs::try_exists(&path).await? {
                fs::write(&path, b"[]").await?;
            }
            Ok::<(), MemoryError>(())
        })
        .await
    }

    fn max_entries(&self) -> usize {
        self.max_entries
    }
}

async fn bounded<F, T>(operation: &'static str, budget: Duration, future: F) -> MemoryResult<T>
where
    F: Future<Output = MemoryResult<T>>,
{
    tokio::time::timeout(budget, future)
        .await
        .map_err(|_| MemoryError::Timeout {
            operation,
            after: budget,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("governor-store-{}", Uuid::new_v4()));
        path
    }

    fn store(dir: &Path, max_entries: usize) -> FileSessionStore {
        FileSessionStore::new(dir, max_entries, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn append_trim_and_reload() {
        let dir = temp_dir();
        let store = store(&dir, 3);
        let session = SessionId::new("session/one").unwrap();

        for index in 0..5 {
            store
                .append_and_trim(
                    &session,
                    HistoryEntry::at("Read", &json!({ "file_path": format!("/f{index}") }), index),
                )
                .await
                .unwrap();
        }

        assert!(store.path_for(&session).ends_with("history-session_one.json"));
        let history = store.load(&session).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[0].timestamp(), 2);
        assert_eq!(history.entries()[2].timestamp(), 4);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_load_empty() {
        let dir = temp_dir();
        let store = store(&dir, 10);
        let session = SessionId::new("corrupt").unwrap();

        assert!(store.load(&session).await.unwrap().is_empty());

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path_for(&session), "{ not json").unwrap();
        assert!(store.load(&session).await.unwrap().is_empty());

        std::fs::write(store.path_for(&session), r#"{"tool":"Read"}"#).unwrap();
        assert!(store.load(&session).await.unwrap().is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn mark_failed_and_clear() {
        let dir = temp_dir();
        let store = store(&dir, 10);
        let session = SessionId::new("marks").unwrap();

        store
            .append_and_trim(&session, HistoryEntry::at("Bash", &json!({}), 1))
            .await
            .unwrap();
        let marked = store
            .mark_last_failed(&session, "Bash", Some("exit 1".into()))
            .await
            .unwrap();
        assert!(marked);

        let history = store.load(&session).await.unwrap();
        assert!(history.entries()[0].failed());
        assert_eq!(history.entries()[0].failure_reason(), Some("exit 1"));

        store.clear(&session).await.unwrap();
        assert!(store.load(&session).await.unwrap().is_empty());
        let raw = std::fs::read_to_string(store.path_for(&session)).unwrap();
        assert_eq!(raw, "[]");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = FileSessionStore::new(temp_dir(), 0, Duration::from_secs(1))
            .expect_err("zero capacity should fail");
        assert!(matches!(err, MemoryError::InvalidConfig(_)));
    }
}
