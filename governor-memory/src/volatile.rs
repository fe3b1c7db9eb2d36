//! In-memory session store for tests and embedded callers.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use governor_primitives::SessionId;
use tokio::sync::RwLock;

use crate::MemoryResult;
use crate::history::History;
use crate::store::{DEFAULT_MAX_ENTRIES, SessionStateStore};

/// Session store keeping every history in process memory.
///
/// Nothing survives the process; each session is capped like the file store.
#[derive(Debug)]
pub struct VolatileSessionStore {
    max_entries: NonZeroUsize,
    sessions: RwLock<HashMap<SessionId, History>>,
}

impl VolatileSessionStore {
    /// Creates an empty store with the provided per-session capacity.
    #[must_use]
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self {
            max_entries,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns how many sessions currently hold a history.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for VolatileSessionStore {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN))
    }
}

#[async_trait]
impl SessionStateStore for VolatileSessionStore {
    async fn load(&self, session: &SessionId) -> MemoryResult<History> {
        let guard = self.sessions.read().await;
        Ok(guard.get(session).cloned().unwrap_or_default())
    }

    async fn save(&self, session: &SessionId, history: &History) -> MemoryResult<()> {
        let mut trimmed = history.clone();
        trimmed.trim_to(self.max_entries.get());
        self.sessions.write().await.insert(session.clone(), trimmed);
        Ok(())
    }

    async fn clear(&self, session: &SessionId) -> MemoryResult<()> {
        let mut guard = self.sessions.write().await;
        if let Some(history) = guard.get_mut(session) {
            *history = History::new();
        }
        Ok(())
    }

    fn max_entries(&self) -> usize {
        self.max_entries.get()
    }
}
