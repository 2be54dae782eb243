use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use nanoid::nanoid;

use crate::config::SessionConfig;
use crate::error::{BarneyError, Result};
use crate::services::SessionHistory;

const MAX_SESSION_ID_LEN: usize = 64;

/// One client conversation.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub history: SessionHistory,
}

/// Shared handle to a session. Requests for the same session serialize on
/// this lock; distinct sessions never contend.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// In-memory session registry.
///
/// Sessions expire after `ttl` without activity and the least recently used
/// session is dropped once `capacity` is reached. Nothing is persisted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<LruCache<String, SessionEntry>>>,
    ttl: Duration,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl: Duration::from_secs(config.ttl_secs),
            max_turns: config.max_turns,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, SessionEntry>> {
        // No operation leaves the map half-updated, so poisoning is recoverable.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &SessionEntry) -> bool {
        entry.last_seen.elapsed() >= self.ttl
    }

    /// Returns the live session for `session_id`, creating it when the id is
    /// unknown or expired. Without an id a fresh session with a generated id
    /// is created.
    pub fn checkout(&self, session_id: Option<&str>) -> Result<(String, SessionHandle)> {
        let id = match session_id {
            Some(id) => {
                validate_session_id(id)?;
                id.to_string()
            }
            None => nanoid!(),
        };

        let mut sessions = self.lock();

        if let Some(entry) = sessions.get_mut(&id) {
            if entry.last_seen.elapsed() < self.ttl {
                entry.last_seen = Instant::now();
                return Ok((id, Arc::clone(&entry.handle)));
            }
            tracing::debug!(session_id = %id, "Session expired, starting a new one");
        }

        let handle = Arc::new(tokio::sync::Mutex::new(Session {
            id: id.clone(),
            created_at: Utc::now(),
            history: SessionHistory::new(self.max_turns),
        }));

        if let Some((evicted, _)) = sessions.push(
            id.clone(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_seen: Instant::now(),
            },
        ) {
            if evicted != id {
                tracing::debug!(session_id = %evicted, "Session evicted at capacity");
            }
        }

        Ok((id, handle))
    }

    /// Looks up a live session without counting as activity.
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.lock();
        sessions
            .peek(session_id)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| Arc::clone(&entry.handle))
    }

    /// Ends a session. Returns whether a live session was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.lock();
        sessions
            .pop(session_id)
            .is_some_and(|entry| !self.is_expired(&entry))
    }

    /// Drops every expired session and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.pop(id);
        }

        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return Err(BarneyError::Validation(format!(
            "Session id must be between 1 and {MAX_SESSION_ID_LEN} characters"
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BarneyError::Validation(
            "Session id may only contain ASCII letters, digits, '-' and '_'".to_string(),
        ));
    }

    Ok(())
}
