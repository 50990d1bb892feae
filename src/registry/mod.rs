//! Session registry: a TTL-bounded local cache of in-progress sessions
//!
//! The registry persists a map of session id to [`StoredSession`] as one
//! serialized JSON object under a single fixed key in a [`BlobStore`]. It is
//! a best-effort cache, not a durable store: every operation degrades to an
//! empty or no-op result on storage failure, logging instead of propagating,
//! so no call here can ever fail its caller.
//!
//! Expiry is lazy. Reads drop entries older than the TTL before returning,
//! and the get-all path persists the pruned map back (write-on-read
//! compaction). The single-entry read path prunes only the requested entry
//! without rewriting the whole store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::RegistryConfig;

pub mod store;
pub use store::{BlobStore, JsonFileStore, MemoryStore, STORE_DIR_ENV};

/// Fixed key the whole session map is serialized under
const STORE_KEY: &str = "sessions";

/// A cached in-progress session
///
/// Owned by the registry; callers receive clones and must route mutations
/// through [`SessionRegistry::save_session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Unique session identifier (the registry key)
    pub session_id: String,
    /// Project the session belongs to
    pub project_path: String,
    /// Ordered, opaque message records; the registry never inspects these
    pub messages: Vec<serde_json::Value>,
    /// Instant of last write; bumped on every save
    pub timestamp: DateTime<Utc>,
}

/// TTL-bounded key-value cache of conversational sessions
pub struct SessionRegistry {
    store: Box<dyn BlobStore>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Create a registry over the given blob store
    ///
    /// # Arguments
    ///
    /// * `store` - Backing blob store
    /// * `config` - Registry configuration (TTL)
    pub fn new(store: Box<dyn BlobStore>, config: &RegistryConfig) -> Self {
        Self {
            store,
            ttl: Duration::hours(config.session_ttl_hours as i64),
        }
    }

    /// Create a registry over the default file-backed store
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Storage` if the store directory cannot be
    /// resolved or created. This is the only fallible path; every operation
    /// afterwards is infallible from the caller's point of view.
    pub fn open(config: &RegistryConfig) -> crate::error::Result<Self> {
        let store = JsonFileStore::new(config.store_path.as_deref())?;
        Ok(Self::new(Box::new(store), config))
    }

    /// Upsert a session with `timestamp = now`
    ///
    /// Best-effort full-store write: failures are logged and swallowed, so
    /// callers must not rely on this to learn about write success.
    pub fn save_session(
        &self,
        session_id: &str,
        project_path: &str,
        messages: Vec<serde_json::Value>,
    ) {
        let mut sessions = self.read_map();
        sessions.insert(
            session_id.to_string(),
            StoredSession {
                session_id: session_id.to_string(),
                project_path: project_path.to_string(),
                messages,
                timestamp: Utc::now(),
            },
        );
        self.write_map(&sessions);
        debug!(session_id, "Saved session to registry");
    }

    /// Fetch one session, expiring it on read if stale
    ///
    /// Returns `None` for unknown sessions, expired sessions (which are
    /// removed as a side effect), and on any storage failure.
    pub fn get_session(&self, session_id: &str) -> Option<StoredSession> {
        let sessions = self.read_map();
        let session = sessions.get(session_id)?;
        if !self.is_live(session) {
            debug!(session_id, "Session expired; removing on read");
            self.remove_session(session_id);
            return None;
        }
        Some(session.clone())
    }

    /// Fetch every live session, compacting the store as a side effect
    ///
    /// Expired entries are dropped and, when any were present, the pruned
    /// map is persisted back. A corrupt or unreadable store yields an empty
    /// map, as if never written.
    pub fn get_all_sessions(&self) -> HashMap<String, StoredSession> {
        let sessions = self.read_map();
        let before = sessions.len();
        let live: HashMap<String, StoredSession> = sessions
            .into_iter()
            .filter(|(_, session)| self.is_live(session))
            .collect();

        if live.len() < before {
            debug!(
                expired = before - live.len(),
                "Compacting expired sessions out of the store"
            );
            self.write_map(&live);
        }
        live
    }

    /// Fetch every live session as a sequence, most recently written first
    ///
    /// Equivalent to filtering [`get_all_sessions`](Self::get_all_sessions)
    /// by liveness; the second TTL check is deliberately redundant.
    pub fn get_active_sessions(&self) -> Vec<StoredSession> {
        let mut sessions: Vec<StoredSession> = self
            .get_all_sessions()
            .into_values()
            .filter(|session| self.is_live(session))
            .collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions
    }

    /// Delete a single session
    pub fn remove_session(&self, session_id: &str) {
        let mut sessions = self.read_map();
        if sessions.remove(session_id).is_some() {
            self.write_map(&sessions);
        }
    }

    /// Delete the entire store key
    pub fn clear_all_sessions(&self) {
        if let Err(e) = self.store.remove(STORE_KEY) {
            warn!(error = %e, "Failed to clear session store");
        }
    }

    /// A session is live iff its age is strictly below the TTL
    fn is_live(&self, session: &StoredSession) -> bool {
        Utc::now() - session.timestamp < self.ttl
    }

    /// Deserialize the whole store, treating every failure as an empty map
    fn read_map(&self) -> HashMap<String, StoredSession> {
        let blob = match self.store.get(STORE_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read session store; treating as empty");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&blob) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Corrupt session store; treating as empty");
                HashMap::new()
            }
        }
    }

    /// Serialize and persist the whole store, logging and swallowing failures
    fn write_map(&self, sessions: &HashMap<String, StoredSession>) {
        let blob = match serde_json::to_string(sessions) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session store");
                return;
            }
        };
        if let Err(e) = self.store.set(STORE_KEY, &blob) {
            warn!(error = %e, "Failed to persist session store");
        }
    }
}
