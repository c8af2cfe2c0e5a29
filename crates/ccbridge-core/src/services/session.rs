//! In-memory session store with idle expiry.
//!
//! Sessions are a soft cache of conversation history, not a system of
//! record: everything lives in process memory and is lost on restart.
//!
//! Concurrency model: the registry is a map from session id to a shared
//! entry. Each entry carries two locks with distinct jobs:
//!
//! - an async mutex over the message log — the per-session serialization
//!   lock. A request holds it from context read through turn persistence, so
//!   overlapping requests on one session queue instead of interleaving.
//! - a sync rwlock over metadata (timestamps, counters), so `list()` and
//!   `stats()` never wait behind an in-flight request.
//!
//! Eviction tombstones an entry under its metadata lock before unmapping it;
//! a late `append_turn` observes the tombstone and fails with `NotFound`
//! rather than resurrecting the record. The sweeper only evicts entries
//! whose serialization lock it can take without waiting — a held lock means
//! the session is mid-request and therefore not idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::ChatMessage;

/// Session-store tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Idle duration after which a session is eligible for eviction.
    pub ttl: Duration,
    /// How often the background sweep runs.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl SessionConfig {
    /// Set the idle TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Detached view of one session's bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub model: Option<String>,
    pub turn_count: u64,
    pub message_count: usize,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub active_sessions: usize,
    pub total_messages_stored: usize,
}

/// Errors produced by session-store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session does not exist, or was evicted mid-request. Callers must
    /// treat this as "session lost" — never fabricate a replacement record.
    #[error("session not found: {0}")]
    NotFound(String),
}

/// Mutable bookkeeping guarded by the metadata lock.
#[derive(Debug)]
struct SessionMeta {
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    model: Option<String>,
    turn_count: u64,
    message_count: usize,
    /// Set exactly once, on eviction or deletion. A tombstoned entry is no
    /// longer in the registry and must reject appends.
    evicted: bool,
}

/// One session's shared state.
struct SessionEntry {
    id: String,
    meta: RwLock<SessionMeta>,
    /// The per-session serialization lock and the message log it guards.
    turns: Arc<Mutex<Vec<ChatMessage>>>,
}

impl SessionEntry {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            meta: RwLock::new(SessionMeta {
                created_at: now,
                last_accessed_at: now,
                model: None,
                turn_count: 0,
                message_count: 0,
                evicted: false,
            }),
            turns: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn touch(&self) {
        self.meta.write().last_accessed_at = Utc::now();
    }

    fn snapshot(&self, ttl: TimeDelta) -> SessionSnapshot {
        let meta = self.meta.read();
        SessionSnapshot {
            id: self.id.clone(),
            created_at: meta.created_at,
            last_accessed_at: meta.last_accessed_at,
            expires_at: meta.last_accessed_at + ttl,
            model: meta.model.clone(),
            turn_count: meta.turn_count,
            message_count: meta.message_count,
        }
    }

    /// Append one user/assistant pair while the caller holds the turn lock.
    ///
    /// The tombstone check and the counter update happen under one metadata
    /// write section, so no reader ever observes a half-applied turn.
    fn append_locked(
        &self,
        log: &mut Vec<ChatMessage>,
        user: ChatMessage,
        assistant: ChatMessage,
        model: Option<String>,
    ) -> Result<(), SessionError> {
        let mut meta = self.meta.write();
        if meta.evicted {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        log.push(user);
        log.push(assistant);
        meta.turn_count += 1;
        meta.message_count = log.len();
        meta.last_accessed_at = Utc::now();
        if model.is_some() {
            meta.model = model;
        }
        Ok(())
    }
}

/// Exclusive access to one session for the duration of a request.
///
/// Holding the handle holds the session's serialization lock: no other
/// request (and no sweep) can touch this session's history until the handle
/// is dropped.
pub struct SessionHandle {
    entry: Arc<SessionEntry>,
    guard: OwnedMutexGuard<Vec<ChatMessage>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.entry.id)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// The session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// The accumulated conversation history.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.guard
    }

    /// Append one completed turn (user message + assistant reply) atomically.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if the session was evicted or deleted while
    /// the request was in flight; the turn is discarded, not resurrected.
    pub fn append_turn(
        &mut self,
        user: ChatMessage,
        assistant: ChatMessage,
        model: Option<String>,
    ) -> Result<(), SessionError> {
        self.entry
            .append_locked(&mut self.guard, user, assistant, model)
    }
}

/// Concurrency-safe registry of conversation sessions.
///
/// Construct one at process start and share it via `Arc`; there is no
/// ambient singleton.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    ttl: TimeDelta,
    sweep_interval: Duration,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(config.ttl).unwrap_or(TimeDelta::MAX),
            sweep_interval: config.sweep_interval,
        }
    }

    fn entry_or_create(&self, id: &str) -> Arc<SessionEntry> {
        if let Some(entry) = self.sessions.read().get(id) {
            return Arc::clone(entry);
        }
        let mut sessions = self.sessions.write();
        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %id, "created session");
                Arc::new(SessionEntry::new(id.to_string()))
            });
        Arc::clone(entry)
    }

    /// Fetch a session's bookkeeping, creating an empty record if absent.
    /// Touches the idle clock.
    pub fn get_or_create(&self, id: &str) -> SessionSnapshot {
        let entry = self.entry_or_create(id);
        entry.touch();
        entry.snapshot(self.ttl)
    }

    /// Peek at a session without creating it or touching its idle clock.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SessionSnapshot> {
        let entry = {
            let sessions = self.sessions.read();
            sessions.get(id).map(Arc::clone)
        };
        entry.map(|e| e.snapshot(self.ttl))
    }

    /// Take exclusive ownership of a session for one request.
    ///
    /// Creates the session if absent, waits for any in-flight request on the
    /// same session to finish, and touches the idle clock. Requests on
    /// distinct sessions proceed fully in parallel.
    pub async fn acquire(&self, id: &str) -> SessionHandle {
        loop {
            let entry = self.entry_or_create(id);
            let guard = Arc::clone(&entry.turns).lock_owned().await;
            if entry.meta.read().evicted {
                // Evicted while we waited; the registry no longer knows this
                // entry, so retry against a fresh one.
                continue;
            }
            entry.touch();
            return SessionHandle { entry, guard };
        }
    }

    /// Append one completed turn to an existing session.
    ///
    /// Standalone variant of [`SessionHandle::append_turn`] for callers that
    /// do not hold the session across a whole request.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if the session does not exist or was evicted.
    pub async fn append_turn(
        &self,
        id: &str,
        user: ChatMessage,
        assistant: ChatMessage,
        model: Option<String>,
    ) -> Result<SessionSnapshot, SessionError> {
        let entry = {
            let sessions = self.sessions.read();
            sessions
                .get(id)
                .map(Arc::clone)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };
        let mut guard = Arc::clone(&entry.turns).lock_owned().await;
        entry.append_locked(&mut guard, user, assistant, model)?;
        Ok(entry.snapshot(self.ttl))
    }

    /// Remove a session. Returns `true` if it existed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(entry) => {
                entry.meta.write().evicted = true;
                info!(session_id = %id, "deleted session");
                true
            }
            None => false,
        }
    }

    /// Snapshot every live session. No live references escape.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.read().values().map(Arc::clone).collect();
        entries.iter().map(|e| e.snapshot(self.ttl)).collect()
    }

    /// Aggregate statistics over live sessions.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.read().values().map(Arc::clone).collect();
        let total_messages_stored = entries.iter().map(|e| e.meta.read().message_count).sum();
        StoreStats {
            active_sessions: entries.len(),
            total_messages_stored,
        }
    }

    /// Evict sessions idle past the TTL. Returns how many were removed.
    ///
    /// Never blocks on a busy session: an entry whose serialization lock is
    /// held is mid-request and is skipped until the next cycle.
    fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let candidates: Vec<(String, Arc<SessionEntry>)> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, entry)| {
                now.signed_duration_since(entry.meta.read().last_accessed_at) > self.ttl
            })
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut evicted = 0;
        for (id, entry) in candidates {
            let Ok(_turns) = entry.turns.try_lock() else {
                continue;
            };
            {
                let mut meta = entry.meta.write();
                if meta.evicted
                    || now.signed_duration_since(meta.last_accessed_at) <= self.ttl
                {
                    continue;
                }
                meta.evicted = true;
            }
            let mut sessions = self.sessions.write();
            if sessions.get(&id).is_some_and(|e| Arc::ptr_eq(e, &entry)) {
                sessions.remove(&id);
            }
            evicted += 1;
            debug!(session_id = %id, "evicted idle session");
        }
        evicted
    }

    /// Start the background TTL sweep.
    ///
    /// The task is owned by the caller through the returned handle and stops
    /// when the cancellation token fires.
    pub fn start_sweeper(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let store = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("session sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = store.sweep_expired();
                        if evicted > 0 {
                            info!(evicted, "session sweep reclaimed idle sessions");
                        }
                    }
                }
            }
        })
    }
}
