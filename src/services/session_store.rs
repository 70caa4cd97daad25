use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::models::{AgentMode, Session, SessionPatch};

type SessionCell = Arc<tokio::sync::Mutex<Session>>;

/// In-memory registry of live booking sessions.
///
/// Each session sits behind its own async mutex so turns on the same session run
/// one at a time while distinct sessions proceed in parallel. The outer map lock
/// is only held for lookups and never across an await.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionCell>>,
    max_idle: Duration,
}

impl SessionStore {
    pub fn new(max_idle: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_idle,
        }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionCell>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cell(&self, id: &str) -> Option<SessionCell> {
        self.map().get(id).cloned()
    }

    fn is_expired(&self, last_activity: NaiveDateTime, now: NaiveDateTime) -> bool {
        now - last_activity > self.max_idle
    }

    pub fn create(&self, mode: AgentMode, greeting: &str) -> Session {
        let session = Session::new(mode, greeting);
        self.map().insert(
            session.session_id.clone(),
            Arc::new(tokio::sync::Mutex::new(session.clone())),
        );
        tracing::info!(session_id = %session.session_id, mode = mode.as_str(), "session created");
        session
    }

    /// Snapshot of the session. Refreshes its liveness; an idle-expired session is dropped.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let mut session = self.acquire(id).await?;
        session.touch();
        Some(session.clone())
    }

    /// Exclusive access for the duration of one turn.
    pub async fn acquire(&self, id: &str) -> Option<OwnedMutexGuard<Session>> {
        let cell = self.cell(id)?;
        let guard = Arc::clone(&cell).lock_owned().await;

        // The session may have been deleted or evicted while we waited on its lock.
        let current = {
            let map = self.map();
            map.get(id).is_some_and(|live| Arc::ptr_eq(live, &cell))
        };
        if !current {
            return None;
        }

        if self.is_expired(guard.last_activity, Utc::now().naive_utc()) {
            drop(guard);
            let mut map = self.map();
            if map.get(id).is_some_and(|live| Arc::ptr_eq(live, &cell)) {
                map.remove(id);
            }
            tracing::info!(session_id = id, "session expired on access");
            return None;
        }
        Some(guard)
    }

    pub async fn update(&self, id: &str, patch: SessionPatch) -> bool {
        match self.acquire(id).await {
            Some(mut session) => {
                patch.apply_to(&mut session);
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = self.map().remove(id).is_some();
        if removed {
            tracing::info!(session_id = id, "session deleted");
        }
        removed
    }

    /// Drops sessions idle for longer than `max_idle`. Sessions mid-turn are skipped.
    pub fn evict_expired(&self, max_idle: Duration) -> usize {
        let now = Utc::now().naive_utc();
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, cell| match cell.try_lock() {
            Ok(session) => now - session.last_activity <= max_idle,
            Err(_) => true,
        });
        before - map.len()
    }

    pub fn max_idle(&self) -> Duration {
        self.max_idle
    }

    pub fn count(&self) -> usize {
        self.map().len()
    }
}
