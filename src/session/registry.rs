use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rocket::tokio::sync::Mutex as AsyncMutex;

use crate::model::mongodb::Id;

use super::VotingSession;

/// A live session. The async lock serializes everything a session does, so one
/// session can never run two submissions at once.
pub type SessionHandle = Arc<AsyncMutex<VotingSession>>;

struct Entry {
    handle: SessionHandle,
    last_used: DateTime<Utc>,
}

/// All live voting sessions, keyed by account. Managed by Rocket.
///
/// A session unused for longer than the idle limit is dropped, so sessions
/// whose cookies expired or were abandoned do not pile up.
pub struct Sessions {
    live: Mutex<HashMap<Id, Entry>>,
    idle_limit: Duration,
}

impl Sessions {
    pub fn new(idle_limit: Duration) -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            idle_limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Id, Entry>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.last_used >= self.idle_limit
    }

    /// The account's session, unless it has gone idle.
    pub fn get(&self, account: Id) -> Option<SessionHandle> {
        let now = Utc::now();
        let mut live = self.lock();
        let entry = live.get_mut(&account)?;
        if self.is_stale(entry, now) {
            debug!("Dropping idle voting session for account {account}");
            live.remove(&account);
            return None;
        }
        entry.last_used = now;
        Some(entry.handle.clone())
    }

    /// Register a session, replacing any earlier one for the same account.
    pub fn insert(&self, session: VotingSession) -> SessionHandle {
        self.prune();
        let account = session.account();
        let handle = Arc::new(AsyncMutex::new(session));
        self.lock().insert(
            account,
            Entry {
                handle: handle.clone(),
                last_used: Utc::now(),
            },
        );
        handle
    }

    /// Forget a session, discarding its ballot. Returns whether one existed.
    pub fn remove(&self, account: Id) -> bool {
        self.lock().remove(&account).is_some()
    }

    /// Drop every idle session, returning how many were dropped.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let mut live = self.lock();
        let before = live.len();
        live.retain(|_, entry| !self.is_stale(entry, now));
        let dropped = before - live.len();
        if dropped > 0 {
            debug!("Dropped {dropped} idle voting session(s)");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
