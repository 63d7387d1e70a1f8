//! Client session cache state.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::source::MemoryLedger;

use super::SchedulerKind;

/// Default number of client sessions whose cache state is tracked.
pub const DEFAULT_SESSION_CAPACITY: usize = 64;

/// Cache state of one client session.
///
/// A ledger's byte counts only mean something for the data-bin layout of
/// the codestream and scheduler that produced them, so switching either
/// starts the session over.
#[derive(Debug, Default)]
pub struct SessionLedger {
    target: Option<String>,
    scheduler: Option<SchedulerKind>,
    ledger: MemoryLedger,
}

impl SessionLedger {
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        &mut self.ledger
    }

    pub fn scheduler(&self) -> Option<SchedulerKind> {
        self.scheduler
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Bind the session to a codestream and scheduler. Returns `true` if
    /// recorded state was dropped.
    pub fn bind(&mut self, target: &str, scheduler: SchedulerKind) -> bool {
        if self.target.as_deref() == Some(target) && self.scheduler == Some(scheduler) {
            return false;
        }
        let had_state = !self.ledger.is_empty();
        self.ledger.clear();
        self.target = Some(target.to_string());
        self.scheduler = Some(scheduler);
        had_state
    }
}

/// Per-session ledgers in an LRU. An evicted session simply starts again
/// from an empty cache.
pub struct LedgerStore {
    sessions: RwLock<LruCache<String, Arc<Mutex<SessionLedger>>>>,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// The ledger of a session, created empty on first use.
    pub async fn session(&self, session: &str) -> Arc<Mutex<SessionLedger>> {
        let mut sessions = self.sessions.write().await;
        if let Some(ledger) = sessions.get(session) {
            return Arc::clone(ledger);
        }
        debug!(session, "New client session");
        let ledger = Arc::new(Mutex::new(SessionLedger::default()));
        sessions.put(session.to_string(), Arc::clone(&ledger));
        ledger
    }

    /// Forget a session.
    pub async fn remove(&self, session: &str) -> bool {
        self.sessions.write().await.pop(session).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
