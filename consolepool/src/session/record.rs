use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use uuid::Uuid;

use super::id::SessionId;
use crate::pool::AccessClock;

/// An authenticated caller context. Owns at most one process at a time.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    username: String,
    created_at: SystemTime,
    clock: AccessClock,
    active: AtomicBool,
    handle_id: Mutex<Option<Uuid>>,
}

impl Session {
    pub(crate) fn new(id: SessionId, username: impl Into<String>) -> Self {
        let session = Self {
            id,
            username: username.into(),
            created_at: SystemTime::now(),
            clock: AccessClock::new(),
            active: AtomicBool::new(true),
            handle_id: Mutex::new(None),
        };
        session.clock.touch();
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark inactive. Returns whether the session was active.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn touch(&self) -> Instant {
        self.clock.touch();
        self.clock.last_accessed()
    }

    pub fn last_accessed(&self) -> Instant {
        self.clock.last_accessed()
    }

    pub fn idle_for(&self) -> Duration {
        self.clock.idle_for()
    }

    /// Id of the process currently bound to this session.
    pub fn handle_id(&self) -> Option<Uuid> {
        *self.handle_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_handle_id(&self, id: Option<Uuid>) {
        *self.handle_id.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }
}
