//! One pooled console program instance.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};
use tokio::process::Child;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::clock::AccessClock;
use crate::channel::ConsoleChannel;
use crate::session::SessionId;
use crate::transport::{SpawnedProcess, request_stop};

/// Snapshot of a handle for monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleInfo {
    pub id: Uuid,
    pub session_id: SessionId,
    pub username: Option<String>,
    pub pid: Option<u32>,
    pub created_at: SystemTime,
    pub uptime: Duration,
    pub idle_for: Duration,
    pub healthy: bool,
    pub busy: bool,
}

/// A spawned console program, its channel and lifecycle metadata.
///
/// The channel sits behind an async mutex: whoever holds it owns the
/// program's menu position, so one script runs at a time per handle.
pub struct ProcessHandle {
    id: Uuid,
    session_id: SessionId,
    username: StdMutex<Option<String>>,
    created_at: SystemTime,
    clock: AccessClock,
    terminated: AtomicBool,
    pid: Option<u32>,
    program: PathBuf,
    child: StdMutex<Option<Child>>,
    channel: Mutex<ConsoleChannel>,
}

impl ProcessHandle {
    /// Wrap a spawned process for `session_id`.
    pub(crate) fn new(session_id: SessionId, process: SpawnedProcess, search_depth: usize) -> Self {
        let SpawnedProcess {
            child,
            stdin,
            stdout,
            pid,
            program,
        } = process;

        let handle = Self {
            id: Uuid::new_v4(),
            session_id,
            username: StdMutex::new(None),
            created_at: SystemTime::now(),
            clock: AccessClock::new(),
            terminated: AtomicBool::new(false),
            pid,
            program,
            child: StdMutex::new(Some(child)),
            channel: Mutex::new(ConsoleChannel::new(stdin, stdout).with_search_depth(search_depth)),
        };
        handle.touch();
        handle
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Username logged in on this process, once a login succeeded.
    pub fn username(&self) -> Option<String> {
        self.username
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_username(&self, username: impl Into<String>) {
        *self.username.lock().unwrap_or_else(PoisonError::into_inner) = Some(username.into());
    }

    /// Record a use. Each call returns a strictly later timestamp.
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

    pub fn uptime(&self) -> Duration {
        self.clock.uptime()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Whether the OS still reports the process as running.
    pub fn is_alive(&self) -> bool {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Not terminated and still running.
    pub fn is_healthy(&self) -> bool {
        !self.is_terminated() && self.is_alive()
    }

    /// Unused for longer than `timeout`.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }

    /// A script currently holds the channel.
    pub fn is_busy(&self) -> bool {
        self.channel.try_lock().is_err()
    }

    /// Take exclusive use of the channel, waiting for any running script.
    pub async fn channel(&self) -> MutexGuard<'_, ConsoleChannel> {
        self.channel.lock().await
    }

    pub fn info(&self) -> HandleInfo {
        HandleInfo {
            id: self.id,
            session_id: self.session_id.clone(),
            username: self.username(),
            pid: self.pid,
            created_at: self.created_at,
            uptime: self.uptime(),
            idle_for: self.idle_for(),
            healthy: self.is_healthy(),
            busy: self.is_busy(),
        }
    }

    /// Stop the process: close its input, ask it to stop, wait up to
    /// `grace`, then kill it.
    ///
    /// Idempotent; returns false when the handle was already terminated.
    pub async fn terminate(&self, grace: Duration) -> bool {
        self.shut_down(grace, true).await
    }

    /// Wait up to `grace` for a process that was told to exit to do so,
    /// killing it otherwise. Idempotent like [`terminate`](Self::terminate).
    pub async fn reap(&self, grace: Duration) -> bool {
        self.shut_down(grace, false).await
    }

    async fn shut_down(&self, grace: Duration, signal: bool) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }

        // A running script keeps the channel; the kill below ends its reads.
        if let Ok(mut channel) = self.channel.try_lock() {
            channel.close().await;
        }

        let taken = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut child) = taken else {
            return true;
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!("process {} already exited ({})", self.id, status);
            return true;
        }

        if signal {
            if let Some(pid) = self.pid {
                if !request_stop(pid) {
                    debug!("process {}: no stop signal sent", self.id);
                }
            }
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(
                    "process {} for session {} exited ({})",
                    self.id, self.session_id, status
                );
            }
            Ok(Err(e)) => {
                warn!("process {}: error waiting for exit: {}", self.id, e);
            }
            Err(_) => {
                warn!(
                    "process {} did not exit within {:?}, killing",
                    self.id, grace
                );
                if let Err(e) = child.kill().await {
                    warn!("process {}: kill failed: {}", self.id, e);
                }
            }
        }
        true
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}
