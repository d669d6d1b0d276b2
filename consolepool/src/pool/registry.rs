//! Session-to-process registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use log::{debug, info, warn};
use uuid::Uuid;

use super::config::PoolConfig;
use super::handle::{HandleInfo, ProcessHandle};
use crate::error::ProcessError;
use crate::session::SessionId;
use crate::transport::{ExecutableLocator, LaunchConfig, spawn};

/// Handle counts at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub healthy: usize,
    pub idle: usize,
}

/// What one sweep evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub unhealthy: usize,
    pub idle: usize,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.unhealthy + self.idle
    }
}

/// Registry of one process per session.
///
/// All registry mutation goes through these methods. Handles are removed
/// from the map before they are terminated, so a lookup never returns a
/// handle that is being shut down.
pub struct ProcessPool {
    handles: Mutex<HashMap<SessionId, Arc<ProcessHandle>>>,
    launch: LaunchConfig,
    locator: Arc<dyn ExecutableLocator>,
    config: PoolConfig,
    search_depth: usize,
}

impl ProcessPool {
    pub fn new(
        launch: LaunchConfig,
        locator: Arc<dyn ExecutableLocator>,
        config: PoolConfig,
    ) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            launch,
            locator,
            config,
            search_depth: 1000,
        }
    }

    /// Set the prompt search depth of new channels.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<ProcessHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_handle(&self, session: &SessionId) -> Result<ProcessHandle, ProcessError> {
        let process = spawn(&self.launch, self.locator.as_ref(), session.as_str())?;
        Ok(ProcessHandle::new(session.clone(), process, self.search_depth))
    }

    /// Return the session's healthy handle, or spawn a new one after
    /// discarding any stale handle.
    pub async fn get_or_create(
        &self,
        session: &SessionId,
    ) -> Result<Arc<ProcessHandle>, ProcessError> {
        self.acquire(session, true).await
    }

    /// Discard any handle the session has and spawn a fresh one.
    pub async fn respawn(&self, session: &SessionId) -> Result<Arc<ProcessHandle>, ProcessError> {
        self.acquire(session, false).await
    }

    async fn acquire(
        &self,
        session: &SessionId,
        reuse: bool,
    ) -> Result<Arc<ProcessHandle>, ProcessError> {
        let (admitted, stale) = {
            let mut handles = self.registry();

            if reuse {
                if let Some(handle) = handles.get(session) {
                    if handle.is_healthy() {
                        handle.touch();
                        return Ok(handle.clone());
                    }
                }
            }

            let stale = handles.remove(session);
            (self.check_capacity(&handles), stale)
        };

        if let Some(stale) = stale {
            info!(
                "replacing process {} for session {}",
                stale.id(),
                session
            );
            stale.terminate(self.config.termination_grace).await;
        }

        // The locator and fork run without the registry locked
        let mut discarded = Vec::new();
        let result = admitted
            .and_then(|()| self.spawn_handle(session))
            .and_then(|handle| self.bind(session, Arc::new(handle), reuse, &mut discarded));

        let grace = self.config.termination_grace;
        join_all(discarded.iter().map(|handle| {
            debug!("discarding process {} for session {}", handle.id(), session);
            handle.terminate(grace)
        }))
        .await;

        match &result {
            Ok(handle) => debug!("session {} bound to process {}", session, handle.id()),
            Err(e) => warn!("no process for session {}: {}", session, e),
        }
        result
    }

    /// Register a freshly spawned handle, settling races with callers that
    /// bound the session while it was spawning.
    fn bind(
        &self,
        session: &SessionId,
        handle: Arc<ProcessHandle>,
        reuse: bool,
        discarded: &mut Vec<Arc<ProcessHandle>>,
    ) -> Result<Arc<ProcessHandle>, ProcessError> {
        let mut handles = self.registry();
        let current = handles.get(session).cloned();

        match current {
            Some(current) if reuse && current.is_healthy() => {
                current.touch();
                discarded.push(handle);
                Ok(current)
            }
            Some(_) => {
                discarded.extend(handles.insert(session.clone(), handle.clone()));
                Ok(handle)
            }
            None => match self.check_capacity(&handles) {
                Ok(()) => {
                    handles.insert(session.clone(), handle.clone());
                    Ok(handle)
                }
                Err(e) => {
                    discarded.push(handle);
                    Err(e)
                }
            },
        }
    }

    fn check_capacity(
        &self,
        handles: &HashMap<SessionId, Arc<ProcessHandle>>,
    ) -> Result<(), ProcessError> {
        match self.config.max_processes {
            Some(limit) if handles.len() >= limit => Err(ProcessError::PoolExhausted { limit }),
            _ => Ok(()),
        }
    }

    /// Spawn a process that is not registered under any session.
    pub fn spawn_unpooled(&self) -> Result<ProcessHandle, ProcessError> {
        let session = SessionId::new(format!("one-shot-{}", Uuid::new_v4()));
        self.spawn_handle(&session)
    }

    /// The session's registered handle, if any. Does not count as a use.
    pub fn get(&self, session: &SessionId) -> Option<Arc<ProcessHandle>> {
        self.registry()
            .get(session)
            .filter(|h| !h.is_terminated())
            .cloned()
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.registry().contains_key(session)
    }

    /// Remove and stop the session's handle. Idempotent; returns whether a
    /// handle was removed.
    pub async fn terminate(&self, session: &SessionId) -> bool {
        let removed = self.registry().remove(session);
        match removed {
            Some(handle) => {
                info!("terminating process {} for session {}", handle.id(), session);
                handle.terminate(self.config.termination_grace).await;
                true
            }
            None => false,
        }
    }

    /// Remove and stop the session's handle only if it is still `handle_id`.
    pub async fn terminate_handle(&self, session: &SessionId, handle_id: Uuid) -> bool {
        let removed = {
            let mut handles = self.registry();
            match handles.get(session) {
                Some(h) if h.id() == handle_id => handles.remove(session),
                _ => None,
            }
        };
        match removed {
            Some(handle) => {
                info!("terminating process {} for session {}", handle_id, session);
                handle.terminate(self.config.termination_grace).await;
                true
            }
            None => false,
        }
    }

    /// Evict handles that are dead or idle past the timeout. Handles with
    /// a running script are never evicted for idleness.
    pub async fn sweep(&self) -> SweepReport {
        let idle_timeout = self.config.idle_timeout;
        let mut report = SweepReport::default();
        let mut evicted = Vec::new();

        self.registry().retain(|session, handle| {
            let reason = if !handle.is_healthy() {
                report.unhealthy += 1;
                "unhealthy"
            } else if !handle.is_busy() && handle.is_idle(idle_timeout) {
                report.idle += 1;
                "idle"
            } else {
                return true;
            };
            info!(
                "evicting {} process {} for session {}",
                reason,
                handle.id(),
                session
            );
            evicted.push(handle.clone());
            false
        });

        let grace = self.config.termination_grace;
        join_all(evicted.iter().map(|h| h.terminate(grace))).await;
        report
    }

    pub fn stats(&self) -> PoolStats {
        let idle_timeout = self.config.idle_timeout;
        let handles = self.registry();
        PoolStats {
            total: handles.len(),
            healthy: handles.values().filter(|h| h.is_healthy()).count(),
            idle: handles.values().filter(|h| h.is_idle(idle_timeout)).count(),
        }
    }

    pub fn handles(&self) -> Vec<HandleInfo> {
        self.registry().values().map(|h| h.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    /// Terminate every handle, waiting at most the shutdown timeout.
    ///
    /// Handles still stopping at the deadline are dropped, which kills
    /// their processes.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.registry().drain().map(|(_, h)| h).collect();
        if handles.is_empty() {
            return;
        }
        info!("shutting down {} processes", handles.len());

        let grace = self.config.termination_grace;
        let all = join_all(handles.iter().map(|h| h.terminate(grace)));
        if tokio::time::timeout(self.config.shutdown_timeout, all)
            .await
            .is_err()
        {
            warn!(
                "shutdown did not finish within {:?}, forcing",
                self.config.shutdown_timeout
            );
        }
    }
}

impl std::fmt::Debug for ProcessPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPool")
            .field("launch", &self.launch)
            .field("config", &self.config)
            .field("handles", &self.len())
            .finish_non_exhaustive()
    }
}
