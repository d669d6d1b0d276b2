//! Runs operation scripts on session processes.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::MutexGuard;

use super::id::SessionId;
use super::manager::SessionManager;
use crate::channel::ConsoleChannel;
use crate::error::{Error, ExecutionError, Result, SessionError};
use crate::pool::{ProcessHandle, ProcessPool};
use crate::profile::{ConsoleProfile, Verdict};
use crate::script::{self, Credentials, Login, Operation};

/// Binds sessions to processes and runs scripts on them.
///
/// Nothing is retried: after a failed script the console's menu position
/// is unknown, and replaying steps could repeat a deposit.
#[derive(Debug, Clone)]
pub struct SessionExecutor {
    pool: Arc<ProcessPool>,
    sessions: Arc<SessionManager>,
    profile: Arc<ConsoleProfile>,
}

impl SessionExecutor {
    pub fn new(
        pool: Arc<ProcessPool>,
        sessions: Arc<SessionManager>,
        profile: Arc<ConsoleProfile>,
    ) -> Self {
        Self {
            pool,
            sessions,
            profile,
        }
    }

    pub fn profile(&self) -> &ConsoleProfile {
        &self.profile
    }

    /// Run `op` on the session's process.
    ///
    /// Operations that work from the account menu only run on a process
    /// that a completed [`establish`](Self::establish) left logged in; they
    /// never spawn one. Other operations spawn a process if needed.
    pub async fn execute<O: Operation>(&self, session: &SessionId, op: &O) -> Result<O::Output> {
        let record = self.sessions.require_session(session)?;

        let handle = if op.needs_login() {
            match self.pool.get(session) {
                Some(handle) if handle.is_healthy() => handle,
                stale => {
                    if let Some(handle) = stale {
                        self.pool.terminate_handle(session, handle.id()).await;
                    }
                    warn!("{} for session {}: no logged-in process", op.name(), session);
                    record.set_handle_id(None);
                    return Err(SessionError::NotLoggedIn(session.to_string()).into());
                }
            }
        } else {
            self.pool.get_or_create(session).await?
        };

        record.set_handle_id(Some(handle.id()));
        let result = self.run_on(&handle, session, op).await;
        record.touch();
        result
    }

    /// Log in on a fresh process for the session.
    ///
    /// Any earlier process is discarded first, since the console's menu
    /// position can only be reset by restarting it. A rejected login or a
    /// failed script also discards the new process.
    pub async fn establish(
        &self,
        session: &SessionId,
        credentials: Credentials,
    ) -> Result<Verdict> {
        let record = self.sessions.require_session(session)?;
        let handle = self.pool.respawn(session).await?;
        record.set_handle_id(Some(handle.id()));

        let username = credentials.username.clone();
        let login = Login::new(credentials);
        let result = async {
            let mut channel = lock_channel(&handle).await?;
            let verdict = self.run_locked(&mut channel, &handle, session, &login).await?;
            if verdict.success {
                // Before the channel is released, so queued calls see it
                handle.set_username(username.as_str());
            }
            Ok::<_, Error>(verdict)
        }
        .await;
        record.touch();

        match result {
            Ok(verdict) if verdict.success => {
                info!(
                    "session {} logged in as {} on process {}",
                    session,
                    username,
                    handle.id()
                );
                Ok(verdict)
            }
            Ok(verdict) => {
                info!("session {}: login rejected for {}", session, username);
                self.pool.terminate_handle(session, handle.id()).await;
                record.set_handle_id(None);
                Ok(verdict)
            }
            Err(e) => {
                self.pool.terminate_handle(session, handle.id()).await;
                record.set_handle_id(None);
                Err(e)
            }
        }
    }

    /// Run a self-contained script on a process of its own, then wait for
    /// the process to exit (it is killed after the termination grace).
    pub async fn execute_once<O: Operation>(&self, op: &O) -> Result<O::Output> {
        let handle = self.pool.spawn_unpooled()?;
        let session = handle.session_id().clone();
        let result = self.run_on(&handle, &session, op).await;
        handle.reap(self.pool.config().termination_grace).await;
        result
    }

    async fn run_on<O: Operation>(
        &self,
        handle: &ProcessHandle,
        session: &SessionId,
        op: &O,
    ) -> Result<O::Output> {
        let mut channel = lock_channel(handle).await?;

        // A login queued ahead of this call has finished by now
        if op.needs_login() && handle.username().is_none() {
            warn!(
                "{} for session {}: process {} is not logged in",
                op.name(),
                session,
                handle.id()
            );
            return Err(SessionError::NotLoggedIn(session.to_string()).into());
        }

        self.run_locked(&mut channel, handle, session, op).await
    }

    async fn run_locked<O: Operation>(
        &self,
        channel: &mut ConsoleChannel,
        handle: &ProcessHandle,
        session: &SessionId,
        op: &O,
    ) -> Result<O::Output> {
        handle.touch();

        debug!(
            "running {} for session {} on process {}",
            op.name(),
            session,
            handle.id()
        );
        let steps = op.steps(&self.profile);
        let transcript = script::run(channel, &self.profile, steps)
            .await
            .map_err(|source| {
                warn!(
                    "{} failed for session {} on process {}: {}",
                    op.name(),
                    session,
                    handle.id(),
                    source
                );
                ExecutionError::ScriptFailed {
                    operation: op.name(),
                    session: session.to_string(),
                    source,
                }
            })?;
        handle.touch();

        debug!(
            "{} for session {} finished in {:?}",
            op.name(),
            session,
            transcript.elapsed
        );
        Ok(op.classify(&transcript, &self.profile))
    }
}

/// Wait for the handle's channel, refusing a handle terminated meanwhile.
async fn lock_channel(handle: &ProcessHandle) -> Result<MutexGuard<'_, ConsoleChannel>> {
    let channel = handle.channel().await;
    if handle.is_terminated() {
        return Err(ExecutionError::HandleTerminated {
            handle: handle.id().to_string(),
        }
        .into());
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::script::Balance;
    use crate::session::SessionConfig;
    use crate::transport::{FixedPath, LaunchConfig};

    fn executor(program: &str) -> SessionExecutor {
        let pool = Arc::new(ProcessPool::new(
            LaunchConfig::new(program),
            Arc::new(FixedPath::new(program)),
            PoolConfig::default(),
        ));
        let sessions = Arc::new(SessionManager::new(pool.clone(), SessionConfig::default()));
        SessionExecutor::new(pool, sessions, Arc::new(ConsoleProfile::banking()))
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let executor = executor("/nonexistent/console");
        let err = executor
            .execute(&SessionId::new("nobody"), &Balance::in_session())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_executable_surfaces_as_creation_failure() {
        let executor = executor("/nonexistent/console");
        let session = executor.sessions.create_session("alice").await.unwrap();

        let err = executor
            .establish(session.id(), Credentials::new("alice", "pw1"))
            .await
            .unwrap_err();
        assert!(err.is_creation_failure());
        assert!(session.handle_id().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_operation_needs_logged_in_process() {
        let executor = executor("/bin/cat");
        let session = executor.sessions.create_session("alice").await.unwrap();

        let err = executor
            .execute(session.id(), &Balance::in_session())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotLoggedIn(_))));
        assert!(!executor.pool.contains(session.id()));
        assert!(session.handle_id().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_without_login_is_refused_but_kept() {
        let executor = executor("/bin/cat");
        let session = executor.sessions.create_session("alice").await.unwrap();
        let handle = executor.pool.get_or_create(session.id()).await.unwrap();

        let err = executor
            .execute(session.id(), &Balance::in_session())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotLoggedIn(_))));

        // It may be the process a login is about to run on
        assert!(!handle.is_terminated());
        assert_eq!(executor.pool.get(session.id()).map(|h| h.id()), Some(handle.id()));
        executor.pool.shutdown().await;
    }
}
