//! Service facade wiring the pool, sessions, executor and supervisor.
//!
//! [`Service`] is what a request layer talks to. Session-bound operations
//! run on the session's pooled process; credentialed operations run on a
//! throwaway process that logs in, does its work and exits.

mod builder;

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

pub use builder::ServiceBuilder;

use crate::channel::Transaction;
use crate::error::Result;
use crate::pool::{HandleInfo, PoolStats, ProcessPool, SupervisorHandle};
use crate::profile::{ConsoleProfile, Verdict};
use crate::script::{
    Authenticate, Balance, Credentials, Deposit, History, Operation, Register, Withdraw,
};
use crate::session::{Session, SessionExecutor, SessionId, SessionManager};

/// Pooled access to a console program for many concurrent sessions.
#[derive(Debug)]
pub struct Service {
    pool: Arc<ProcessPool>,
    sessions: Arc<SessionManager>,
    executor: SessionExecutor,
    supervisor: Mutex<Option<SupervisorHandle>>,
}

impl Service {
    pub(crate) fn new(
        pool: Arc<ProcessPool>,
        sessions: Arc<SessionManager>,
        executor: SessionExecutor,
        supervisor: Option<SupervisorHandle>,
    ) -> Self {
        Self {
            pool,
            sessions,
            executor,
            supervisor: Mutex::new(supervisor),
        }
    }

    pub fn pool(&self) -> &Arc<ProcessPool> {
        &self.pool
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn executor(&self) -> &SessionExecutor {
        &self.executor
    }

    pub fn profile(&self) -> &ConsoleProfile {
        self.executor.profile()
    }

    /// Whether the background sweep is running.
    pub fn is_supervised(&self) -> bool {
        self.supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SupervisorHandle::is_running)
    }

    // Session lifecycle

    pub async fn create_session(&self, username: impl Into<String>) -> Result<Arc<Session>> {
        Ok(self.sessions.create_session(username).await?)
    }

    pub async fn create_session_with_id(
        &self,
        id: SessionId,
        username: impl Into<String>,
    ) -> Result<Arc<Session>> {
        Ok(self.sessions.create_session_with_id(id, username).await?)
    }

    /// End a session and terminate its process.
    pub async fn invalidate_session(&self, id: &SessionId) -> bool {
        self.sessions.invalidate_session(id).await
    }

    pub fn get_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get_session(id)
    }

    pub fn is_session_valid(&self, id: &SessionId) -> bool {
        self.sessions.is_session_valid(id)
    }

    // Execution

    /// Run an operation on the session's process.
    pub async fn execute<O: Operation>(&self, session: &SessionId, op: &O) -> Result<O::Output> {
        self.executor.execute(session, op).await
    }

    /// Log in on a fresh process for an existing session.
    pub async fn establish(&self, session: &SessionId, credentials: Credentials) -> Result<Verdict> {
        self.executor.establish(session, credentials).await
    }

    /// Run an operation on a throwaway process.
    pub async fn execute_once<O: Operation>(&self, op: &O) -> Result<O::Output> {
        self.executor.execute_once(op).await
    }

    // Convenience operations

    /// Register a new console user.
    pub async fn register(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Verdict> {
        self.execute_once(&Register::new(Credentials::new(username, password)))
            .await
    }

    /// Check credentials without keeping a process.
    pub async fn authenticate(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Verdict> {
        self.execute_once(&Authenticate::new(Credentials::new(username, password)))
            .await
    }

    /// Create a session and log it in.
    ///
    /// Returns `None` when the console rejects the credentials; the session
    /// is discarded in that case.
    pub async fn login(&self, credentials: Credentials) -> Result<Option<Arc<Session>>> {
        let session = self.create_session(credentials.username.as_str()).await?;
        let verdict = match self.establish(session.id(), credentials).await {
            Ok(verdict) => verdict,
            Err(e) => {
                self.invalidate_session(session.id()).await;
                return Err(e);
            }
        };

        if verdict.success {
            Ok(Some(session))
        } else {
            self.invalidate_session(session.id()).await;
            Ok(None)
        }
    }

    /// End a session. Same as [`invalidate_session`](Self::invalidate_session).
    pub async fn logout(&self, id: &SessionId) -> bool {
        self.invalidate_session(id).await
    }

    pub async fn deposit(&self, session: &SessionId, amount: f64) -> Result<Verdict> {
        self.execute(session, &Deposit::in_session(amount)).await
    }

    pub async fn withdraw(&self, session: &SessionId, amount: f64) -> Result<Verdict> {
        self.execute(session, &Withdraw::in_session(amount)).await
    }

    /// Current balance, or `None` when the console did not answer as expected.
    pub async fn balance(&self, session: &SessionId) -> Result<Option<f64>> {
        self.execute(session, &Balance::in_session()).await
    }

    pub async fn history(&self, session: &SessionId) -> Result<Option<Vec<Transaction>>> {
        self.execute(session, &History::in_session()).await
    }

    pub async fn deposit_once(&self, credentials: Credentials, amount: f64) -> Result<Verdict> {
        self.execute_once(&Deposit::credentialed(credentials, amount))
            .await
    }

    pub async fn withdraw_once(&self, credentials: Credentials, amount: f64) -> Result<Verdict> {
        self.execute_once(&Withdraw::credentialed(credentials, amount))
            .await
    }

    pub async fn balance_once(&self, credentials: Credentials) -> Result<Option<f64>> {
        self.execute_once(&Balance::credentialed(credentials)).await
    }

    pub async fn history_once(&self, credentials: Credentials) -> Result<Option<Vec<Transaction>>> {
        self.execute_once(&History::credentialed(credentials)).await
    }

    // Monitoring

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn handles(&self) -> Vec<HandleInfo> {
        self.pool.handles()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_sessions()
    }

    /// Stop the supervisor, close every session and terminate every process.
    ///
    /// Each stage is bounded by the pool's shutdown timeout.
    pub async fn shutdown(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let timeout = self.pool.config().shutdown_timeout;
        if let Some(supervisor) = supervisor {
            supervisor.stop(timeout).await;
        }
        self.sessions.shutdown();
        self.pool.shutdown().await;
        info!("service shut down");
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::transport::FixedPath;

    #[tokio::test]
    async fn test_session_lifecycle_without_processes() {
        let service = assert_ok!(ServiceBuilder::new("cat").supervisor(false).build().await);

        let session = assert_ok!(service.create_session("alice").await);
        assert!(service.is_session_valid(session.id()));
        assert_eq!(service.active_sessions(), 1);
        assert_eq!(service.pool_stats().total, 0);

        assert!(service.invalidate_session(session.id()).await);
        assert!(!service.is_session_valid(session.id()));
        assert!(service.get_session(session.id()).is_none());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_program_fails_creation() {
        let service = assert_ok!(
            ServiceBuilder::new("/nonexistent/bank")
                .locator(FixedPath::new("/nonexistent/bank"))
                .build()
                .await
        );

        let err = assert_err!(service.register("alice", "pw1").await);
        assert!(err.is_creation_failure());

        let login = service.login(Credentials::new("alice", "pw1")).await;
        assert!(assert_err!(login).is_creation_failure());
        assert_eq!(service.active_sessions(), 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_supervisor() {
        let service = assert_ok!(ServiceBuilder::new("cat").build().await);
        assert!(service.is_supervised());

        service.shutdown().await;
        assert!(!service.is_supervised());
    }
}
