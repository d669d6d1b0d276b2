//! Session registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};

use super::id::SessionId;
use super::record::Session;
use crate::error::SessionError;
use crate::pool::ProcessPool;

/// Default time a session may go unused before it expires.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default cap on concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Session limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sessions unused for longer than this expire.
    pub idle_timeout: Duration,

    /// Maximum number of active sessions.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_SESSION_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Tracks sessions and ends their processes when they end.
#[derive(Debug)]
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    pool: Arc<ProcessPool>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(pool: Arc<ProcessPool>, config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            pool,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session with a fresh id.
    pub async fn create_session(
        &self,
        username: impl Into<String>,
    ) -> Result<Arc<Session>, SessionError> {
        self.create_session_with_id(SessionId::generate(), username)
            .await
    }

    /// Create a session under a caller-chosen id. An existing session with
    /// the same id is invalidated first.
    pub async fn create_session_with_id(
        &self,
        id: SessionId,
        username: impl Into<String>,
    ) -> Result<Arc<Session>, SessionError> {
        let username = username.into();
        let (session, replaced) = {
            let mut sessions = self.registry();
            let replaced = sessions.remove(&id);
            let active = sessions.values().filter(|s| s.is_active()).count();
            if active >= self.config.max_sessions {
                if let Some(previous) = replaced {
                    sessions.insert(id, previous);
                }
                return Err(SessionError::LimitExceeded {
                    limit: self.config.max_sessions,
                });
            }
            let session = Arc::new(Session::new(id.clone(), username.clone()));
            sessions.insert(id.clone(), session.clone());
            (session, replaced)
        };

        if let Some(previous) = replaced {
            info!("session {} replaced", previous.id());
            previous.deactivate();
            self.pool.terminate(&id).await;
        }
        info!("session {} created for {}", id, username);
        Ok(session)
    }

    /// Look up an active session and record the access.
    pub fn get_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.registry().get(id).cloned()?;
        if !session.is_active() {
            return None;
        }
        session.touch();
        Some(session)
    }

    /// Like [`get_session`](Self::get_session), with the reason on failure.
    pub fn require_session(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        let session = self
            .registry()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if !session.is_active() {
            return Err(SessionError::Inactive(id.to_string()));
        }
        session.touch();
        Ok(session)
    }

    /// Active and not idle past the timeout. Does not count as a use.
    pub fn is_session_valid(&self, id: &SessionId) -> bool {
        self.registry()
            .get(id)
            .is_some_and(|s| s.is_active() && s.idle_for() <= self.config.idle_timeout)
    }

    /// End a session and its process. Idempotent; returns whether a
    /// session was removed.
    pub async fn invalidate_session(&self, id: &SessionId) -> bool {
        let removed = self.registry().remove(id);
        let Some(session) = removed else {
            return false;
        };
        session.deactivate();
        session.set_handle_id(None);
        self.pool.terminate(id).await;
        info!("session {} invalidated", id);
        true
    }

    /// Invalidate sessions idle past the timeout whose process is not in
    /// the middle of a script. Returns how many expired.
    pub async fn expire_idle(&self) -> usize {
        let timeout = self.config.idle_timeout;
        let expired: Vec<SessionId> = self
            .registry()
            .values()
            .filter(|s| s.idle_for() > timeout)
            .filter(|s| !self.pool.get(s.id()).is_some_and(|h| h.is_busy()))
            .map(|s| s.id().clone())
            .collect();

        let mut count = 0;
        for id in expired {
            debug!("session {} idle past {:?}", id, timeout);
            if self.invalidate_session(&id).await {
                count += 1;
            }
        }
        count
    }

    pub fn active_sessions(&self) -> usize {
        self.registry().values().filter(|s| s.is_active()).count()
    }

    /// Deactivate and forget every session. Processes are left to the pool's
    /// own shutdown.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.registry().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.deactivate();
        }
        if !drained.is_empty() {
            info!("{} sessions closed", drained.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::transport::{LaunchConfig, SearchPath};

    fn manager(config: SessionConfig) -> (Arc<ProcessPool>, SessionManager) {
        let pool = Arc::new(ProcessPool::new(
            LaunchConfig::new("cat"),
            Arc::new(SearchPath::new("cat")),
            PoolConfig::default().with_termination_grace(Duration::from_secs(1)),
        ));
        let manager = SessionManager::new(pool.clone(), config);
        (pool, manager)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, sessions) = manager(SessionConfig::default());
        let session = sessions.create_session("alice").await.unwrap();

        let found = sessions.get_session(session.id()).unwrap();
        assert_eq!(found.username(), "alice");
        assert!(sessions.is_session_valid(session.id()));
        assert_eq!(sessions.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_session_limit() {
        let (_pool, sessions) = manager(SessionConfig {
            max_sessions: 2,
            ..Default::default()
        });
        sessions.create_session("a").await.unwrap();
        sessions.create_session("b").await.unwrap();

        let err = sessions.create_session("c").await.unwrap_err();
        assert!(matches!(err, SessionError::LimitExceeded { limit: 2 }));
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (_pool, sessions) = manager(SessionConfig::default());
        let session = sessions.create_session("alice").await.unwrap();
        let id = session.id().clone();

        assert!(sessions.invalidate_session(&id).await);
        assert!(!sessions.invalidate_session(&id).await);
        assert!(!session.is_active());
        assert!(sessions.get_session(&id).is_none());
        assert!(matches!(
            sessions.require_session(&id),
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_session_is_invalid() {
        let (_pool, sessions) = manager(SessionConfig {
            idle_timeout: Duration::from_millis(30),
            ..Default::default()
        });
        let session = sessions.create_session("alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!sessions.is_session_valid(session.id()));
        assert_eq!(sessions.expire_idle().await, 1);
        assert_eq!(sessions.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_replacing_session_id() {
        let (_pool, sessions) = manager(SessionConfig::default());
        let first = sessions
            .create_session_with_id(SessionId::new("fixed"), "alice")
            .await
            .unwrap();
        let second = sessions
            .create_session_with_id(SessionId::new("fixed"), "bob")
            .await
            .unwrap();

        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(sessions.active_sessions(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalidate_cascades_to_process() {
        let (pool, sessions) = manager(SessionConfig::default());
        let session = sessions.create_session("alice").await.unwrap();
        let handle = pool.get_or_create(session.id()).await.unwrap();

        sessions.invalidate_session(session.id()).await;
        assert!(handle.is_terminated());
        assert!(!pool.contains(session.id()));
    }
}
