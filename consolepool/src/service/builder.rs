//! Builder for creating a service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::Service;
use crate::config::ServiceConfig;
use crate::error::{ConfigError, Result};
use crate::pool::{PoolConfig, ProcessPool, Supervisor};
use crate::profile::{ConsoleProfile, ProfileOverrides};
use crate::session::{SessionConfig, SessionExecutor, SessionManager};
use crate::transport::{ExecutableLocator, LaunchConfig, SearchPath};

/// Builder for constructing a [`Service`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use consolepool::ServiceBuilder;
///
/// # async fn example() -> Result<(), consolepool::Error> {
/// let service = ServiceBuilder::new("/opt/bank/run")
///     .args(["--store", "users.json"])
///     .idle_timeout(Duration::from_secs(120))
///     .max_sessions(50)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ServiceBuilder {
    launch: LaunchConfig,
    locator: Option<Arc<dyn ExecutableLocator>>,
    pool: PoolConfig,
    session: SessionConfig,
    profile: ConsoleProfile,
    overrides: Option<ProfileOverrides>,
    supervisor: bool,
}

impl ServiceBuilder {
    /// Create a builder for the given console program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_launch(LaunchConfig::new(program))
    }

    /// Create a builder from a complete launch configuration.
    pub fn with_launch(launch: LaunchConfig) -> Self {
        Self {
            launch,
            locator: None,
            pool: PoolConfig::default(),
            session: SessionConfig::default(),
            profile: ConsoleProfile::banking(),
            overrides: None,
            supervisor: true,
        }
    }

    /// Create a builder from loaded configuration.
    pub fn from_config(config: ServiceConfig) -> Self {
        let mut builder = Self::with_launch(config.launch);
        builder.pool = config.pool.to_pool_config();
        builder.session = config.session.to_session_config();
        builder.overrides = config.profile;
        builder.supervisor = config.supervisor.enabled;
        builder
    }

    /// Append a program argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.launch = self.launch.with_arg(arg);
        self
    }

    /// Append program arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch = self.launch.with_args(args);
        self
    }

    /// Set the program's working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.launch = self.launch.with_working_dir(dir);
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.launch = self.launch.with_env(key, value);
        self
    }

    /// Set the executable locator (default: `PATH` lookup of the program).
    pub fn locator(mut self, locator: impl ExecutableLocator + 'static) -> Self {
        self.locator = Some(Arc::new(locator));
        self
    }

    /// Evict processes unused for this long (default: 5 minutes).
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool.idle_timeout = timeout;
        self
    }

    /// Set the supervisor sweep interval (default: 1 minute).
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.pool.sweep_interval = interval;
        self
    }

    /// Set the grace period before a stopping process is killed.
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.pool.termination_grace = grace;
        self
    }

    /// Bound the time shutdown waits for processes.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.pool.shutdown_timeout = timeout;
        self
    }

    /// Cap the number of pooled processes.
    pub fn max_processes(mut self, max: usize) -> Self {
        self.pool.max_processes = Some(max);
        self
    }

    /// Expire sessions unused for this long (default: 5 minutes).
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session.idle_timeout = timeout;
        self
    }

    /// Cap the number of concurrent sessions (default: 100).
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.session.max_sessions = max;
        self
    }

    /// Set a custom console profile.
    pub fn profile(mut self, profile: ConsoleProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Apply overrides on top of the profile at build time.
    pub fn profile_overrides(mut self, overrides: ProfileOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Enable or disable the background sweep (default: enabled).
    pub fn supervisor(mut self, enabled: bool) -> Self {
        self.supervisor = enabled;
        self
    }

    /// Build the service.
    ///
    /// No process is spawned here; processes start on first use. The
    /// supervisor, when enabled, starts sweeping immediately.
    pub async fn build(self) -> Result<Service> {
        if self.launch.program.as_os_str().is_empty() {
            return Err(invalid("program must be set"));
        }
        if self.pool.sweep_interval.is_zero() {
            return Err(invalid("sweep interval must be greater than zero"));
        }
        if self.pool.max_processes == Some(0) || self.session.max_sessions == 0 {
            return Err(invalid("process and session limits must be greater than zero"));
        }

        let profile = match self.overrides {
            Some(overrides) => self.profile.with_overrides(overrides)?,
            None => self.profile,
        };

        let locator = self
            .locator
            .unwrap_or_else(|| Arc::new(SearchPath::new(self.launch.program.clone())));

        let sweep_interval = self.pool.sweep_interval;
        let pool = Arc::new(
            ProcessPool::new(self.launch, locator, self.pool)
                .with_search_depth(profile.search_depth),
        );
        let sessions = Arc::new(SessionManager::new(pool.clone(), self.session));
        let executor = SessionExecutor::new(pool.clone(), sessions.clone(), Arc::new(profile));

        let supervisor = self
            .supervisor
            .then(|| Supervisor::spawn(pool.clone(), Some(sessions.clone()), sweep_interval));

        Ok(Service::new(pool, sessions, executor, supervisor))
    }
}

fn invalid(message: &str) -> crate::Error {
    ConfigError::Invalid {
        message: message.to_string(),
    }
    .into()
}
