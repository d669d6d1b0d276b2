//! Pool configuration.

use std::time::Duration;

/// Default time a handle may sit unused before eviction.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default supervisor sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default wait between the stop request and a force kill.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Default bound on waiting for all handles at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Process pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Handles unused for longer than this are evicted.
    pub idle_timeout: Duration,

    /// How often the supervisor sweeps the pool.
    pub sweep_interval: Duration,

    /// How long a stopping process gets before it is killed.
    pub termination_grace: Duration,

    /// Upper bound on shutdown.
    pub shutdown_timeout: Duration,

    /// Maximum number of pooled processes (unbounded when `None`).
    pub max_processes: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_processes: None,
        }
    }
}

impl PoolConfig {
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = Some(max);
        self
    }
}
