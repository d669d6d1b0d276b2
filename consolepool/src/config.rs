//! Service configuration loaded from JSON.
//!
//! Every section is optional; missing values take the library defaults.
//!
//! ```json
//! {
//!   "launch": { "program": "/opt/bank/run", "args": ["--store", "users.json"] },
//!   "pool": { "idle_timeout_ms": 120000, "max_processes": 16 },
//!   "session": { "max_sessions": 50 },
//!   "profile": { "phrases": { "withdraw_veto": ["insufficient", "overdrawn"] } }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pool::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_TERMINATION_GRACE, PoolConfig,
};
use crate::profile::ProfileOverrides;
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TIMEOUT, SessionConfig};
use crate::transport::LaunchConfig;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub launch: LaunchConfig,
    pub pool: PoolSection,
    pub session: SessionSection,

    /// Changes to the built-in banking profile.
    pub profile: Option<ProfileOverrides>,

    /// Run the background sweep (default: true).
    pub supervisor: SupervisorSection,
}

/// Pool settings, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub idle_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub termination_grace_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub max_processes: Option<usize>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            idle_timeout_ms: millis(DEFAULT_IDLE_TIMEOUT),
            sweep_interval_ms: millis(DEFAULT_SWEEP_INTERVAL),
            termination_grace_ms: millis(DEFAULT_TERMINATION_GRACE),
            shutdown_timeout_ms: millis(DEFAULT_SHUTDOWN_TIMEOUT),
            max_processes: None,
        }
    }
}

impl PoolSection {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            termination_grace: Duration::from_millis(self.termination_grace_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            max_processes: self.max_processes,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub session_timeout_ms: u64,
    pub max_sessions: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            session_timeout_ms: millis(DEFAULT_SESSION_TIMEOUT),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout: Duration::from_millis(self.session_timeout_ms),
            max_sessions: self.max_sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub enabled: bool,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ServiceConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launch.program.as_os_str().is_empty() {
            return Err(invalid("launch.program must be set"));
        }
        if self.pool.sweep_interval_ms == 0 {
            return Err(invalid("pool.sweep_interval_ms must be greater than zero"));
        }
        if self.pool.idle_timeout_ms == 0 {
            return Err(invalid("pool.idle_timeout_ms must be greater than zero"));
        }
        if self.pool.max_processes == Some(0) {
            return Err(invalid("pool.max_processes must be greater than zero"));
        }
        if self.session.session_timeout_ms == 0 {
            return Err(invalid("session.session_timeout_ms must be greater than zero"));
        }
        if self.session.max_sessions == 0 {
            return Err(invalid("session.max_sessions must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ServiceConfig::from_json_str(r#"{"launch": {"program": "bank"}}"#).unwrap();

        assert_eq!(config.launch.program, PathBuf::from("bank"));
        assert_eq!(config.pool.to_pool_config(), PoolConfig::default());
        assert_eq!(config.session.to_session_config(), SessionConfig::default());
        assert!(config.supervisor.enabled);
        assert!(config.profile.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = ServiceConfig::from_json_str(
            r#"{
                "launch": {"program": "bank", "args": ["--store", "users.json"]},
                "pool": {"idle_timeout_ms": 1500, "max_processes": 4},
                "session": {"max_sessions": 7},
                "supervisor": {"enabled": false},
                "profile": {"phrases": {"withdraw_veto": ["overdrawn"]}}
            }"#,
        )
        .unwrap();

        let pool = config.pool.to_pool_config();
        assert_eq!(pool.idle_timeout, Duration::from_millis(1500));
        assert_eq!(pool.max_processes, Some(4));
        assert_eq!(pool.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.session.max_sessions, 7);
        assert!(!config.supervisor.enabled);

        let phrases = config.profile.unwrap().phrases.unwrap();
        assert_eq!(phrases.withdraw_veto, vec!["overdrawn"]);
    }

    #[test]
    fn test_missing_program_is_invalid() {
        let err = ServiceConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_zero_limits_are_invalid() {
        let err = ServiceConfig::from_json_str(
            r#"{"launch": {"program": "bank"}, "session": {"max_sessions": 0}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_sessions"));
    }

    #[test]
    fn test_malformed_json() {
        let err = ServiceConfig::from_json_str(r#"{"launch": "#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"launch": {{"program": "/opt/bank/run"}}}}"#).unwrap();

        let config = ServiceConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.launch.program, PathBuf::from("/opt/bank/run"));
    }

    #[test]
    fn test_unreadable_file() {
        let err = ServiceConfig::from_json_file("/no/such/consolepool.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
