//! Error types for consolepool.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for consolepool operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The console program could not be launched.
    #[error("Process creation failed: {0}")]
    Process(#[from] ProcessError),

    /// Channel I/O errors outside of a script run
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A script failed part-way through
    #[error("Process execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Session lookup or lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// True when the error means no process could be made available.
    pub fn is_creation_failure(&self) -> bool {
        matches!(self, Error::Process(_))
    }

    /// True when a script started but did not complete.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Error::Execution(_))
    }
}

/// Process creation errors (locating, validating and spawning the executable).
///
/// None of these are retried automatically.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The locator could not find the executable
    #[error("Executable not found: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The path exists but cannot be launched
    #[error("Executable is not launchable: {path}")]
    NotExecutable { path: PathBuf },

    /// The OS refused to spawn the process
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A standard stream was not piped
    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),

    /// The configured process cap has been reached
    #[error("Process pool exhausted ({limit} live processes)")]
    PoolExhausted { limit: usize },
}

/// Channel layer errors (writing to and reading from the console program).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// I/O error on stdin/stdout
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input side was already closed
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Script execution errors. The handle is not trusted after one of these.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A step of the named operation failed
    #[error("Operation '{operation}' failed for session {session}: {source}")]
    ScriptFailed {
        operation: &'static str,
        session: String,
        #[source]
        source: ChannelError,
    },

    /// The handle was terminated while the operation waited for it
    #[error("Process {handle} was terminated before the operation could run")]
    HandleTerminated { handle: String },
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session with this id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session exists but has been invalidated or expired
    #[error("Session is no longer active: {0}")]
    Inactive(String),

    /// The session's process has not been logged in (or was replaced
    /// since); establish the session again
    #[error("Session has no logged-in process: {0}")]
    NotLoggedIn(String),

    /// Maximum concurrent sessions reached
    #[error("Maximum concurrent sessions exceeded ({limit})")]
    LimitExceeded { limit: usize },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid JSON for the expected shape
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type alias using consolepool's Error.
pub type Result<T> = std::result::Result<T, Error>;
