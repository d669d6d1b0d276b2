//! Sessions and the executor that runs scripts for them.
//!
//! A session owns at most one pooled process. Invalidating a session,
//! explicitly or by idle expiry, terminates that process.

mod executor;
mod id;
mod manager;
mod record;

pub use executor::SessionExecutor;
pub use id::SessionId;
pub use manager::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TIMEOUT, SessionConfig, SessionManager};
pub use record::Session;
