//! Process pool: one console program per session.
//!
//! The pool spawns, reuses and replaces [`ProcessHandle`]s; it never
//! repairs one in place. A [`Supervisor`] sweeps it periodically for dead
//! and idle processes.

mod clock;
mod config;
mod handle;
mod registry;
mod supervisor;

pub(crate) use clock::AccessClock;
pub use config::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_TERMINATION_GRACE, PoolConfig,
};
pub use handle::{HandleInfo, ProcessHandle};
pub use registry::{PoolStats, ProcessPool, SweepReport};
pub use supervisor::{Supervisor, SupervisorHandle};
