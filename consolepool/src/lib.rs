//! # consolepool
//!
//! Async session-pooled orchestration of an interactive, line-oriented
//! console program.
//!
//! consolepool exposes a menu-driven console program as callable operations
//! for many concurrent callers. Each session gets its own OS process, which
//! is reused across calls, scripted over stdin/stdout, and terminated when
//! the session ends or goes idle.
//!
//! ## Features
//!
//! - One pooled process per session, with idle eviction and health sweeps
//! - Deadline-bounded reads ended early by prompt patterns or a quiet period
//! - ANSI/control sequence stripping before any matching
//! - Operations as data: tagged steps interpreted by one generic runner
//! - Phrase sets, prompts and menu numbers as configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consolepool::{Credentials, ServiceBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), consolepool::Error> {
//!     let service = ServiceBuilder::new("/opt/bank/run").build().await?;
//!
//!     service.register("alice", "pw1").await?;
//!     if let Some(session) = service.login(Credentials::new("alice", "pw1")).await? {
//!         service.deposit(session.id(), 50.0).await?;
//!         println!("balance: {:?}", service.balance(session.id()).await?);
//!         service.logout(session.id()).await;
//!     }
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod pool;
pub mod profile;
pub mod script;
pub mod service;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Transaction, TransactionKind};
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use pool::{PoolConfig, PoolStats, ProcessPool};
pub use profile::{ConsoleProfile, ProfileOverrides, Verdict};
pub use script::{Credentials, Operation, ScriptBuilder, Step};
pub use service::{Service, ServiceBuilder};
pub use session::{Session, SessionId};
pub use transport::{ExecutableLocator, FixedPath, LaunchConfig, SearchPath};
