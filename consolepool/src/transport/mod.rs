//! Process transport: how console program instances are located and launched.
//!
//! This module provides the low-level process management, handling
//! executable resolution, environment overrides and stdio wiring.

pub mod config;
mod locator;
mod process;

pub use config::{LaunchConfig, PLAIN_TERMINAL_ENV};
pub use locator::{ExecutableLocator, FixedPath, SearchPath};
pub use process::{SpawnedProcess, spawn};

pub(crate) use process::request_stop;
