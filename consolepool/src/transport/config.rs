//! Launch configuration for the console program.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;

/// Environment overrides that switch off colour and interactive terminal
/// formatting in the wrapped program.
pub const PLAIN_TERMINAL_ENV: [(&str, &str); 3] = [
    ("TERM", "dumb"),
    ("NO_COLOR", "1"),
    ("ANSI_COLORS_DISABLED", "1"),
];

/// How to launch one console program instance.
///
/// `program` is what the [`ExecutableLocator`](super::ExecutableLocator)
/// resolves; the resolved path is what actually gets spawned.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Program name or path.
    pub program: PathBuf,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Working directory (inherits the caller's when `None`).
    pub working_dir: Option<PathBuf>,

    /// Environment overrides applied on top of the inherited environment.
    pub env: IndexMap<String, String>,
}

impl LaunchConfig {
    /// Create a launch configuration with the plain-terminal environment overrides.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let env = PLAIN_TERMINAL_ENV
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env,
        }
    }

    /// Append an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add or replace an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program name for log and error messages.
    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_terminal_defaults() {
        let config = LaunchConfig::new("bank");
        assert_eq!(config.env.get("TERM").map(String::as_str), Some("dumb"));
        assert_eq!(config.env.get("NO_COLOR").map(String::as_str), Some("1"));
        assert!(config.args.is_empty());
    }

    #[test]
    fn test_builder_overrides_env() {
        let config = LaunchConfig::new("bank")
            .with_args(["--store", "users.json"])
            .with_env("TERM", "xterm")
            .with_working_dir("/tmp");

        assert_eq!(config.args, vec!["--store", "users.json"]);
        assert_eq!(config.env.get("TERM").map(String::as_str), Some("xterm"));
        assert_eq!(config.env.len(), 3);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LaunchConfig =
            serde_json::from_str(r#"{"program": "/opt/bank/run", "args": ["--quiet"]}"#).unwrap();
        assert_eq!(config.program, PathBuf::from("/opt/bank/run"));
        assert_eq!(config.args, vec!["--quiet"]);
        // Missing env falls back to the plain-terminal defaults
        assert_eq!(config.env.get("NO_COLOR").map(String::as_str), Some("1"));
    }
}
