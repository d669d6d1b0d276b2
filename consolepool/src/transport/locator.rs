//! Executable resolution, consulted before every spawn.

use std::path::{Path, PathBuf};

use crate::error::ProcessError;

/// Resolves and validates the path of the program to launch.
pub trait ExecutableLocator: Send + Sync {
    /// Return a launchable path or a creation error.
    fn locate(&self) -> Result<PathBuf, ProcessError>;
}

/// A fixed path that must exist and be executable.
#[derive(Debug, Clone)]
pub struct FixedPath {
    path: PathBuf,
}

impl FixedPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExecutableLocator for FixedPath {
    fn locate(&self) -> Result<PathBuf, ProcessError> {
        validate(&self.path)?;
        Ok(self.path.clone())
    }
}

/// Look a bare program name up in `PATH`. Names containing a path
/// separator are validated as-is.
#[derive(Debug, Clone)]
pub struct SearchPath {
    name: PathBuf,
}

impl SearchPath {
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self { name: name.into() }
    }
}

impl ExecutableLocator for SearchPath {
    fn locate(&self) -> Result<PathBuf, ProcessError> {
        if self.name.components().count() > 1 || self.name.is_absolute() {
            validate(&self.name)?;
            return Ok(self.name.clone());
        }

        let paths = std::env::var_os("PATH").unwrap_or_default();
        std::env::split_paths(&paths)
            .map(|dir| dir.join(&self.name))
            .find(|candidate| validate(candidate).is_ok())
            .ok_or_else(|| ProcessError::ExecutableNotFound {
                path: self.name.clone(),
            })
    }
}

fn validate(path: &Path) -> Result<(), ProcessError> {
    let metadata = std::fs::metadata(path).map_err(|_| ProcessError::ExecutableNotFound {
        path: path.to_path_buf(),
    })?;

    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(ProcessError::NotExecutable {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_path_missing() {
        let locator = FixedPath::new("/definitely/not/here/bank");
        assert!(matches!(
            locator.locate(),
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_fixed_path_not_executable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let locator = FixedPath::new(file.path());
        assert!(matches!(
            locator.locate(),
            Err(ProcessError::NotExecutable { .. })
        ));
    }

    #[test]
    fn test_directory_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = FixedPath::new(dir.path());
        assert!(matches!(
            locator.locate(),
            Err(ProcessError::NotExecutable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_finds_sh() {
        let path = SearchPath::new("sh").locate().unwrap();
        assert!(path.ends_with("sh"));
    }

    #[test]
    fn test_search_path_unknown() {
        let locator = SearchPath::new("no-such-console-program-xyz");
        assert!(locator.locate().is_err());
    }
}
