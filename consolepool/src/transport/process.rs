//! OS process spawning for console program instances.

use std::path::PathBuf;
use std::process::Stdio;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::config::LaunchConfig;
use super::locator::ExecutableLocator;
use crate::error::ProcessError;

/// A freshly spawned console program with its pipes split out.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The child process (killed on drop).
    pub child: Child,

    /// Write end of the program's standard input.
    pub stdin: ChildStdin,

    /// Read end of the program's standard output.
    pub stdout: ChildStdout,

    /// OS process id, if the process had not already exited.
    pub pid: Option<u32>,

    /// The resolved executable path.
    pub program: PathBuf,
}

/// Resolve the executable and launch it with piped stdio.
///
/// `tag` identifies the instance in forwarded stderr logs. Must be called
/// from within a tokio runtime.
pub fn spawn(
    config: &LaunchConfig,
    locator: &dyn ExecutableLocator,
    tag: &str,
) -> Result<SpawnedProcess, ProcessError> {
    let program = locator.locate()?;

    let mut command = Command::new(&program);
    command
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.display().to_string(),
        source,
    })?;

    let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(ProcessError::MissingPipe("stdout"))?;

    if let Some(stderr) = child.stderr.take() {
        forward_stderr(stderr, tag.to_string());
    }

    let pid = child.id();
    info!(
        "spawned {} (pid {:?}) for {}",
        program.display(),
        pid,
        tag
    );

    Ok(SpawnedProcess {
        child,
        stdin,
        stdout,
        pid,
        program,
    })
}

/// Ask the process to stop (SIGTERM). Returns false when no signal could be sent.
#[cfg(unix)]
pub(crate) fn request_stop(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub(crate) fn request_stop(_pid: u32) -> bool {
    false
}

fn forward_stderr(stderr: ChildStderr, tag: String) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{}] stderr: {}", tag, line);
        }
    });
}
