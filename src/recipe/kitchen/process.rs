// src/recipe/kitchen/process.rs

//! Shell command execution with combined output capture and a wall-clock timeout

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;
use wait_timeout::ChildExt;

/// Lines of output kept for error reports
const OUTPUT_TAIL_LINES: usize = 40;

/// Outcome of a finished or timed-out command
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status, `None` when the command was killed on timeout
    pub status: Option<ExitStatus>,
    /// Interleaved stdout and stderr
    pub output: String,
}

impl CommandOutput {
    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Run `sh -c <command>` in `workdir`
///
/// stdin is closed, stdout and stderr go to one temp file so the output is
/// interleaved the way a terminal would show it and a chatty build cannot
/// fill a pipe and stall. The shell leads its own process group; on timeout
/// the whole group is killed, including compilers and subshells it started.
pub fn run_shell(
    command: &str,
    workdir: &Path,
    env: &[(String, String)],
    timeout: Duration,
) -> Result<CommandOutput> {
    debug!("Running `{}` in {}", command, workdir.display());

    let log = NamedTempFile::new()
        .map_err(|e| Error::IoError(format!("Failed to create output capture: {}", e)))?;
    // Duplicated handles share one file offset, so writes interleave
    let stdout: File = log.as_file().try_clone()?;
    let stderr: File = log.as_file().try_clone()?;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workdir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::IoError(format!("Failed to spawn `{}`: {}", command, e)))?;

    let status = match child.wait_timeout(timeout)? {
        Some(status) => Some(status),
        None => {
            debug!("`{}` timed out after {:?}, killing", command, timeout);
            kill_process_group(&mut child);
            let _ = child.wait();
            None
        }
    };

    let output = fs::read(log.path())?;
    Ok(CommandOutput {
        status,
        output: String::from_utf8_lossy(&output).into_owned(),
    })
}

/// Kill a child spawned as a process group leader, and everything in its group
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL).is_err() {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

/// Last lines of a command's output
pub fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join("\n")
}
