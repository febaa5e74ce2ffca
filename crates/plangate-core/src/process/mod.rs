//! Supervised external-process execution with combined output capture.
//!
//! The runner spawns a child with no input stream, captures stdout and
//! stderr into one text, and blocks the calling task until the child exits
//! or the wall-clock limit expires. Exit codes are returned uninterpreted:
//! a planner reports "no plan found" through a nonzero exit, so only the
//! calling stage can decide what an exit status means.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Captured output and exit status of one finished child process.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Combined stdout and stderr text (stdout first).
    pub output: String,
    /// Exit code, or `None` if the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Infrastructure failures of the runner itself. A child exiting nonzero is
/// not an error here.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exceeded the {limit_secs}s time limit")]
    Timeout { program: String, limit_secs: u64 },
}

/// Run an executable to completion and capture its combined output.
///
/// The child gets a null stdin and piped stdout/stderr. Both pipes are read
/// concurrently with waiting for the exit, so a chatty child cannot
/// deadlock on a full pipe buffer. On timeout the child is killed and
/// [`ProcessError::Timeout`] is returned; `kill_on_drop` also reaps the
/// child if the calling task is cancelled mid-run.
pub async fn run_process(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<ProcessResult, ProcessError> {
    let program_name = program.display().to_string();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let read_stdout = async {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            pipe.read_to_end(&mut buf).await.ok();
        }
        buf
    };

    let read_stderr = async {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            pipe.read_to_end(&mut buf).await.ok();
        }
        buf
    };

    match tokio::time::timeout(timeout, async {
        let (wait_result, stdout, stderr) = tokio::join!(child.wait(), read_stdout, read_stderr);
        (wait_result, stdout, stderr)
    })
    .await
    {
        Ok((Ok(status), stdout, stderr)) => {
            let mut combined = stdout;
            combined.extend_from_slice(&stderr);
            Ok(ProcessResult {
                output: String::from_utf8_lossy(&combined).into_owned(),
                exit_code: status.code(),
            })
        }
        Ok((Err(source), _, _)) => Err(ProcessError::Wait {
            program: program_name,
            source,
        }),
        Err(_) => {
            let _ = child.kill().await;
            Err(ProcessError::Timeout {
                program: program_name,
                limit_secs: timeout.as_secs(),
            })
        }
    }
}
