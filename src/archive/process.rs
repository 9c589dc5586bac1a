//! Child-process runner for the external archiver and extractor
//!
//! Arguments are passed as a proper argument vector, so input names with spaces
//! or shell metacharacters reach the archiver intact.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Flag that precedes the password argument for both `zip` and `unzip`
pub const PASSWORD_FLAG: &str = "-P";

/// How a finished child process ended
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code; -1 when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Why a child process produced no outcome
#[derive(Debug)]
pub enum ProcessFailure {
    /// Spawning or waiting on the process failed
    Spawn(io::Error),
    /// The deadline passed; the process was killed
    TimedOut(Duration),
}

/// Prepend `-P <password>` when a non-empty password is given
pub fn password_args(password: Option<&str>) -> Vec<OsString> {
    match password {
        Some(p) if !p.is_empty() => vec![PASSWORD_FLAG.into(), p.into()],
        _ => Vec::new(),
    }
}

/// Render arguments for logs with the password masked
pub fn redacted(args: &[OsString]) -> String {
    let mut rendered = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            rendered.push("***".to_string());
            mask_next = false;
            continue;
        }
        mask_next = arg == OsStr::new(PASSWORD_FLAG);
        rendered.push(arg.to_string_lossy().to_string());
    }
    rendered.join(" ")
}

/// Run `program` with `args`, optionally inside `cwd`, waiting at most `timeout`.
pub async fn run(
    program: &str,
    args: &[OsString],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<ProcessOutcome, ProcessFailure> {
    let start = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(
        program,
        args = %redacted(args),
        cwd = ?cwd,
        "Spawning child process"
    );

    let mut child = command.spawn().map_err(ProcessFailure::Spawn)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_handle = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stdout) = stdout {
            let _ = stdout.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_handle = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => waited.map_err(ProcessFailure::Spawn)?,
            Err(_) => {
                warn!(program, ?limit, "Child process timed out, killing it");
                let _ = child.kill().await;
                return Err(ProcessFailure::TimedOut(limit));
            }
        },
        None => child.wait().await.map_err(ProcessFailure::Spawn)?,
    };

    let stdout_data = stdout_handle.await.unwrap_or_default();
    let stderr_data = stderr_handle.await.unwrap_or_default();

    let outcome = ProcessOutcome {
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout_data).to_string(),
        stderr: String::from_utf8_lossy(&stderr_data).to_string(),
        duration: start.elapsed(),
    };

    debug!(
        program,
        exit_code = outcome.exit_code,
        duration_ms = outcome.duration.as_millis() as u64,
        stderr = %outcome.stderr.trim(),
        "Child process exited"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_args() {
        assert!(password_args(None).is_empty());
        assert!(password_args(Some("")).is_empty());
        assert_eq!(
            password_args(Some("s3cret")),
            vec![OsString::from("-P"), OsString::from("s3cret")]
        );
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut args = password_args(Some("s3cret"));
        args.push("-r".into());
        args.push("out.zip".into());
        assert_eq!(redacted(&args), "-P *** -r out.zip");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let result = run("zip-relay-no-such-binary", &[], None, None).await;
        assert!(matches!(result, Err(ProcessFailure::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_preserved() {
        let args: Vec<OsString> = vec!["-c".into(), "echo oops >&2; exit 7".into()];
        let outcome = run("sh", &args, None, None).await.unwrap();
        assert_eq!(outcome.exit_code, 7);
        assert!(!outcome.success());
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_kills_process() {
        let args: Vec<OsString> = vec!["-c".into(), "sleep 30".into()];
        let result = run("sh", &args, None, Some(Duration::from_millis(200))).await;
        assert!(matches!(result, Err(ProcessFailure::TimedOut(_))));
    }
}
