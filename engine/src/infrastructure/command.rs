//! Bounded execution of platform service-manager commands

use crate::constants::controller::COMMAND_TIMEOUT_SECS;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Captured result of one command run
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best human-readable reason for a failure
    pub fn reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `program` with `args`, killing it if it outlives the command timeout
pub async fn run(program: &str, args: &[&str]) -> Result<CommandOutput, String> {
    run_with_timeout(program, args, Duration::from_secs(COMMAND_TIMEOUT_SECS)).await
}

pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    limit: Duration,
) -> Result<CommandOutput, String> {
    debug!(program = program, args = ?args, "Running service manager command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to run {program}: {e}"))?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| format!("{program} timed out after {}s", limit.as_secs()))?
        .map_err(|e| format!("failed to wait for {program}: {e}"))?;

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_status() {
        let out = run("/bin/sh", &["-c", "echo hello; echo oops >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.reason(), "oops");
    }

    #[tokio::test]
    async fn test_missing_program() {
        assert!(run("/nonexistent/binary", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let err = run_with_timeout("/bin/sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.contains("timed out"));
    }
}
