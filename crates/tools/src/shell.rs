//! Shell runner: execute a command with a timeout and an output cap.
//!
//! Safety gating happens before a command reaches this runner.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::workspace::{CommandOutput, CommandRunner};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

const TOOL_NAME: &str = "shell";

/// Runs commands through the platform shell (`sh -c` / `cmd /C`).
pub struct ShellRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ShellRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    /// Build from the `[shell]` section of the config.
    pub fn from_config(config: &parley_config::ShellConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.max_output_bytes,
        )
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Read at most `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.take(limit).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn failed(reason: impl ToString) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, ToolError> {
        debug!(command = %command, "Executing shell command");

        let mut child = self.command(command).spawn().map_err(failed)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // One byte past the cap tells us the cap was exceeded.
        let limit = self.max_output_bytes as u64 + 1;

        let work = async {
            let (out, err) = tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit));
            let (out, err) = (out.map_err(failed)?, err.map_err(failed)?);

            if out.len() > self.max_output_bytes || err.len() > self.max_output_bytes {
                let _ = child.kill().await;
                return Err(ToolError::OutputLimit {
                    tool_name: TOOL_NAME.into(),
                    limit_bytes: self.max_output_bytes,
                });
            }

            let status = child.wait().await.map_err(failed)?;
            Ok(CommandOutput {
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            })
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(output)) => {
                if !output.success() {
                    warn!(command = %command, exit_code = ?output.exit_code, "Command failed");
                }
                Ok(output)
            }
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "Command aborted");
                Err(e)
            }
            Err(_) => {
                // The child is dropped with kill_on_drop set.
                warn!(command = %command, "Command timed out");
                Err(ToolError::Timeout {
                    tool_name: TOOL_NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
