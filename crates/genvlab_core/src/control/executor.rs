//! Registry command executor.
//!
//! # Responsibility
//! - Spawn the `genv` program once per call with a namespaced argument vector.
//! - Capture stdout/stderr and map the exit status into `ControlError`.
//!
//! # Invariants
//! - Arguments are passed to the program directly; no shell is involved.
//! - The child is killed when the returned future is dropped, so a cancelled
//!   caller never leaves a running registry process behind.
//! - Returned stdout has trailing whitespace stripped.

use crate::config::GenvConfig;
use crate::control::{ControlError, ControlResult};
use log::{debug, warn};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

const MAX_STDERR_CHARS: usize = 512;

/// Executes one registry control command and returns its stdout.
///
/// `args` starts with the command namespace (`devices`, `envs`), followed by
/// the subcommand and its flags.
pub trait CommandRunner: Send + Sync {
    fn execute(&self, args: &[String]) -> impl Future<Output = ControlResult<String>> + Send;
}

impl<R: CommandRunner> CommandRunner for Arc<R> {
    fn execute(&self, args: &[String]) -> impl Future<Output = ControlResult<String>> + Send {
        self.as_ref().execute(args)
    }
}

/// Production runner backed by the `genv` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenvCommand {
    program: PathBuf,
}

impl GenvCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &GenvConfig) -> Self {
        Self::new(config.genv_bin.clone())
    }

    fn render(&self, args: &[String]) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }
}

impl CommandRunner for GenvCommand {
    async fn execute(&self, args: &[String]) -> ControlResult<String> {
        let command = self.render(args);
        debug!("event=control_exec module=control status=start command={command}");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                warn!(
                    "event=control_exec module=control status=error reason=spawn command={command} error={source}"
                );
                ControlError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = summarize_stderr(&output.stderr);
            warn!(
                "event=control_exec module=control status=error reason=exit_status command={command} code={:?}",
                output.status.code()
            );
            return Err(ControlError::ExitStatus {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| ControlError::InvalidUtf8 {
            command: command.clone(),
        })?;

        debug!(
            "event=control_exec module=control status=ok command={command} bytes={}",
            stdout.len()
        );
        Ok(stdout.trim_end().to_string())
    }
}

fn summarize_stderr(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    let mut summary = trimmed.chars().take(MAX_STDERR_CHARS).collect::<String>();
    if trimmed.chars().count() > MAX_STDERR_CHARS {
        summary.push_str("...");
    }
    summary
}
