//! Control-protocol plumbing for the external `genv` registry.
//!
//! # Responsibility
//! - Run one registry command per call and capture its output.
//! - Turn comma-delimited, header-less output into typed fields.
//!
//! # Invariants
//! - Exit status `0` is the only success signal.
//! - Malformed rows fail the whole read; they are never skipped.

pub mod executor;
pub mod table;

pub use executor::{CommandRunner, GenvCommand};

use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

/// Failure while talking to the registry tool or reading its output.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The registry program could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The registry program ran but did not report success.
    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Stdout was not valid UTF-8.
    #[error("`{command}` produced non UTF-8 output")]
    InvalidUtf8 { command: String },
    /// Row arity or field shape did not match the expected record.
    #[error("malformed registry output for {context}: {detail}")]
    MalformedOutput {
        context: &'static str,
        detail: String,
    },
}

impl ControlError {
    pub(crate) fn malformed(context: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedOutput {
            context,
            detail: detail.into(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
