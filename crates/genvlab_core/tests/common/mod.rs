#![allow(dead_code)]

use genvlab_core::{CommandRunner, ControlError, ControlResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const DEVICES_PS: &str = "devices ps --format csv --no-header --timestamp";
pub const ENVS_PS: &str = "envs ps --format csv --no-header --timestamp";

#[derive(Debug, Clone)]
enum Reply {
    Stdout(String),
    Exit { code: i32, stderr: String },
}

/// Runner answering canned output per rendered command line.
///
/// Unknown commands fail like a registry that does not know the subcommand.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, command: &str, stdout: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), Reply::Stdout(stdout.to_string()));
        self
    }

    pub fn fail(self, command: &str, code: i32, stderr: &str) -> Self {
        self.replies.lock().unwrap().insert(
            command.to_string(),
            Reply::Exit {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn execute(&self, args: &[String]) -> ControlResult<String> {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(command.clone());
        let reply = self.replies.lock().unwrap().get(&command).cloned();
        match reply {
            Some(Reply::Stdout(stdout)) => Ok(stdout.trim_end().to_string()),
            Some(Reply::Exit { code, stderr }) => Err(ControlError::ExitStatus {
                command,
                code: Some(code),
                stderr,
            }),
            None => Err(ControlError::ExitStatus {
                command,
                code: Some(2),
                stderr: "unknown command".to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct GenvState {
    /// kernel id -> eid
    kernels: HashMap<String, String>,
    /// (index, eid)
    devices: Vec<(u32, Option<String>)>,
}

/// Minimal in-memory registry that honours `envs activate`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenv {
    state: Arc<Mutex<GenvState>>,
}

impl InMemoryGenv {
    pub fn with_devices(devices: &[(u32, Option<&str>)]) -> Self {
        let genv = Self::default();
        genv.state.lock().unwrap().devices = devices
            .iter()
            .map(|(index, eid)| (*index, eid.map(str::to_string)))
            .collect();
        genv
    }

    fn answer(&self, args: &[&str]) -> Option<String> {
        let state = self.state.lock().unwrap();
        match args {
            ["devices", "ps", ..] => Some(
                state
                    .devices
                    .iter()
                    .map(|(index, eid)| match eid {
                        Some(eid) => format!("{index},{eid},{eid}-name,2024-01-01T00:00:00"),
                        None => format!("{index},,,"),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            ["devices", "find" | "query", "--eid", eid] => Some(
                state
                    .devices
                    .iter()
                    .filter(|(_, bound)| bound.as_deref() == Some(*eid))
                    .map(|(index, _)| index.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ["envs", "find", "--kernel-id", kernel_id] => {
                Some(state.kernels.get(*kernel_id).cloned().unwrap_or_default())
            }
            _ => None,
        }
    }
}

impl CommandRunner for InMemoryGenv {
    async fn execute(&self, args: &[String]) -> ControlResult<String> {
        let parts: Vec<&str> = args.iter().map(String::as_str).collect();
        if let ["envs", "activate", "--eid", eid, "--uid", _uid, "--kernel-id", kernel_id] =
            parts.as_slice()
        {
            self.state
                .lock()
                .unwrap()
                .kernels
                .insert(kernel_id.to_string(), eid.to_string());
            return Ok(String::new());
        }
        self.answer(&parts).ok_or_else(|| ControlError::ExitStatus {
            command: parts.join(" "),
            code: Some(2),
            stderr: "unknown command".to_string(),
        })
    }
}
