//! Runtime configuration.
//!
//! # Responsibility
//! - Load settings from an optional JSON file.
//! - Apply `GENVLAB_*` / `GENV_ROOT` environment overrides on top.
//! - Validate the result once, before any registry call is made.
//!
//! # Invariants
//! - Precedence is: environment > file > built-in defaults.
//! - A loaded config is always validated.

use crate::logging::{default_log_level, normalize_level};
use crate::model::overlay::DEFAULT_DEVICE_VARIABLE;
use crate::registry::device_registry::DeviceLookupVerb;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_GENV_BIN: &str = "GENVLAB_GENV_BIN";
pub const ENV_GENV_ROOT: &str = "GENV_ROOT";
pub const ENV_UID: &str = "GENVLAB_UID";
pub const ENV_DEVICE_VARIABLE: &str = "GENVLAB_DEVICE_VARIABLE";
pub const ENV_DEVICE_LOOKUP: &str = "GENVLAB_DEVICE_LOOKUP";
pub const ENV_BIND_ADDR: &str = "GENVLAB_BIND_ADDR";
pub const ENV_BASE_PATH: &str = "GENVLAB_BASE_PATH";
pub const ENV_TOKEN: &str = "GENVLAB_TOKEN";
pub const ENV_LOG_LEVEL: &str = "GENVLAB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "GENVLAB_LOG_DIR";

const DEFAULT_GENV_BIN: &str = "genv";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8895";
const DEFAULT_BASE_PATH: &str = "/jupyterlab-genv";

/// Configuration loading/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Effective settings for registry access, provisioning and the state API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenvConfig {
    /// Registry executable.
    pub genv_bin: PathBuf,
    /// Registry installation root; `<root>/bin/genv` is preferred when present.
    pub genv_root: Option<PathBuf>,
    /// Numeric user id sent with `envs activate`.
    pub uid: Option<u32>,
    /// Device-visibility variable written into kernel environments.
    pub device_variable: String,
    /// Device lookup subcommand understood by the installed registry.
    pub device_lookup: DeviceLookupVerb,
    pub bind_addr: String,
    /// Route prefix for the state API.
    pub base_path: String,
    /// Shared token required by the state API when set.
    pub auth_token: Option<String>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for GenvConfig {
    fn default() -> Self {
        Self {
            genv_bin: PathBuf::from(DEFAULT_GENV_BIN),
            genv_root: None,
            uid: None,
            device_variable: DEFAULT_DEVICE_VARIABLE.to_string(),
            device_lookup: DeviceLookupVerb::default(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            auth_token: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl GenvConfig {
    /// Loads the file (if given), applies process environment overrides and
    /// validates.
    ///
    /// # Errors
    /// - `Io`/`Parse` when the file cannot be read or decoded.
    /// - `Invalid` when any field fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.resolve_defaults(|name| std::env::var(name).ok(), read_proc_uid);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(ENV_GENV_BIN) {
            self.genv_bin = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_GENV_ROOT) {
            self.genv_root = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_UID) {
            let uid = value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_UID} must be numeric, got `{value}`")))?;
            self.uid = Some(uid);
        }
        if let Some(value) = lookup(ENV_DEVICE_VARIABLE) {
            self.device_variable = value;
        }
        if let Some(value) = lookup(ENV_DEVICE_LOOKUP) {
            self.device_lookup = value.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(value) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = value;
        }
        if let Some(value) = lookup(ENV_BASE_PATH) {
            self.base_path = value;
        }
        if let Some(value) = lookup(ENV_TOKEN) {
            self.auth_token = Some(value);
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Fills values that are derived rather than configured: the registry
    /// root (`$HOME/genv` fallback), the installed `genv` binary and the uid.
    pub fn resolve_defaults(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
        current_uid: impl Fn() -> Option<u32>,
    ) {
        if self.genv_root.is_none() {
            self.genv_root = lookup("HOME").map(|home| Path::new(&home).join("genv"));
        }
        if self.genv_bin == Path::new(DEFAULT_GENV_BIN) {
            if let Some(root) = &self.genv_root {
                let installed = root.join("bin").join(DEFAULT_GENV_BIN);
                if installed.is_file() {
                    self.genv_bin = installed;
                }
            }
        }
        if self.uid.is_none() {
            self.uid = current_uid();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.genv_bin.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("genv_bin must not be empty".to_string()));
        }
        if !is_valid_variable_name(&self.device_variable) {
            return Err(ConfigError::Invalid(format!(
                "device_variable `{}` is not a valid environment variable name",
                self.device_variable
            )));
        }
        self.socket_addr()?;
        if !self.base_path.starts_with('/') || self.base_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "base_path `{}` must start with `/` and must not end with `/`",
                self.base_path
            )));
        }
        if matches!(&self.auth_token, Some(token) if token.trim().is_empty()) {
            return Err(ConfigError::Invalid("auth_token must not be blank".to_string()));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bind_addr `{}` is not host:port", self.bind_addr)))
    }
}

fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Real uid of the current process from `/proc/self/status`.
fn read_proc_uid() -> Option<u32> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status_uid(&status)
}

fn parse_status_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}
