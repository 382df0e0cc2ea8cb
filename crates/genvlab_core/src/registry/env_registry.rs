//! Environment registry client.
//!
//! # Responsibility
//! - List active environments.
//! - Resolve a kernel id to the environment it is bound to.
//! - Bind a kernel id to an environment (`envs activate`).
//!
//! # Invariants
//! - Identifiers are validated before a registry process is spawned.
//! - Rebinding policy belongs to the registry; `activate` forwards the call
//!   without checking existing bindings.

use crate::control::table::{fields, parse_rows, split_list};
use crate::control::{CommandRunner, ControlResult};
use crate::model::environment::EnvironmentRecord;
use crate::model::identity::{validate_identifier, KernelId};
use crate::registry::{namespaced, RegistryError, RegistryResult};
use log::{debug, info};
use std::future::Future;

const ENVS_NAMESPACE: &str = "envs";

/// Read/bind access to logical environments.
pub trait EnvironmentRegistry: Send + Sync {
    fn list_environments(
        &self,
    ) -> impl Future<Output = RegistryResult<Vec<EnvironmentRecord>>> + Send;

    /// `Ok(None)` means the kernel is not bound yet.
    fn resolve_environment(
        &self,
        kernel_id: &KernelId,
    ) -> impl Future<Output = RegistryResult<Option<String>>> + Send;

    fn activate(
        &self,
        eid: &str,
        kernel_id: &KernelId,
    ) -> impl Future<Output = RegistryResult<()>> + Send;
}

/// `genv envs` client.
#[derive(Debug, Clone)]
pub struct GenvEnvironmentRegistry<R: CommandRunner> {
    runner: R,
    uid: Option<u32>,
}

impl<R: CommandRunner> GenvEnvironmentRegistry<R> {
    /// `uid` is sent with `envs activate`; without it activation is rejected.
    pub fn new(runner: R, uid: Option<u32>) -> Self {
        Self { runner, uid }
    }
}

impl<R: CommandRunner> EnvironmentRegistry for GenvEnvironmentRegistry<R> {
    async fn list_environments(&self) -> RegistryResult<Vec<EnvironmentRecord>> {
        let args = namespaced(
            ENVS_NAMESPACE,
            &["ps", "--format", "csv", "--no-header", "--timestamp"],
        );
        let stdout = self.runner.execute(&args).await?;
        let environments = parse_environments(&stdout)?;
        debug!(
            "event=envs_list module=registry status=ok count={}",
            environments.len()
        );
        Ok(environments)
    }

    async fn resolve_environment(&self, kernel_id: &KernelId) -> RegistryResult<Option<String>> {
        let args = namespaced(ENVS_NAMESPACE, &["find", "--kernel-id", kernel_id.as_str()]);
        let stdout = self.runner.execute(&args).await?;
        let eid = parse_environment_lookup(kernel_id, &stdout)?;
        debug!(
            "event=envs_resolve module=registry status=ok kernel_id={kernel_id} eid={}",
            eid.as_deref().unwrap_or("-")
        );
        Ok(eid)
    }

    async fn activate(&self, eid: &str, kernel_id: &KernelId) -> RegistryResult<()> {
        validate_identifier("environment id", eid)?;
        let uid = self.uid.ok_or(RegistryError::MissingUid)?.to_string();
        let args = namespaced(
            ENVS_NAMESPACE,
            &[
                "activate",
                "--eid",
                eid,
                "--uid",
                uid.as_str(),
                "--kernel-id",
                kernel_id.as_str(),
            ],
        );
        self.runner.execute(&args).await?;
        info!("event=envs_activate module=registry status=ok eid={eid} kernel_id={kernel_id} uid={uid}");
        Ok(())
    }
}

/// Parses `eid,user,name,created,pids` rows; pids are space-joined.
pub fn parse_environments(text: &str) -> ControlResult<Vec<EnvironmentRecord>> {
    parse_rows(text)
        .iter()
        .map(|row| {
            let [eid, user, name, created, pids] = fields::<5>(row, "envs ps")?;
            Ok(EnvironmentRecord {
                eid: eid.trim().to_string(),
                user: user.trim().to_string(),
                name: name.trim().to_string(),
                created: created.trim().to_string(),
                pids: split_list(pids, ' ', "envs ps pids")?,
            })
        })
        .collect()
}

/// Interprets an `envs find --kernel-id` response.
///
/// Empty output means no binding. More than one distinct environment is an
/// `AmbiguousBinding`.
pub fn parse_environment_lookup(
    kernel_id: &KernelId,
    text: &str,
) -> RegistryResult<Option<String>> {
    let mut eids: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !eids.iter().any(|eid| eid == line) {
            eids.push(line.to_string());
        }
    }

    match eids.len() {
        0 => Ok(None),
        1 => Ok(eids.pop()),
        _ => Err(RegistryError::AmbiguousBinding {
            kernel_id: kernel_id.to_string(),
            eids,
        }),
    }
}
