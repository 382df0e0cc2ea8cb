//! `genvlab` operator CLI.
//!
//! # Responsibility
//! - Load configuration and initialize logging once per invocation.
//! - Expose registry reads, activation, provisioning and the state API server.
//! - `launch` starts a kernel command with its provisioned environment.
//!
//! # Invariants
//! - Structured results go to stdout as JSON; diagnostics go to the log.
//! - `launch` never starts the command when provisioning fails.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use genvlab_core::{
    init_logging, DeviceOverride, GenvConfig, GenvProvisioner, GenvStateService, KernelId,
    LaunchEnvironmentPreparer,
};
use log::{error, info};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "genvlab", about = "GPU environment bridge for notebook kernels", version)]
struct Cli {
    /// JSON config file; `GENVLAB_*` variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level override (trace|debug|info|warn|error).
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the state API.
    Serve,
    /// List device bindings.
    Devices,
    /// List active environments.
    Envs,
    /// Print the environment bound to a kernel, or null.
    Find { kernel_id: String },
    /// Bind a kernel to an environment.
    Activate { eid: String, kernel_id: String },
    /// Resolve the device assignment and overlay for a kernel.
    Provision {
        kernel_id: String,
        #[command(flatten)]
        devices: DeviceArgs,
    },
    /// Run a command with the kernel's provisioned environment.
    Launch {
        kernel_id: String,
        #[command(flatten)]
        devices: DeviceArgs,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct DeviceArgs {
    /// Use these device indices instead of asking the registry.
    #[arg(long, value_delimiter = ',', conflicts_with = "no_devices")]
    devices: Option<Vec<u32>>,
    /// Hide every device from the kernel.
    #[arg(long)]
    no_devices: bool,
}

impl DeviceArgs {
    fn to_override(&self) -> Option<DeviceOverride> {
        if self.no_devices {
            return Some(DeviceOverride::new(Vec::new()));
        }
        self.devices.clone().map(DeviceOverride::new)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err:#}");
            eprintln!("genvlab: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = GenvConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    init_logging(&config.log_level, config.log_dir.as_deref())
        .context("failed to initialize logging")?;

    match cli.command {
        Command::Serve => {
            genvlab_server::serve(&config).await?;
        }
        Command::Devices => {
            let service = GenvStateService::from_config(&config);
            print_json(&service.devices().await?)?;
        }
        Command::Envs => {
            let service = GenvStateService::from_config(&config);
            print_json(&service.environments().await?)?;
        }
        Command::Find { kernel_id } => {
            let service = GenvStateService::from_config(&config);
            let kernel_id = KernelId::parse(kernel_id)?;
            print_json(&service.find(&kernel_id).await?)?;
        }
        Command::Activate { eid, kernel_id } => {
            let service = GenvStateService::from_config(&config);
            let kernel_id = KernelId::parse(kernel_id)?;
            service.activate(&eid, &kernel_id).await?;
        }
        Command::Provision { kernel_id, devices } => {
            let provisioner = GenvProvisioner::from_config(&config);
            let kernel_id = KernelId::parse(kernel_id)?;
            let assignment = provisioner
                .resolve_assignment(&kernel_id, devices.to_override())
                .await?;
            let overlay = provisioner.overlay_for(&assignment);
            print_json(&json!({ "assignment": assignment, "overlay": overlay }))?;
        }
        Command::Launch {
            kernel_id,
            devices,
            command,
        } => return launch(&config, kernel_id, &devices, command).await,
    }
    Ok(ExitCode::SUCCESS)
}

async fn launch(
    config: &GenvConfig,
    kernel_id: String,
    devices: &DeviceArgs,
    command: Vec<String>,
) -> Result<ExitCode> {
    let Some((program, args)) = command.split_first() else {
        bail!("launch requires a command after `--`");
    };
    let provisioner = GenvProvisioner::from_config(config);

    // The child inherits the host environment as-is; only the overlay is set.
    let overlay = match devices.to_override() {
        Some(devices) => {
            let kernel_id = KernelId::parse(kernel_id.as_str())?;
            provisioner
                .resolve_overlay(&kernel_id, Some(devices))
                .await?
                .apply_to(&HashMap::new())
        }
        None => {
            provisioner
                .prepare_environment(&kernel_id, &HashMap::new())
                .await?
        }
    };

    info!(
        "event=launch module=cli status=ok kernel_id={kernel_id} program={program} {}={}",
        provisioner.device_variable(),
        overlay
            .get(provisioner.device_variable())
            .map(String::as_str)
            .unwrap_or_default()
    );
    let status = kernel_command(program, args, &overlay)
        .status()
        .await
        .with_context(|| format!("failed to start `{program}`"))?;

    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

/// Kernel process inheriting the current environment with `overlay` on top.
fn kernel_command(
    program: &str,
    args: &[String],
    overlay: &HashMap<String, String>,
) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(program);
    command.args(args).envs(overlay);
    command
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{kernel_command, Cli, Command};
    use clap::Parser;
    use genvlab_core::DeviceOverride;
    use std::collections::HashMap;

    #[test]
    fn parses_provision_with_device_override() {
        let cli = Cli::parse_from(["genvlab", "provision", "k1", "--devices", "3,1"]);
        match cli.command {
            Command::Provision { kernel_id, devices } => {
                assert_eq!(kernel_id, "k1");
                assert_eq!(devices.to_override(), Some(DeviceOverride::new(vec![3, 1])));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_devices_is_an_empty_override() {
        let cli = Cli::parse_from(["genvlab", "provision", "k1", "--no-devices"]);
        match cli.command {
            Command::Provision { devices, .. } => {
                assert_eq!(devices.to_override(), Some(DeviceOverride::new(Vec::new())));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn launch_collects_trailing_command() {
        let cli = Cli::parse_from([
            "genvlab", "--log-level", "warn", "launch", "k1", "--", "python", "-m", "ipykernel",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("warn"));
        match cli.command {
            Command::Launch {
                kernel_id, command, ..
            } => {
                assert_eq!(kernel_id, "k1");
                assert_eq!(command, vec!["python", "-m", "ipykernel"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn devices_conflicts_with_no_devices() {
        let parsed =
            Cli::try_parse_from(["genvlab", "provision", "k1", "--devices", "0", "--no-devices"]);
        assert!(parsed.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kernel_command_keeps_non_utf8_host_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("GENVLAB_TEST_RAW_BYTES", OsStr::from_bytes(b"raw\xff"));
        let overlay = HashMap::from([("CUDA_VISIBLE_DEVICES".to_string(), "0,2".to_string())]);
        let args = vec![
            "-c".to_string(),
            r#"test -n "$GENVLAB_TEST_RAW_BYTES" && printf %s "$CUDA_VISIBLE_DEVICES""#.to_string(),
        ];

        let output = kernel_command("sh", &args, &overlay).output().await.unwrap();
        std::env::remove_var("GENVLAB_TEST_RAW_BYTES");

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "0,2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn overlay_replaces_inherited_device_variable() {
        std::env::set_var("GENVLAB_TEST_DEVICES", "0,1,2,3");
        let overlay = HashMap::from([("GENVLAB_TEST_DEVICES".to_string(), String::new())]);
        let args = vec![
            "-c".to_string(),
            r#"printf '[%s]' "$GENVLAB_TEST_DEVICES""#.to_string(),
        ];

        let output = kernel_command("sh", &args, &overlay).output().await.unwrap();
        std::env::remove_var("GENVLAB_TEST_DEVICES");

        assert_eq!(String::from_utf8_lossy(&output.stdout), "[]");
    }
}
