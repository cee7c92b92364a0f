use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{RelaunchError, Result};
use crate::plan::{LaunchPlan, Runtime};
use crate::store::HostNetwork;

/// Operations against a local container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, image: &str) -> Result<()>;

    /// Whether a container with exactly this name is running.
    async fn exists_running(&self, name: &str) -> Result<bool>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Start the container, returning its combined output.
    async fn run(&self, plan: &LaunchPlan) -> Result<String>;

    /// Stop and remove `name` if it is running. Returns whether anything was stopped.
    async fn stop_and_remove(&self, name: &str) -> Result<bool> {
        if !self.exists_running(name).await? {
            info!("Container {name} is not running");
            return Ok(false);
        }
        info!("Stopping container: {name}");
        self.stop(name).await?;
        self.remove(name).await?;
        info!("Container stopped and removed successfully");
        Ok(true)
    }
}

/// Drives the `docker` or `podman` binary.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    bin: String,
}

impl CliRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn status(&self, args: &[&str]) -> Result<()> {
        debug!(bin = %self.bin, ?args, "spawning");
        let command = command_line(&self.bin, args);
        let status = Command::new(&self.bin)
            .args(args)
            .status()
            .await
            .map_err(|source| RelaunchError::RuntimeSpawn {
                command: command.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RelaunchError::RuntimeFailure {
                command,
                status: status.to_string(),
                output: String::new(),
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        info!("Pulling image: {image}");
        // stdout/stderr are inherited so progress reaches the terminal.
        self.status(&["pull", image]).await
    }

    async fn exists_running(&self, name: &str) -> Result<bool> {
        let filter = format!("name={name}");
        let out = cmd_out(&self.bin, &["ps", "-f", &filter]).await?;
        Ok(ps_lists_name(&out, name))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        cmd_out(&self.bin, &["stop", name]).await.map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        cmd_out(&self.bin, &["rm", name]).await.map(|_| ())
    }

    async fn run(&self, plan: &LaunchPlan) -> Result<String> {
        let args = plan.run_args();
        let command = plan.run_command_line();
        debug!(%command, "running container");
        let out = Command::new(&self.bin)
            .args(&args)
            .output()
            .await
            .map_err(|source| RelaunchError::RuntimeSpawn {
                command: command.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&out.stderr));

        if !out.status.success() {
            return Err(RelaunchError::RuntimeFailure {
                command,
                status: out.status.to_string(),
                output: combined,
            });
        }
        Ok(combined)
    }
}

fn command_line(bin: &str, args: &[&str]) -> String {
    std::iter::once(bin)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn cmd_out(bin: &str, args: &[&str]) -> Result<String> {
    let command = command_line(bin, args);
    let out = Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|source| RelaunchError::RuntimeSpawn {
            command: command.clone(),
            source,
        })?;
    if !out.status.success() {
        return Err(RelaunchError::RuntimeFailure {
            command,
            status: out.status.to_string(),
            output: String::from_utf8_lossy(&out.stderr).trim_end().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim_end().to_string())
}

/// `ps -f name=` matches substrings, so look for the name as a whole column.
pub fn ps_lists_name(ps_output: &str, name: &str) -> bool {
    ps_output
        .lines()
        .skip(1)
        .any(|line| line.split_whitespace().any(|col| col == name))
}

#[derive(Debug, Deserialize)]
struct PodmanNetwork {
    #[serde(default)]
    subnets: Vec<PodmanSubnet>,
}

#[derive(Debug, Deserialize)]
struct PodmanSubnet {
    #[serde(default)]
    gateway: String,
}

/// First subnet gateway from `podman network inspect` output.
pub fn parse_podman_gateway(inspect_json: &str) -> Result<String> {
    let networks: Vec<PodmanNetwork> =
        serde_json::from_str(inspect_json).map_err(|e| RelaunchError::HostProbe {
            message: format!("unreadable network inspect output: {e}"),
        })?;

    let gateway = networks
        .first()
        .and_then(|n| n.subnets.first())
        .map(|s| s.gateway.trim().to_string())
        .unwrap_or_default();

    if gateway.is_empty() {
        return Err(RelaunchError::HostProbe {
            message: "podman network has no subnet gateway".to_string(),
        });
    }
    Ok(gateway)
}

/// Resolves the host address by asking the runtime itself.
#[derive(Debug, Clone)]
pub struct RuntimeHostNetwork {
    bin: String,
}

impl RuntimeHostNetwork {
    pub const DOCKER_HOST: &'static str = "host.docker.internal";
    pub const PODMAN_NETWORK: &'static str = "podman";

    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl HostNetwork for RuntimeHostNetwork {
    async fn host_address(&self, runtime: Runtime) -> Result<String> {
        match runtime {
            Runtime::Docker => Ok(Self::DOCKER_HOST.to_string()),
            Runtime::Podman => {
                let out =
                    cmd_out(&self.bin, &["network", "inspect", Self::PODMAN_NETWORK]).await?;
                parse_podman_gateway(&out)
            }
        }
    }
}
