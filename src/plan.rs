use std::fmt;
use std::str::FromStr;

use crate::error::RelaunchError;

/// Container engine the plan is executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Docker,
    Podman,
}

impl Runtime {
    pub const ALLOWED: &'static [&'static str] = &["docker", "podman"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::Podman => "podman",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = RelaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(Runtime::Docker),
            "podman" => Ok(Runtime::Podman),
            other => Err(RelaunchError::ConfigInvalidEnum {
                key: "CONTAINER_OS".to_string(),
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    #[default]
    Service,
    Job,
}

impl Persistence {
    pub const KEY: &'static str = "persistence";
    pub const ALLOWED: &'static [&'static str] = &["job", "service"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persistence::Service => "service",
            Persistence::Job => "job",
        }
    }

    /// Restart policy passed to `run --restart`, if this persistence has one.
    pub fn restart_policy(&self) -> Option<&'static str> {
        match self {
            Persistence::Service => Some("unless-stopped"),
            Persistence::Job => None,
        }
    }
}

impl FromStr for Persistence {
    type Err = RelaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Persistence::Service),
            "job" => Ok(Persistence::Job),
            other => Err(RelaunchError::ConfigInvalidEnum {
                key: Self::KEY.to_string(),
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMap {
    pub host: String,
    pub container: String,
}

impl fmt::Display for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Fully resolved description of one `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub runtime: Runtime,
    pub name: String,
    pub image: String,
    pub port_map: Option<PortMap>,
    pub env: Vec<(String, String)>,
    pub persistence: Persistence,
    pub trailing_command: Option<String>,
}

impl LaunchPlan {
    /// Arguments following the runtime binary for the detached run.
    ///
    /// Shape: `run -d [--restart P] --name N [-p H:C] -e K=V ... IMAGE [trailing...]`.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        if let Some(policy) = self.persistence.restart_policy() {
            args.push("--restart".to_string());
            args.push(policy.to_string());
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        if let Some(ports) = &self.port_map {
            args.push("-p".to_string());
            args.push(ports.to_string());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(self.image.clone());
        if let Some(cmd) = &self.trailing_command {
            args.extend(cmd.split_whitespace().map(str::to_string));
        }
        args
    }

    /// The run invocation as the operator would type it.
    pub fn run_command_line(&self) -> String {
        let mut line = self.runtime.as_str().to_string();
        for arg in self.run_args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}
