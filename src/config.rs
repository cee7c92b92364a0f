use crate::error::{RelaunchError, Result};
use crate::plan::Runtime;

pub const CONTAINER_OS: &str = "CONTAINER_OS";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub runtime: Runtime,
    pub region: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = lookup(CONTAINER_OS)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                RelaunchError::usage("CONTAINER_OS environment variable not set! [docker/podman]")
            })?;

        let runtime = raw.parse::<Runtime>().map_err(|_| {
            RelaunchError::usage(format!(
                "Invalid CONTAINER_OS value '{raw}'. Must be one of {:?}!",
                Runtime::ALLOWED
            ))
        })?;

        let region = non_empty(lookup(AWS_DEFAULT_REGION));

        Ok(Settings {
            runtime,
            region,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
