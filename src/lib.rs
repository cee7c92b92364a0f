//! Relaunch a service container from layered secret documents.
//!
//! A launch folds `var/global/default`, `var/<service>/default` and
//! `var/<service>/<env>` into one configuration map, derives a
//! [`plan::LaunchPlan`] from it and drives `docker` or `podman` to pull,
//! stop and run the container.

pub mod aws;
pub mod config;
pub mod docker;
pub mod env;
pub mod error;
pub mod memory;
pub mod plan;
pub mod ports;
pub mod relaunch;
pub mod resolver;
pub mod store;

pub use error::{RelaunchError, Result};
