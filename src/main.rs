use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relaunch::aws::{load_sdk_config, AwsParameterStore, AwsSecretStore};
use relaunch::config::Settings;
use relaunch::docker::{CliRuntime, RuntimeHostNetwork};
use relaunch::ports::list_published_ports;
use relaunch::relaunch::{relaunch, Mode};
use relaunch::resolver::Resolver;

/// Relaunch a service container from its layered secrets.
#[derive(Parser, Debug)]
#[command(name = "relaunch", version, about, long_about = None)]
struct Cli {
    /// Environment (dev/beta/prod/etc)
    #[arg(long, value_name = "ENV", required_unless_present = "list_ports")]
    env: Option<String>,

    /// Name of service to run
    #[arg(long, required_unless_present = "list_ports")]
    service: Option<String>,

    /// Print commands without executing them
    #[arg(long)]
    dry_run: bool,

    /// List all container map ports
    #[arg(long)]
    list_ports: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot read working directory")?;
    let loaded = relaunch::env::load_env(&cwd)?;
    init_tracing();
    if !loaded.is_empty() {
        tracing::debug!(files = ?loaded, "loaded environment files");
    }

    let settings = Settings::from_env()?;
    let sdk = load_sdk_config(settings.region.as_deref()).await;
    let secrets = AwsSecretStore::new(&sdk);

    if cli.list_ports {
        let ports = list_published_ports(&secrets)
            .await
            .context("listing container map ports")?;
        let mut stdout = std::io::stdout().lock();
        for port in ports {
            writeln!(stdout, "{port}")?;
        }
        return Ok(());
    }

    // clap enforces both unless --list-ports.
    let (Some(env), Some(service)) = (cli.env, cli.service) else {
        anyhow::bail!("USAGE: relaunch --env <env> --service <service> [--dry-run]");
    };

    info!("Restarting {service} {env}");
    let parameters = AwsParameterStore::new(&sdk);
    let host = RuntimeHostNetwork::new(settings.runtime.as_str());
    let plan = Resolver::new(&secrets, &parameters, &host, settings.runtime)
        .resolve(&service, &env)
        .await
        .with_context(|| format!("resolving {service} {env}"))?;

    let runtime = CliRuntime::new(settings.runtime.as_str());
    let mode = if cli.dry_run { Mode::DryRun } else { Mode::Execute };
    let mut stdout = std::io::stdout();
    relaunch(&runtime, &plan, mode, &mut stdout).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_ports_needs_no_service() {
        let cli = Cli::try_parse_from(["relaunch", "--list-ports"]).unwrap();
        assert!(cli.list_ports);
        assert!(cli.env.is_none());
    }

    #[test]
    fn launch_requires_env_and_service() {
        let err = Cli::try_parse_from(["relaunch", "--env", "prod"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let cli =
            Cli::try_parse_from(["relaunch", "--env", "prod", "--service", "svc", "--dry-run"])
                .unwrap();
        assert_eq!(cli.service.as_deref(), Some("svc"));
        assert!(cli.dry_run);
    }
}
