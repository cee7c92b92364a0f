//! End-to-end relaunch scenarios against in-memory backends and a
//! recording container runtime.

use std::sync::Mutex;

use async_trait::async_trait;

use relaunch::docker::ContainerRuntime;
use relaunch::memory::{InMemoryParameterStore, InMemorySecretStore, StaticHostNetwork};
use relaunch::plan::{LaunchPlan, Runtime};
use relaunch::ports::list_published_ports;
use relaunch::relaunch::{relaunch, Mode};
use relaunch::resolver::Resolver;
use relaunch::{RelaunchError, Result};

#[derive(Default)]
struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
}

impl RecordingRuntime {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        self.record(format!("pull {image}"));
        Ok(())
    }

    async fn exists_running(&self, name: &str) -> Result<bool> {
        self.record(format!("ps {name}"));
        Ok(true)
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.record(format!("stop {name}"));
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.record(format!("rm {name}"));
        Ok(())
    }

    async fn run(&self, plan: &LaunchPlan) -> Result<String> {
        self.record(plan.run_command_line());
        Ok("started\n".to_string())
    }
}

fn service_default() -> Vec<(&'static str, &'static str)> {
    vec![
        ("container_base_image", "ex/svc"),
        ("container_image_tag_param", "/svc/tag"),
        ("container_service_port", "8080"),
        ("container_map_port", "18080"),
    ]
}

fn s1_store() -> InMemorySecretStore {
    InMemorySecretStore::new()
        .with_document("var/global/default", [("LOG_LEVEL", "info")])
        .with_document("var/svc/default", service_default())
        .with_document("var/svc/prod", [("LOG_LEVEL", "debug")])
}

async fn launch(
    secrets: &InMemorySecretStore,
    runtime: &RecordingRuntime,
    mode: Mode,
) -> Result<String> {
    let params = InMemoryParameterStore::new().with_value("/svc/tag", "v2");
    let host = StaticHostNetwork("host.docker.internal".to_string());
    let plan = Resolver::new(secrets, &params, &host, Runtime::Docker)
        .resolve("svc", "prod")
        .await?;

    let mut out = Vec::new();
    relaunch(runtime, &plan, mode, &mut out).await?;
    Ok(String::from_utf8(out).expect("utf8 output"))
}

#[tokio::test]
async fn s1_happy_path() {
    let runtime = RecordingRuntime::default();
    launch(&s1_store(), &runtime, Mode::Execute).await.unwrap();

    let calls = runtime.calls();
    assert_eq!(calls[0], "pull ex/svc:v2");
    assert_eq!(&calls[1..4], ["ps svc-prod", "stop svc-prod", "rm svc-prod"]);

    let run = &calls[4];
    assert!(run.contains("--name svc-prod"));
    assert!(run.contains("-p 18080:8080"));
    assert!(run.contains("-e LOG_LEVEL=debug"));
    assert!(run.ends_with(" ex/svc:v2"));
}

#[tokio::test]
async fn s2_missing_required_key() {
    let defaults: Vec<_> = service_default()
        .into_iter()
        .filter(|(k, _)| *k != "container_base_image")
        .collect();
    let secrets = InMemorySecretStore::new()
        .with_document("var/global/default", [("LOG_LEVEL", "info")])
        .with_document("var/svc/default", defaults)
        .with_document("var/svc/prod", [("LOG_LEVEL", "debug")]);

    let runtime = RecordingRuntime::default();
    let err = launch(&secrets, &runtime, Mode::Execute).await.unwrap_err();
    assert!(matches!(err, RelaunchError::ConfigMissing { ref key } if key == "container_base_image"));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn s3_unresolved_token() {
    let secrets = InMemorySecretStore::new()
        .with_document("var/global/default", [("LOG_LEVEL", "info")])
        .with_document("var/svc/default", service_default())
        .with_document(
            "var/svc/prod",
            [("LOG_LEVEL", "debug"), ("URL", "http://env.MISSING/path")],
        );

    let runtime = RecordingRuntime::default();
    let err = launch(&secrets, &runtime, Mode::Execute).await.unwrap_err();
    assert!(matches!(err, RelaunchError::UnresolvedReference { .. }));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn s4_most_specific_port_wins() {
    let defaults: Vec<_> = service_default()
        .into_iter()
        .filter(|(k, _)| *k != "container_map_port")
        .collect();
    let secrets = InMemorySecretStore::new()
        .with_document("var/global/default", [("container_map_port", "10000")])
        .with_document("var/svc/default", defaults)
        .with_document("var/svc/prod", [("container_map_port", "20000")]);

    let runtime = RecordingRuntime::default();
    let out = launch(&secrets, &runtime, Mode::DryRun).await.unwrap();
    assert!(out.contains("-p 20000:8080"));
}

#[tokio::test]
async fn s5_inventory_sorted_and_filtered() {
    let secrets = InMemorySecretStore::new()
        .with_document("var/a/prod", [("container_map_port", "30")])
        .with_document("var/b/prod", [("container_map_port", "10")])
        .with_document("var/c/prod", [("container_map_port", "20")])
        .with_document("var/orphan", [("container_map_port", "5")]);

    let listed: Vec<String> = list_published_ports(&secrets)
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(listed, ["b-prod: 10", "c-prod: 20", "a-prod: 30"]);
}

#[tokio::test]
async fn s6_dry_run_is_pure() {
    let runtime = RecordingRuntime::default();
    let out = launch(&s1_store(), &runtime, Mode::DryRun).await.unwrap();

    assert!(runtime.calls().is_empty());
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        [
            "Pull image: docker pull ex/svc:v2",
            "Stop container: docker stop svc-prod",
            "Run container: docker run -d --restart unless-stopped --name svc-prod -p 18080:8080 -e LOG_LEVEL=debug ex/svc:v2",
        ]
    );
}

#[tokio::test]
async fn dry_run_names_the_configured_runtime() {
    let params = InMemoryParameterStore::new().with_value("/svc/tag", "v2");
    let host = StaticHostNetwork("10.88.0.1".to_string());
    let plan = Resolver::new(&s1_store(), &params, &host, Runtime::Podman)
        .resolve("svc", "prod")
        .await
        .unwrap();

    let runtime = RecordingRuntime::default();
    let mut out = Vec::new();
    relaunch(&runtime, &plan, Mode::DryRun, &mut out).await.unwrap();

    assert!(runtime.calls().is_empty());
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("Pull image: podman pull ex/svc:v2\n"));
    assert!(out.contains("Stop container: podman stop svc-prod\n"));
    assert!(out.contains("Run container: podman run -d "));
}

#[tokio::test]
async fn one_corrupt_document_drops_one_entry() {
    let mut secrets = InMemorySecretStore::new();
    for (i, service) in ["a", "b", "c", "d"].iter().enumerate() {
        let port = (9000 + i).to_string();
        secrets.insert(&format!("var/{service}/prod"), [("container_map_port", port)]);
    }
    let healthy = list_published_ports(&secrets).await.unwrap().len();

    secrets.insert_raw("var/c/prod", r#"{"container_map_port": 9002"#);
    let degraded = list_published_ports(&secrets).await.unwrap();

    assert_eq!(healthy, 4);
    assert_eq!(degraded.len(), healthy - 1);
    assert!(degraded.iter().all(|p| p.label != "c-prod"));
    assert!(degraded.windows(2).all(|w| w[0].port <= w[1].port));
}

#[tokio::test]
async fn name_is_prefix_or_service_joined_with_env() {
    let params = InMemoryParameterStore::new().with_value("/svc/tag", "v2");
    let host = StaticHostNetwork("host.docker.internal".to_string());

    for (prefix, expected) in [(None, "svc-prod"), (Some("edge"), "edge-prod")] {
        let mut env_layer = vec![("LOG_LEVEL", "debug")];
        if let Some(prefix) = prefix {
            env_layer.push(("container_service_name_prefix", prefix));
        }
        let secrets = InMemorySecretStore::new()
            .with_document("var/global/default", [("LOG_LEVEL", "info")])
            .with_document("var/svc/default", service_default())
            .with_document("var/svc/prod", env_layer);

        let plan = Resolver::new(&secrets, &params, &host, Runtime::Docker)
            .resolve("svc", "prod")
            .await
            .unwrap();
        assert_eq!(plan.name, expected);
    }
}
