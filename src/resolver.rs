//! Turns layered secret documents into a [`LaunchPlan`].
//!
//! Resolution runs in four phases:
//!
//! 1. **Layering**: `var/global/default`, `var/<service>/default` and
//!    `var/<service>/<env>` are folded in that order, later documents
//!    overwriting earlier keys. Every layer must exist.
//! 2. **Validation**: required `container_*` keys must be present and
//!    `persistence`, when set, must be `service` or `job`.
//! 3. **Substitution**: `env.NAME` tokens in application values and in
//!    `container_command` are replaced once from the layered map.
//! 4. **Derivation**: the image tag is read from the parameter store and the
//!    plan fields are assembled.

use tracing::{debug, warn};

use crate::env::{references, substitute};
use crate::error::{RelaunchError, Result};
use crate::plan::{LaunchPlan, Persistence, PortMap, Runtime};
use crate::store::{ConfigMap, HostNetwork, ParameterStore, SecretStore};

pub const CONTAINER_PREFIX: &str = "container_";
pub const IMAGE_TAG_PARAM: &str = "container_image_tag_param";
pub const BASE_IMAGE: &str = "container_base_image";
pub const SERVICE_PORT: &str = "container_service_port";
pub const MAP_PORT: &str = "container_map_port";
pub const NAME_PREFIX: &str = "container_service_name_prefix";
pub const COMMAND: &str = "container_command";
/// Filled from [`HostNetwork`] when a substituted value references it and no layer sets it.
pub const HOST_ADDRESS: &str = "container_host_address";

pub const REQUIRED_KEYS: &[&str] = &[IMAGE_TAG_PARAM, BASE_IMAGE, MAP_PORT];

pub const DOCUMENT_ROOT: &str = "var";
pub const GLOBAL_DEFAULT: &str = "var/global/default";

/// Document names in increasing order of specificity.
pub fn layer_names(service: &str, env: &str) -> [String; 3] {
    [
        GLOBAL_DEFAULT.to_string(),
        format!("{DOCUMENT_ROOT}/{service}/default"),
        format!("{DOCUMENT_ROOT}/{service}/{env}"),
    ]
}

/// Last-writer-wins fold of `layers`.
pub fn layer(layers: impl IntoIterator<Item = ConfigMap>) -> ConfigMap {
    layers.into_iter().fold(ConfigMap::new(), |mut acc, next| {
        acc.extend(next);
        acc
    })
}

/// Check required keys and enumerations; returns the effective persistence.
pub fn validate(map: &ConfigMap) -> Result<Persistence> {
    for key in REQUIRED_KEYS {
        if !map.contains_key(*key) {
            return Err(RelaunchError::missing(key));
        }
    }
    if map.contains_key(MAP_PORT) && !map.contains_key(SERVICE_PORT) {
        return Err(RelaunchError::missing(SERVICE_PORT));
    }

    match map.get(Persistence::KEY) {
        Some(raw) => raw.parse(),
        None => Ok(Persistence::default()),
    }
}

fn required<'m>(map: &'m ConfigMap, key: &str) -> Result<&'m str> {
    map.get(key)
        .map(String::as_str)
        .ok_or_else(|| RelaunchError::missing(key))
}

/// Values that go through `env.NAME` substitution: application entries and
/// `container_command`.
fn substituted_values(map: &ConfigMap) -> impl Iterator<Item = &str> {
    map.iter()
        .filter(|(key, _)| !key.starts_with(CONTAINER_PREFIX) || key.as_str() == COMMAND)
        .map(|(_, value)| value.as_str())
}

/// Application entries as `(UPPER_KEY, value)` with tokens substituted.
pub fn env_entries(map: &ConfigMap) -> Result<Vec<(String, String)>> {
    map.iter()
        .filter(|(key, _)| !key.starts_with(CONTAINER_PREFIX))
        .map(|(key, value)| {
            let resolved = substitute(value, map)?;
            if resolved.chars().any(char::is_whitespace) {
                return Err(RelaunchError::WhitespaceInValue { key: key.clone() });
            }
            Ok((key.to_uppercase(), resolved))
        })
        .collect()
}

/// Builds launch plans from the three backends.
pub struct Resolver<'a> {
    secrets: &'a dyn SecretStore,
    parameters: &'a dyn ParameterStore,
    host: &'a dyn HostNetwork,
    runtime: Runtime,
}

impl<'a> Resolver<'a> {
    pub fn new(
        secrets: &'a dyn SecretStore,
        parameters: &'a dyn ParameterStore,
        host: &'a dyn HostNetwork,
        runtime: Runtime,
    ) -> Self {
        Self {
            secrets,
            parameters,
            host,
            runtime,
        }
    }

    /// Fetch and fold the three layers for `(service, env)`.
    pub async fn layered(&self, service: &str, env: &str) -> Result<ConfigMap> {
        let mut layers = Vec::with_capacity(3);
        for name in layer_names(service, env) {
            debug!(document = %name, "fetching layer");
            layers.push(self.secrets.fetch(&name).await?);
        }
        Ok(layer(layers))
    }

    pub async fn resolve(&self, service: &str, env: &str) -> Result<LaunchPlan> {
        let mut map = self.layered(service, env).await?;

        let persistence = validate(&map)?;
        if persistence.restart_policy().is_none() {
            return Err(RelaunchError::UnsupportedPersistence {
                value: persistence.as_str().to_string(),
            });
        }

        if !map.contains_key(HOST_ADDRESS)
            && references(substituted_values(&map), HOST_ADDRESS)
        {
            let address = self.host.host_address(self.runtime).await?;
            debug!(%address, "resolved host address");
            map.insert(HOST_ADDRESS.to_string(), address);
        }

        let env_vars = env_entries(&map)?;
        let trailing_command = map
            .get(COMMAND)
            .map(|cmd| substitute(cmd, &map))
            .transpose()?;

        let tag = self.parameters.get_value(required(&map, IMAGE_TAG_PARAM)?).await?;
        let image = format!("{}:{}", required(&map, BASE_IMAGE)?, tag.trim());

        let prefix = match map.get(NAME_PREFIX) {
            Some(prefix) => prefix.as_str(),
            None => {
                warn!("{NAME_PREFIX} not found in service map, using {service}");
                service
            }
        };
        let name = format!("{prefix}-{env}");

        let port_map = match (map.get(MAP_PORT), map.get(SERVICE_PORT)) {
            (Some(host), Some(container)) => Some(PortMap {
                host: host.clone(),
                container: container.clone(),
            }),
            _ => None,
        };

        Ok(LaunchPlan {
            runtime: self.runtime,
            name,
            image,
            port_map,
            env: env_vars,
            persistence,
            trailing_command,
        })
    }
}
