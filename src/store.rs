use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{RelaunchError, Result};
use crate::plan::Runtime;

/// Flat key/value configuration, as stored in one secret document or
/// layered from several. Ordered so that derived env flags are stable.
pub type ConfigMap = BTreeMap<String, String>;

/// Named JSON documents holding string-to-string maps.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<ConfigMap>;

    /// All document names starting with `prefix`, across every page.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_value(&self, name: &str) -> Result<String>;
}

/// Address of the host as seen from inside a container.
#[async_trait]
pub trait HostNetwork: Send + Sync {
    async fn host_address(&self, runtime: Runtime) -> Result<String>;
}

/// Decode a secret payload. Every value must be a JSON string.
pub fn decode_document(name: &str, payload: &str) -> Result<ConfigMap> {
    serde_json::from_str::<ConfigMap>(payload).map_err(|source| RelaunchError::DocumentDecode {
        name: name.to_string(),
        source,
    })
}
