//! In-process backends for the store traits.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{RelaunchError, Result};
use crate::plan::Runtime;
use crate::store::{decode_document, ConfigMap, HostNetwork, ParameterStore, SecretStore};

/// Secret documents kept as raw payloads, so corrupt entries can be modelled.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretStore {
    documents: BTreeMap<String, String>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document<K, V>(mut self, name: &str, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.insert(name, entries);
        self
    }

    pub fn insert<K, V>(&mut self, name: &str, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: ConfigMap = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let payload = serde_json::to_string(&map).expect("string map serializes to JSON");
        self.documents.insert(name.to_string(), payload);
    }

    pub fn insert_raw(&mut self, name: &str, payload: impl Into<String>) {
        self.documents.insert(name.to_string(), payload.into());
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn fetch(&self, name: &str) -> Result<ConfigMap> {
        let payload = self
            .documents
            .get(name)
            .ok_or_else(|| RelaunchError::BackendNotFound {
                name: name.to_string(),
            })?;
        decode_document(name, payload)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .documents
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryParameterStore {
    values: BTreeMap<String, String>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_value(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| RelaunchError::BackendNotFound {
                name: name.to_string(),
            })
    }
}

/// Returns a fixed address regardless of runtime.
#[derive(Debug, Clone)]
pub struct StaticHostNetwork(pub String);

#[async_trait]
impl HostNetwork for StaticHostNetwork {
    async fn host_address(&self, _runtime: Runtime) -> Result<String> {
        Ok(self.0.clone())
    }
}
