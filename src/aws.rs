//! Secrets Manager and SSM Parameter Store backends.

use std::future::Future;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType};
use serde::de::Error as _;
use tracing::debug;

use crate::error::{RelaunchError, Result};
use crate::store::{decode_document, ConfigMap, ParameterStore, SecretStore};

/// Load the shared SDK config, pinning `region` when given.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

fn transport<E>(name: &str, err: E) -> RelaunchError
where
    E: std::error::Error + 'static,
{
    RelaunchError::BackendTransport {
        name: name.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn fetch(&self, name: &str) -> Result<ConfigMap> {
        debug!(secret = %name, "GetSecretValue");
        let out = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception())
                {
                    RelaunchError::BackendNotFound {
                        name: name.to_string(),
                    }
                } else {
                    transport(name, err)
                }
            })?;

        let payload = out
            .secret_string()
            .ok_or_else(|| RelaunchError::DocumentDecode {
                name: name.to_string(),
                source: serde_json::Error::custom("secret has no string payload"),
            })?;
        decode_document(name, payload)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let filter = Filter::builder()
            .key(FilterNameStringType::Name)
            .values(prefix)
            .build();
        let client = &self.client;
        let filter = &filter;

        collect_pages(prefix, |next_token| async move {
            let page = client
                .list_secrets()
                .filters(filter.clone())
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| transport(prefix, err))?;
            Ok::<_, RelaunchError>(SecretPage {
                names: page
                    .secret_list()
                    .iter()
                    .filter_map(|entry| entry.name())
                    .map(str::to_string)
                    .collect(),
                next_token: page.next_token().map(str::to_string),
            })
        })
        .await
    }
}

/// Secret names from one `ListSecrets` response.
struct SecretPage {
    names: Vec<String>,
    next_token: Option<String>,
}

/// Follow `NextToken` until a page comes back without one. An empty token
/// ends the listing like a missing one. The service-side name filter is not
/// a strict prefix match, so names outside `prefix` are dropped here.
async fn collect_pages<F, Fut>(prefix: &str, mut fetch_page: F) -> Result<Vec<String>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<SecretPage>>,
{
    let mut names = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        debug!(%prefix, page_token = ?next_token, "ListSecrets");
        let page = fetch_page(next_token.take()).await?;
        names.extend(
            page.names
                .into_iter()
                .filter(|name| name.starts_with(prefix)),
        );

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }
    Ok(names)
}

pub struct AwsParameterStore {
    client: aws_sdk_ssm::Client,
}

impl AwsParameterStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait]
impl ParameterStore for AwsParameterStore {
    async fn get_value(&self, name: &str) -> Result<String> {
        debug!(parameter = %name, "GetParameter");
        let out = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_parameter_not_found())
                {
                    RelaunchError::BackendNotFound {
                        name: name.to_string(),
                    }
                } else {
                    transport(name, err)
                }
            })?;

        out.parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| RelaunchError::BackendNotFound {
                name: name.to_string(),
            })
    }
}
