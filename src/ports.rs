use std::fmt;

use tracing::{debug, warn};

use crate::error::Result;
use crate::resolver::{DOCUMENT_ROOT, MAP_PORT};
use crate::store::SecretStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    /// `<service>-<env>`
    pub label: String,
    pub port: i64,
}

impl fmt::Display for PublishedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.port)
    }
}

/// Split `var/<service>/<env>` into its two labelled segments.
fn service_env(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(root), Some(service), Some(env), None) if root == DOCUMENT_ROOT => {
            Some((service, env))
        }
        _ => None,
    }
}

/// Host ports mapped by every `var/<service>/<env>` document, ascending.
///
/// Listing failures are fatal. A document that cannot be read, has no
/// `container_map_port`, or whose port is not an integer is skipped with a
/// warning so the rest of the fleet is still reported. Integers are listed
/// as stored, even outside the valid port range.
pub async fn list_published_ports(store: &dyn SecretStore) -> Result<Vec<PublishedPort>> {
    let prefix = format!("{DOCUMENT_ROOT}/");
    let names = store.list_by_prefix(&prefix).await?;

    let mut ports = Vec::new();
    for name in &names {
        let Some((service, env)) = service_env(name) else {
            debug!(document = %name, "not a service/env document");
            continue;
        };

        let doc = match store.fetch(name).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping {name}: {e}");
                continue;
            }
        };

        let Some(raw) = doc.get(MAP_PORT) else {
            debug!(document = %name, "no {MAP_PORT}");
            continue;
        };

        match raw.parse::<i64>() {
            Ok(port) => ports.push(PublishedPort {
                label: format!("{service}-{env}"),
                port,
            }),
            Err(e) => warn!("Error converting port to integer for {service}-{env}: {e}"),
        }
    }

    // Stable, so equal ports keep listing order.
    ports.sort_by_key(|p| p.port);
    Ok(ports)
}
