use thiserror::Error;

/// Every fatal condition a relaunch can hit.
#[derive(Debug, Error)]
pub enum RelaunchError {
    #[error("required entry '{key}' not found in service secrets")]
    ConfigMissing { key: String },

    #[error("invalid {key} value '{value}', must be one of {allowed:?}")]
    ConfigInvalidEnum {
        key: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("persistence '{value}' has no restart policy yet")]
    UnsupportedPersistence { value: String },

    #[error("value of '{key}' contains whitespace, which cannot be passed as a single -e flag")]
    WhitespaceInValue { key: String },

    #[error("unresolved env variables remain in: {input}")]
    UnresolvedReference { input: String },

    #[error("{name} not found")]
    BackendNotFound { name: String },

    #[error("failed to read {name}: {message}")]
    BackendTransport { name: String, message: String },

    #[error("failed to parse secret JSON for {name}")]
    DocumentDecode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{command}` failed ({status})\n{output}")]
    RuntimeFailure {
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to invoke `{command}`")]
    RuntimeSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine host address: {message}")]
    HostProbe { message: String },

    #[error("{message}")]
    Usage { message: String },

    #[error("failed to write output")]
    Output(#[from] std::io::Error),
}

impl RelaunchError {
    pub fn missing(key: &str) -> Self {
        Self::ConfigMissing {
            key: key.to_string(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

pub type Result<T, E = RelaunchError> = std::result::Result<T, E>;
