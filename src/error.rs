//! Crate-wide error type.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid remote url `{remote}`: {source}")]
    RemoteUrl {
        remote: String,
        #[source]
        source: url::ParseError,
    },

    #[error("catalog listing of {what} failed: {message}")]
    Catalog { what: String, message: String },

    #[error(
        "default resource `{path}` configured for resource type `{resource_type}` is not one of its instances (found: {available})"
    )]
    InvalidResourceDefault {
        resource_type: String,
        path: String,
        available: String,
    },

    #[error("resource type `{0}` was referenced before resource instances were resolved")]
    InstancesUnresolved(String),

    #[error("invalid schema at {location}: {message}")]
    InvalidSchema { location: String, message: String },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("multiple configuration files found in {}: {files}; please use only one", dir.display())]
    AmbiguousConfig { dir: PathBuf, files: String },

    #[error("workspace `{0}` not found in the Windmill CLI store")]
    WorkspaceNotFound(String),

    #[error("malformed Windmill CLI store entry in {}: {message}", path.display())]
    WorkspaceStore { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Network failures and 5xx responses are worth another attempt; 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http { source, .. } => !source.is_decode() && !source.is_builder(),
            Error::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
