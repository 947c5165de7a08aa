//! Server settings read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::reconcile::{ConfigError, ReconcileConfig};

/// Error building a [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    /// `NETWORK_STORE_DIR` is not set
    #[error("NETWORK_STORE_DIR must name the network store directory")]
    MissingStoreDir,

    /// `NETWORK_BIND_ADDR` is not a socket address
    #[error("invalid NETWORK_BIND_ADDR {value:?}: {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },

    /// The file named by `NETWORK_CONFIG` could not be loaded
    #[error("failed to load {}: {source}", path.display())]
    Reconcile { path: PathBuf, source: ConfigError },
}

/// Everything the binary needs to start serving.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub reconcile: ReconcileConfig,
}

impl ServerConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:3000";

    /// Read `NETWORK_STORE_DIR`, `NETWORK_BIND_ADDR` and `NETWORK_CONFIG`.
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ServerConfigError> {
        let store_dir = var("NETWORK_STORE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or(ServerConfigError::MissingStoreDir)?;

        let addr = var("NETWORK_BIND_ADDR").unwrap_or_else(|| Self::DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .map_err(|source| ServerConfigError::BindAddr { value: addr, source })?;

        let reconcile = match var("NETWORK_CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                ReconcileConfig::from_file(&path)
                    .map_err(|source| ServerConfigError::Reconcile { path, source })?
            }
            None => ReconcileConfig::default(),
        };

        Ok(Self {
            store_dir,
            bind_addr,
            reconcile,
        })
    }
}
