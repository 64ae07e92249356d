//! Gateway configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `RECORDGATE_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "RECORDGATE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address for the API server
    pub listen_addr: String,

    /// Admin HTTP listen address (health checks + metrics)
    pub admin_addr: String,

    /// Which record collection backend to query
    pub document_backend: DocumentBackend,

    pub mongo_uri: String,
    pub mongo_database: String,
    pub mongo_collection: String,

    /// Upper bound on establishing the document store connection
    pub connect_timeout_secs: u64,

    /// Upper bound on a single record query
    pub query_timeout_secs: u64,

    /// JSON records loaded into the in-memory collection at startup
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentBackend {
    Memory,
    Mongodb,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            admin_addr: "0.0.0.0:9090".to_string(),
            document_backend: DocumentBackend::Memory,
            mongo_uri: "mongodb://127.0.0.1:27017".to_string(),
            mongo_database: "recordgate".to_string(),
            mongo_collection: "records".to_string(),
            connect_timeout_secs: 10,
            query_timeout_secs: 5,
            seed_file: None,
        }
    }
}

impl GatewayConfig {
    /// Load defaults, then `path` (if given), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder =
            builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = builder
            .build()
            .context("Read gateway configuration")?
            .try_deserialize()
            .context("Invalid gateway configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn listen_socket(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", self.listen_addr))
    }

    pub fn admin_socket(&self) -> Result<SocketAddr> {
        self.admin_addr
            .parse()
            .with_context(|| format!("Invalid admin address {:?}", self.admin_addr))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.listen_socket()?;
        self.admin_socket()?;

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs must be greater than 0");
        }
        if self.query_timeout_secs == 0 {
            anyhow::bail!("query_timeout_secs must be greater than 0");
        }

        if self.document_backend == DocumentBackend::Mongodb && !cfg!(feature = "mongodb-storage") {
            anyhow::bail!("document_backend = \"mongodb\" requires the mongodb-storage feature");
        }
        if self.document_backend == DocumentBackend::Mongodb && self.seed_file.is_some() {
            anyhow::bail!("seed_file only applies to the in-memory document backend");
        }
        Ok(())
    }
}
