//! Configuration manager for enlist.

use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PREFIX: &str = "/api/users";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the store connection string.
pub const DATABASE_URL: &str = "DATABASE_URL";

/// Errors that may occur during the configuration loading process.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing `{0}` environment variable")]
    MissingEnv(&'static str),
    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_yaml::Error),
    #[error("route prefix `{0}` is invalid")]
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening address.
    pub address: IpAddr,
    /// Listening port.
    pub port: u16,
    /// Path under which the users routes are mounted.
    pub prefix: String,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// File the configuration was loaded from, if any.
    #[serde(skip)]
    source: Option<PathBuf>,
    /// Related to the HTTP server.
    pub http: Http,
    /// Related to PostgreSQL pool configuration.
    pub database: Database,
    /// What error details clients may see.
    pub errors: ErrorPolicy,
    /// Related to logs, traces and metrics.
    pub telemetry: Telemetry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            prefix: DEFAULT_PREFIX.to_owned(),
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            source: None,
            http: Http::default(),
            database: Database::default(),
            errors: ErrorPolicy::default(),
            telemetry: Telemetry::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    /// Seconds before a request is answered with `408`.
    pub timeout_secs: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// PostgreSQL configuration.
///
/// The connection string itself is never read from the file, only from
/// the `DATABASE_URL` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// Maximum pool connections.
    pub pool_size: u32,
    /// How many times the initial connection is tried.
    pub connect_attempts: u32,
    /// Pause between two connection attempts.
    pub retry_delay_secs: u64,
    /// Maximum wait for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            pool_size: 10,
            connect_attempts: 5,
            retry_delay_secs: 2,
            acquire_timeout_secs: 5,
        }
    }
}

impl Database {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Per error kind disclosure of internal details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    /// Return raw store errors to clients instead of a generic message.
    pub expose_store_details: bool,
    /// Return the list of invalid fields on `400`.
    pub expose_validation_details: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            expose_store_details: false,
            expose_validation_details: true,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Expose Prometheus metrics on `/metrics`.
    pub metrics: bool,
    /// OTLP gRPC endpoint receiving logs and traces.
    pub otlp_endpoint: Option<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            metrics: true,
            otlp_endpoint: None,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// File the configuration was read from; `None` when defaults are used.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Socket address the server listens on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file is not an error: defaults are used instead and
    /// [`Configuration::source`] stays `None`.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(&file_path) {
            Ok(file) => {
                let mut config: Configuration = serde_yaml::from_reader(file)?;
                config.source = Some(file_path);
                Ok(Arc::new(config.normalize()?))
            },
            Err(_) => Ok(Arc::new(self.normalize()?)),
        }
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_yaml::from_str(yaml)?;
        config.normalize()
    }

    fn normalize(mut self) -> Result<Self, ConfigError> {
        self.version = VERSION.to_owned();
        self.prefix = normalize_prefix(&self.prefix)?;
        Ok(self)
    }
}

/// Read the store connection string.
pub fn database_url() -> Result<String, ConfigError> {
    std::env::var(DATABASE_URL)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(DATABASE_URL))
}

/// Ensure the prefix starts with a `/` and does not end with one.
fn normalize_prefix(prefix: &str) -> Result<String, ConfigError> {
    let trimmed = prefix.trim().trim_matches('/');

    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(ConfigError::Prefix(prefix.to_owned()));
    }

    Ok(format!("/{trimmed}"))
}
