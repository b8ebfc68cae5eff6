//! Configuration manager for Rally.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT: u64 = 10;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening port.
    pub port: Option<u16>,
    /// Seconds before a request is aborted.
    pub request_timeout: Option<u64>,
    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to ID token verification.
    #[serde(skip_serializing)]
    pub identity: Option<Identity>,
    /// Related to media upload signing.
    #[serde(skip_serializing)]
    pub media: Option<Media>,
    /// Related to follower counters repair.
    pub reconcile: Option<Reconcile>,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Identity provider configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Identity provider project, used as audience.
    pub project_id: String,
    /// Expected `iss` claim.
    /// Default is `https://securetoken.google.com/<project_id>`.
    pub issuer: Option<String>,
    /// Signing algorithm. Default is `RS256`.
    pub algorithm: Option<String>,
    /// Public keys allowed to sign tokens.
    #[serde(default)]
    pub keys: Vec<IdentityKey>,
}

/// Public key of the identity provider.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct IdentityKey {
    pub kid: Option<String>,
    pub public_key_pem: String,
}

/// Media upload configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Media {
    /// `cloudinary://<key>:<secret>@<cloud>`.
    pub cloudinary_url: Option<String>,
}

/// Counter reconciliation job.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Reconcile {
    /// Seconds between two passes.
    pub interval_secs: u64,
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

    /// Port to listen on.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Request deadline in seconds.
    pub fn request_timeout(&self) -> u64 {
        self.request_timeout
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Cloudinary URL, environment first.
    pub fn cloudinary_url(&self) -> Option<String> {
        std::env::var("CLOUDINARY_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.media.as_ref().and_then(|m| m.cloudinary_url.clone()))
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration = match serde_yaml::from_reader(file) {
                    Ok(config) => config,
                    Err(err) => {
                        return Arc::new(self.error(err));
                    },
                };

                // set app version.
                config.version = VERSION.to_owned();
                config.path = file_path.to_path_buf();

                Arc::new(config)
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
