//! Connection configuration

use crate::{PhoenixError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const ENV_SCHEME: &str = "TRINO_SCHEME";
pub const ENV_HOST: &str = "TRINO_HOST";
pub const ENV_PORT: &str = "TRINO_PORT";
pub const ENV_USER: &str = "TRINO_USER";
pub const ENV_PASSWORD: &str = "TRINO_PASSWORD";
pub const ENV_CATALOG: &str = "TRINO_CATALOG";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USER: &str = "admin";
pub const DEFAULT_CATALOG: &str = "iceberg";
pub const DEFAULT_SOURCE: &str = "phoenix-init";

/// Transport scheme of the coordinator endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

impl std::str::FromStr for Scheme {
    type Err = PhoenixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(PhoenixError::Config(format!("unknown scheme '{other}'"))),
        }
    }
}

/// Everything needed to open a session against the catalog service.
///
/// Built once per run. Missing values fall back to the documented defaults:
/// `http://admin@localhost:8080`, catalog `iceberg`, no credential.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Password for basic authentication. Empty means no authentication.
    pub credential: String,
    pub catalog: String,
    /// Client name reported to the service
    pub source: String,
    /// Permit sending a credential over plain http
    pub allow_insecure_credential: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Http,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            credential: String::new(),
            catalog: DEFAULT_CATALOG.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            allow_insecure_credential: false,
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("credential", &redact(&self.credential))
            .field("catalog", &self.catalog)
            .field("source", &self.source)
            .finish()
    }
}

fn redact(credential: &str) -> &'static str {
    if credential.is_empty() {
        ""
    } else {
        "***"
    }
}

impl ConnectionConfig {
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PhoenixError::Config(e.to_string()))
    }

    /// Overlay `TRINO_*` variables obtained through `lookup` on top of `self`.
    ///
    /// Empty values count as unset.
    pub fn resolve_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(scheme) = get(ENV_SCHEME) {
            self.scheme = scheme.parse()?;
        }
        if let Some(host) = get(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.port = port
                .parse()
                .map_err(|_| PhoenixError::Config(format!("{ENV_PORT} is not a port: {port}")))?;
        }
        if let Some(user) = get(ENV_USER) {
            self.user = user;
        }
        if let Some(credential) = get(ENV_PASSWORD) {
            self.credential = credential;
        }
        if let Some(catalog) = get(ENV_CATALOG) {
            self.catalog = catalog;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("host", &self.host),
            ("user", &self.user),
            ("catalog", &self.catalog),
            ("source", &self.source),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PhoenixError::Config(format!("{field} must not be empty")));
            }
        }
        if self.port == 0 {
            return Err(PhoenixError::Config("port must not be 0".to_string()));
        }
        if self.has_credential() && self.scheme == Scheme::Http && !self.allow_insecure_credential {
            return Err(PhoenixError::Config(
                "refusing to send a credential over http; use https or allow it explicitly"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.is_empty()
    }

    /// Base URL of the coordinator, e.g. `http://localhost:8080`
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Connection string with the credential redacted, safe to log
    pub fn dsn(&self) -> String {
        let credential = if self.has_credential() { ":***" } else { "" };
        format!(
            "{}://{}{}@{}:{}/{}",
            self.scheme, self.user, credential, self.host, self.port, self.catalog
        )
    }
}
