use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_PROMPT: &str = "spanner%t> ";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const CONFIG_FILE_NAME: &str = ".spanner_cli.toml";

/// Contents of `~/.spanner_cli.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub spanner: SpannerSection,
}

/// The `[spanner]` section. Every key is optional; flags and env win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpannerSection {
    pub project: Option<String>,
    pub instance: Option<String>,
    pub database: Option<String>,
    /// `host:port` of the PostgreSQL-wire endpoint.
    pub endpoint: Option<String>,
    /// Path to a JSON key file.
    pub credential: Option<PathBuf>,
    pub prompt: Option<String>,
    pub history: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
}

impl CliConfig {
    /// `~/.spanner_cli.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
    }

    /// Load a config file. A missing file yields the default config.
    pub fn load(path: &Path) -> CliResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg = toml::from_str(&content).map_err(|e| {
                    CliError::Config(format!("cannot parse {}: {}", path.display(), e))
                })?;
                debug!("Loaded config from {}", path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                warn!("Cannot read config file {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }
}

/// Host and port of the wire endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CliError::Config("empty endpoint".to_string()));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CliError::Config(format!("invalid endpoint port: {}", s)))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            Some(_) => Err(CliError::Config(format!("invalid endpoint: {}", s))),
            None => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

/// Connection settings shared by the data and admin clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub application_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            application_name: "spanner-cli".to_string(),
        }
    }
}
