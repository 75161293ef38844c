use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, CliResult};

const DEFAULT_USER: &str = "spanner";

/// Fields of a JSON key file that the client looks at. Everything else is
/// passed through untouched in `Credentials::raw`.
#[derive(Debug, Deserialize)]
struct KeyFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: Option<String>,
}

/// JSON key material forwarded to the endpoint on connect.
#[derive(Clone)]
pub struct Credentials {
    raw: String,
    kind: Option<String>,
    client_email: Option<String>,
}

impl Credentials {
    /// Parse key material. It must be a JSON object.
    pub fn from_json(json: &str) -> CliResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| CliError::Credential(format!("invalid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(CliError::Credential(
                "key material must be a JSON object".to_string(),
            ));
        }
        let key: KeyFile = serde_json::from_value(value)
            .map_err(|e| CliError::Credential(format!("unexpected key layout: {}", e)))?;
        debug!(kind = ?key.kind, "Loaded credentials");
        Ok(Self {
            raw: json.trim().to_string(),
            kind: key.kind,
            client_email: key.client_email,
        })
    }

    /// Read key material from a file.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CliError::Credential(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Wire-level user name.
    pub fn user(&self) -> &str {
        self.client_email.as_deref().unwrap_or(DEFAULT_USER)
    }

    /// Wire-level password: the key material itself.
    pub fn secret(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

// Key material never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}
