//! Server configuration.

use crate::ServerError;
use serde::Deserialize;
use std::path::Path;

/// Who the responder is and whom it accepts.
///
/// ```toml
/// source_name = "demo-server"
/// allowed_origins = ["http://localhost:3001"]
/// allowed_clients = ["demo-client"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// This endpoint's name.
    pub source_name: String,
    /// Origins a handshake may come from.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Client names a handshake may declare.
    #[serde(default)]
    pub allowed_clients: Vec<String>,
}

impl ServerConfig {
    /// Configuration from its parts.
    pub fn new<O, C>(source_name: impl Into<String>, allowed_origins: O, allowed_clients: C) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            source_name: source_name.into(),
            allowed_origins: allowed_origins.into_iter().map(Into::into).collect(),
            allowed_clients: allowed_clients.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
