//! Client configuration.

use crate::ClientError;
use framebridge_core::{DEFAULT_TIMEOUT_MS, WindowProxy};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Everything [`init`](crate::init) needs to open a bridge.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The context hosting the responder.
    pub server_frame: WindowProxy,
    /// Origin the handshake is restricted to.
    pub target_origin: String,
    /// This endpoint's name.
    pub source_name: String,
    /// Name of the responder to talk to.
    pub destination_name: String,
    /// Timeout for [`BridgeClient::request`](crate::BridgeClient::request).
    pub default_timeout: Duration,
}

impl ClientConfig {
    /// Configuration with the default timeout.
    pub fn new(
        server_frame: WindowProxy,
        target_origin: impl Into<String>,
        source_name: impl Into<String>,
        destination_name: impl Into<String>,
    ) -> Self {
        Self {
            server_frame,
            target_origin: target_origin.into(),
            source_name: source_name.into(),
            destination_name: destination_name.into(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Override the timeout used by `request`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// The file-loadable part of a [`ClientConfig`].
///
/// ```toml
/// target_origin = "http://localhost:3000"
/// source_name = "demo-client"
/// destination_name = "demo-server"
/// default_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    /// See [`ClientConfig::target_origin`].
    pub target_origin: String,
    /// See [`ClientConfig::source_name`].
    pub source_name: String,
    /// See [`ClientConfig::destination_name`].
    pub destination_name: String,
    /// Defaults to [`DEFAULT_TIMEOUT_MS`].
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ClientError> {
        Ok(toml::from_str(s)?)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Attach the responder's context.
    pub fn into_config(self, server_frame: WindowProxy) -> ClientConfig {
        ClientConfig::new(
            server_frame,
            self.target_origin,
            self.source_name,
            self.destination_name,
        )
        .with_default_timeout(Duration::from_millis(self.default_timeout_ms))
    }
}
