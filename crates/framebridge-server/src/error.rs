use framebridge_core::NodeIdError;

/// Errors constructing a [`BridgeServer`](crate::BridgeServer).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured name is not a valid node id.
    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] NodeIdError),
    /// Config is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid server config: {0}")]
    Config(#[from] toml::de::Error),
    /// Config file could not be read.
    #[error("failed to read server config: {0}")]
    Io(#[from] std::io::Error),
}
