//! Host page and embedded frame in one process.
//!
//! The host window runs a server exposing `get-server-time`, `add-numbers`
//! and `count`. The frame window connects to its parent and calls them.
//!
//! Run with the built-in setup:
//!   cargo run -p framebridge-demo-counter -- --clicks 3
//!
//! Or from config files:
//!   cargo run -p framebridge-demo-counter -- \
//!     --server-config demos/counter/server.toml --client-config demos/counter/client.toml

mod actions;

use clap::Parser;
use framebridge_client::ClientSettings;
use framebridge_core::{DEFAULT_TIMEOUT_MS, Window};
use framebridge_server::ServerConfig;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "frame-bridge demo: a host page serving its embedded frame")]
struct Args {
    /// Origin of the host window, where the server runs.
    #[arg(long, default_value = "http://localhost:3000")]
    host_origin: String,
    /// Origin of the embedded frame, where the client runs.
    #[arg(long, default_value = "http://localhost:3001")]
    frame_origin: String,
    /// How many times to press the counter button.
    #[arg(long, default_value_t = 3)]
    clicks: u32,
    #[arg(long, env = "FRAMEBRIDGE_SERVER_CONFIG")]
    server_config: Option<PathBuf>,
    #[arg(long, env = "FRAMEBRIDGE_CLIENT_CONFIG")]
    client_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let server_config = match &args.server_config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::new("demo-server", [args.frame_origin.clone()], ["demo-client"]),
    };
    let client_settings = match &args.client_config {
        Some(path) => ClientSettings::load(path)?,
        None => ClientSettings {
            target_origin: args.host_origin.clone(),
            source_name: "demo-client".into(),
            destination_name: "demo-server".into(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        },
    };

    let host = Window::new(args.host_origin);
    let frame = Window::new(args.frame_origin);

    tracing::info!("Server starting on {}", host.origin());
    let server = framebridge_server::init(&host, server_config, actions::actions())?;
    tracing::info!("Server initialized.");

    tracing::info!("Client starting on {}", frame.origin());
    let client = framebridge_client::init(client_settings.into_config(host.reference_from(&frame)))?;
    client.wait_connected(Duration::from_secs(1)).await?;
    tracing::info!("Client connected.");

    tracing::info!("Requesting server time...");
    let time: String = client.request("get-server-time", ()).await?;
    tracing::info!("Server time: {}", time);

    tracing::info!("Requesting to add 5 and 7...");
    let sum: i64 = client.request("add-numbers", json!({"a": 5, "b": 7})).await?;
    tracing::info!("Sum: {}", sum);

    for _ in 0..args.clicks {
        tracing::info!("Requesting count...");
        let count: u64 = client.request("count", ()).await?;
        tracing::info!("client count: {}", count);
    }

    client.destroy();
    server.destroy();
    Ok(())
}
