// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Server - Main entry point

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wireless_copy_core::{AppError, SettingsLoader};

#[derive(Parser)]
#[command(name = "wireless-copy-server")]
#[command(version)]
#[command(about = "Receive files mirrored by wireless-copy-client")]
struct Cli {
    /// Directory uploaded files are stored under
    root_dir: PathBuf,

    /// Shared secret clients must present (overrides WIRELESS_FILE_COPY_KEY)
    #[arg(long)]
    authentication_key: Option<String>,

    /// Port to listen on (overrides WIRELESS_FILE_COPY_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind; empty binds every interface
    #[arg(long)]
    address: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "wireless_copy_server={0},wireless_copy_core={0}",
                default_level
            ))
        }))
        .init();

    tracing::info!("Starting Wireless File Copy server v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = SettingsLoader::load()?.server_settings()?;
    settings.root_dir = cli.root_dir;
    if let Some(key) = cli.authentication_key {
        settings.authentication_key = key;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(address) = cli.address {
        settings.server_address = address;
    }
    settings.validate()?;

    wireless_copy_server::start_server(&settings).await
}
