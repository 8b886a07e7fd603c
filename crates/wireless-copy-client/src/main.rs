// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Main entry point

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wireless_copy_client::{
    output::{summary_line, ConsoleObserver, ConsoleProgress},
    ConsolePrompt, SessionOrchestrator,
};
use wireless_copy_core::{
    AppError, ConflictResolver, ExtensionFilter, OverwritePolicy, SettingsLoader,
};

#[derive(Parser)]
#[command(name = "wireless-copy-client")]
#[command(version)]
#[command(about = "Mirror a local directory to a wireless-copy-server")]
struct Cli {
    /// Directory to mirror
    source_dir: PathBuf,

    /// Server base URL, e.g. http://192.168.1.20:14937
    endpoint: String,

    /// Comma-separated suffixes to send, e.g. .jpg,.png
    #[arg(long)]
    allowed_extensions: Option<String>,

    /// What to do when a file already exists: 0-3 or prompt, skip, always, if-changed
    #[arg(long)]
    overwrite: Option<OverwritePolicy>,

    /// Shared secret (overrides WIRELESS_FILE_COPY_KEY)
    #[arg(long)]
    authentication_key: Option<String>,

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
                "wireless_copy_client={0},wireless_copy_core={0}",
                default_level
            ))
        }))
        .init();

    let loader = SettingsLoader::load()?;
    if let Some(source) = loader.source() {
        tracing::debug!("Loaded settings from {}", source.display());
    }

    let mut settings = loader.client_settings()?;
    settings.source_dir = cli.source_dir;
    settings.endpoint = cli.endpoint;
    if let Some(list) = cli.allowed_extensions {
        settings.allowed_extensions = ExtensionFilter::parse(&list);
    }
    if let Some(policy) = cli.overwrite {
        settings.overwrite = policy;
    }
    if let Some(key) = cli.authentication_key {
        settings.authentication_key = key;
    }
    settings.validate()?;

    tracing::info!(
        "Mirroring {} to {} ({} policy)",
        settings.source_dir.display(),
        settings.endpoint,
        settings.overwrite
    );

    let resolver = ConflictResolver::new(settings.overwrite, Box::new(ConsolePrompt::new()));
    let report = SessionOrchestrator::new(settings, resolver)
        .with_observer(Box::new(ConsoleObserver::new()))
        .with_progress(Arc::new(ConsoleProgress::new()))
        .run()
        .await?;

    println!("{}", summary_line(&report));
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
