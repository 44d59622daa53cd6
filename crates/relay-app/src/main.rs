//! Price relay - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time price relay
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    relay_ws::init_crypto();

    let args = Args::parse();

    relay_telemetry::init_logging()?;

    info!("Starting price relay v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > RELAY_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RELAY_CONFIG").ok());

    let config = relay_app::AppConfig::load(config_path.as_deref())?;
    info!(
        port = config.server.port,
        upstream = %config.upstream.url,
        feeds = config.feeds.len(),
        "Configuration loaded"
    );

    let app = relay_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
