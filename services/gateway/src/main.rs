//! Roadside Gateway - Main Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadside_gateway::{GatewayConfig, start_server};

#[derive(Parser, Debug)]
#[command(
    name = "roadside-gateway",
    version,
    author = "Roadside Platform Team",
    about = "Realtime and pricing gateway for the roadside-assistance platform"
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "gateway.toml")]
    config: String,

    /// Print available routes and exit
    #[arg(long)]
    routes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roadside_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.routes {
        roadside_gateway::server::print_routes();
        return Ok(());
    }

    let config = match GatewayConfig::from_file(&cli.config) {
        Ok(config) => {
            info!("Loaded configuration from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("Failed to load config from {}: {}", cli.config, e);
            info!("Using default configuration");
            GatewayConfig::default()
        }
    };

    info!(
        "Starting Roadside Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Server will bind to: {}", config.server_address());
    info!("Realtime path: {}", config.websocket.path);
    info!("Features enabled:");
    info!("  CORS: {}", config.cors.enabled);
    info!("  Rate Limiting: {}", config.rate_limiting.enabled);
    info!("  Metrics: {}", config.monitoring.metrics_enabled);
    info!("  Compression: {}", config.server.compression);

    if let Err(e) = start_server(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
