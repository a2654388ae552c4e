use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skygate::config::GatewayConfig;
use skygate::http::{build_app, shutdown_signal, HttpServer};
use skygate::ratelimit::{RateLimiter, Sweeper};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Rate-limited gateway for the travel booking public API.
#[derive(Parser, Debug)]
#[command(name = "skygate", version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    match args.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!("Starting Skygate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.http_addr = bind;
    }
    info!(
        http_addr = %config.server.http_addr,
        limit = config.rate_limiting.limit,
        window_ms = config.rate_limiting.window_ms,
        path_prefix = %config.rate_limiting.path_prefix,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(RateLimiter::new());
    let sweeper = Sweeper::spawn(
        Arc::clone(&rate_limiter),
        config.rate_limiting.sweep_interval(),
    )?;
    info!(
        interval_secs = config.rate_limiting.sweep_interval_secs,
        "Rate limiter initialized"
    );

    let app = build_app(&config, rate_limiter)?;
    let server = HttpServer::new(config.server.http_addr, app);

    // Run until Ctrl+C or SIGTERM
    server.serve_with_shutdown(shutdown_signal()).await?;

    sweeper.shutdown().await;
    info!("Skygate stopped");
    Ok(())
}
