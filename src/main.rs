use std::env;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use groupmarket::db::{self, Gateway};
use groupmarket::routes;
use groupmarket::{AppState, Config};

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        println!("Usage: groupmarket [OPTIONS]");
        println!("Options:");
        println!("  -config <path>  Path to configuration file (default: ./etc/groupmarket.toml)");
        println!("  -setup          Create and seed the groups table, then exit");
        println!("  -help, --help   Print this help message");
        return Ok(());
    }
    let setup_only = args.iter().any(|arg| arg == "-setup");

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/groupmarket.toml".to_string());

    // .env is optional; real environment variables win over it
    dotenv::dotenv().ok();

    // Read the file first (before logging init); it carries the log level
    let (mut config, load_error) = match Config::from_file(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Some(e) = load_error {
        tracing::warn!("Could not load config file: {}, using defaults", e);
    }
    // Environment overrides are applied once the subscriber can report them
    config.apply_env(|key| env::var(key).ok());

    info!("Starting groupmarket server...");
    info!("Loading configuration from: {}", config_path);

    // The schema must be verified before any traffic is served
    let gateway = Gateway::connect(&config.database).await.map_err(|e| {
        tracing::error!("Database connection failed: {}", e);
        anyhow::anyhow!("Database connection failed: {}", e)
    })?;

    let report = db::bootstrap(&gateway).await.map_err(|e| {
        tracing::error!("Database setup failed: {}", e);
        anyhow::anyhow!("Database setup failed: {}", e)
    })?;
    info!("Database setup completed (seeded: {})", report.seeded);

    if setup_only {
        gateway.close().await?;
        return Ok(());
    }

    let state = AppState::new(gateway.clone(), config.clone());
    let app = routes::create_router(state);

    let addr: SocketAddr = config.addr.parse().map_err(|e| {
        tracing::error!("Invalid address '{}': {}", config.addr, e);
        anyhow::anyhow!("Invalid address '{}': {}", config.addr, e)
    })?;

    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.close().await?;
    info!("Connection pool closed");

    Ok(())
}
