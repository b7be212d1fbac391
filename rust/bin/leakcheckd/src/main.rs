//! `leakcheckd`: the leak-test certificate server.
//!
//! Usage:
//!   leakcheckd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/leakcheck/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use config::ServerConfig;
use leakcheck_core::Module;

/// Leak-test certificate server.
#[derive(Parser, Debug)]
#[command(name = "leakcheckd", about = "Leak-test certificate server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address.
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Verify configuration is valid.
    bootstrap::verify_config(&server_config)?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = leakcheck_core::ServiceConfig {
        data_dir: Some(data_dir),
        busy_timeout: server_config.busy_timeout(),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    let sql: Arc<dyn leakcheck_sql::SQLStore> = Arc::new(
        leakcheck_sql::SqliteStore::open_with_timeout(
            &core_config.resolve_sqlite_path(),
            core_config.busy_timeout,
        )
        .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let blob: Arc<dyn leakcheck_blob::BlobStore> = Arc::new(
        leakcheck_blob::FileStore::open(&core_config.resolve_blob_dir())
            .map_err(|e| anyhow::anyhow!("failed to open blob store: {}", e))?,
    );

    let options = server_config.service_options()?;
    let leaktest_module = leaktest::LeakTestModule::new(sql, blob, options)?;
    info!(
        serial_policy = %leaktest_module.service().serial_policy(),
        "{} module initialized",
        leaktest_module.name()
    );

    let app = routes::build_router(&leaktest_module);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("leakcheckd listening on {}", core_config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("leakcheckd stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
