pub mod api; // REST + WebSocket surface
pub mod config;
pub mod core_state; // Shared state for handlers
pub mod db;
pub mod dispatch; // Nearest-unit selection, assignment, lifecycle, handover
pub mod events; // Live event fan-out
pub mod guidance; // AI first-aid steps
pub mod models;
pub mod routing; // ETA estimators
pub mod seed; // Demo fleet and hospitals

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Errors that stop the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Async runtime failed: {0}")]
    Runtime(std::io::Error),
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}

pub fn run() -> Result<(), StartupError> {
    let config = config::DispatchConfig::from_env();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StartupError::DataDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    {
        let mut conn = db::open_database(&config.db_path).map_err(core_state::CoreError::from)?;
        if config.seed_demo {
            let center = models::GeoPoint::new(config::DEMO_CENTER_LAT, config::DEMO_CENTER_LNG);
            let summary = seed::seed_demo_data(&mut conn, center, &mut rand::thread_rng())
                .map_err(core_state::CoreError::from)?;
            if summary.hospitals > 0 || summary.ambulances > 0 {
                tracing::info!(
                    hospitals = summary.hospitals,
                    ambulances = summary.ambulances,
                    "Demo data seeded"
                );
            }
        }
    }

    // Blocking HTTP clients are built before the runtime exists.
    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::from_config(config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    runtime.block_on(async {
        let mut server = api::start_api_server(core.clone(), bind_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: bind_addr,
                source,
            })?;
        tracing::info!(addr = %server.addr, "Dispatch service listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for shutdown signal: {e}");
        }
        server.shutdown().await;
        Ok::<(), StartupError>(())
    })?;

    drop(runtime);
    drop(core);
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
