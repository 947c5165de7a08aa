use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use network_server::store::JsonStore;
use network_server::web::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        store = %config.store_dir.display(),
        pool = %format!("{}-{}", config.reconcile.min_node_id, config.reconcile.max_node_id),
        route_systems = config.reconcile.route_systems.len(),
        "loaded configuration"
    );

    let store = JsonStore::new(&config.store_dir);
    let state = AppState::new(store, config.reconcile);
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, "failed to bind: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("network server listening on http://{}", config.bind_addr);
    info!("  GET  /health          - Health check");
    info!("  POST /reconcile       - Run a reconciliation pass");
    info!("  POST /route-systems/:name/maintain - Recompute measures and times");
    info!("  POST /shortest-path   - Shortest path over a supplied graph");
    info!("  GET  /network/path    - Shortest path over the network");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
