//! HTTP route handlers.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::domain::{LinkKey, NodeId};
use crate::reconcile::{
    PassError, ReconcileConfig, ReconcileError, run_pass, run_route_maintenance,
};
use crate::routing::{RoutingError, network_graph, shortest_path};
use crate::store::{NetworkStore, StoreError};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reconcile", post(reconcile_network))
        .route("/route-systems/:name/maintain", post(maintain_route_system))
        .route("/shortest-path", post(find_shortest_path))
        .route("/network/path", get(network_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Run a reconciliation pass against the store.
async fn reconcile_network(
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let report = with_store(state, |store, config| {
        run_pass(config, store).map_err(AppError::from)
    })
    .await?;

    Ok(Json(report.into()))
}

/// Recompute measures and repair schedules for one route system.
async fn maintain_route_system(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MaintenanceResponse>, AppError> {
    let report = with_store(state, move |store, config| {
        run_route_maintenance(config, store, &name).map_err(|e| match e {
            PassError::Reconcile(ReconcileError::UnknownRouteSystem(_)) => AppError::NotFound {
                message: e.to_string(),
            },
            other => other.into(),
        })
    })
    .await?;

    Ok(Json(report.into()))
}

/// Shortest path over a graph given in the request.
async fn find_shortest_path(
    Json(req): Json<ShortestPathRequest>,
) -> Result<Json<ShortestPathResponse>, AppError> {
    let (cost, path) = shortest_path(&req.graph, &req.start, &req.end)?;
    Ok(Json(ShortestPathResponse { cost, path }))
}

/// Shortest path between two nodes of the committed network.
async fn network_path(
    State(state): State<AppState>,
    Query(query): Query<NetworkPathQuery>,
) -> Result<Json<NetworkPathResponse>, AppError> {
    let links = with_store(state, |store, _| store.read_links().map_err(AppError::from)).await?;
    let graph = network_graph(&links);

    // Name each step by the link the graph costed it with.
    let mut keys: HashMap<(NodeId, NodeId), LinkKey> = HashMap::new();
    for link in &links {
        if let Some(key) = link.key()
            && graph.get(&key.from).and_then(|e| e.get(&key.to)) == Some(&link.length)
        {
            keys.entry((key.from, key.to)).or_insert(key);
        }
    }

    let (from, to) = (NodeId(query.from), NodeId(query.to));
    let (cost, nodes) = shortest_path(&graph, &from, &to)?;

    Ok(Json(NetworkPathResponse::from_path(cost, nodes, &keys)))
}

/// Run `f` against the locked store on the blocking thread pool.
async fn with_store<T, F>(state: AppState, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&mut (dyn NetworkStore + Send), &ReconcileConfig) -> Result<T, AppError>
        + Send
        + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut store = state.store.lock().map_err(|_| AppError::Internal {
            message: "network store lock poisoned".to_string(),
        })?;
        f(&mut *store, &state.config)
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("background task failed: {e}"),
    })?
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Unprocessable { message: String, details: Vec<String> },
    Internal { message: String },
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl From<PassError> for AppError {
    fn from(e: PassError) -> Self {
        match e {
            PassError::Store(e) => e.into(),
            PassError::Reconcile(e) => {
                let (message, details) = match &e {
                    ReconcileError::Consistency(conflicts) => (
                        format!("{} consistency conflict(s)", conflicts.len()),
                        conflicts.iter().map(|c| c.to_string()).collect(),
                    ),
                    ReconcileError::InvalidLinks(problems) => (
                        format!("{} link(s) failed validation", problems.len()),
                        problems.iter().map(|p| p.to_string()).collect(),
                    ),
                    other => (other.to_string(), Vec::new()),
                };
                AppError::Unprocessable { message, details }
            }
        }
    }
}

impl From<RoutingError> for AppError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::NoPath => AppError::NotFound {
                message: e.to_string(),
            },
            RoutingError::InvalidCost { .. } => AppError::BadRequest {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, details) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message, Vec::new()),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message, Vec::new()),
            AppError::Unprocessable { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, details)
            }
            AppError::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, Vec::new())
            }
        };

        if status.is_server_error() {
            tracing::error!(%status, "{error}");
        } else {
            tracing::warn!(%status, problems = details.len(), "{error}");
        }

        let body = Json(ErrorResponse { error, details });
        (status, body).into_response()
    }
}
