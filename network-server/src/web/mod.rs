//! Web layer for the network reconciliation server.
//!
//! Provides HTTP endpoints for running a reconciliation pass and for
//! shortest-path queries, over an explicit graph or the committed network.

mod config;
mod dto;
mod routes;
mod state;

pub use config::{ServerConfig, ServerConfigError};
pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, SharedStore};
