/// Banner and health check endpoints
///
/// # Endpoints
///
/// ```text
/// GET /         -> "Parcel Server is running"
/// GET /health   -> {"status": "healthy", "version": "0.1.0", "database": "connected",
///                   "activeConnections": 0, "idleConnections": 2}
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use parcelhub_shared::db::pool::{get_pool_stats, health_check as ping_database};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    pub active_connections: u32,
    pub idle_connections: u32,
}

pub async fn banner() -> &'static str {
    "Parcel Server is running"
}

/// Health check handler
///
/// Returns service health status including database connectivity. A database
/// that does not answer within the collaborator timeout counts as
/// disconnected; the endpoint itself still answers 200.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let limit = state.config.collaborator_timeout();
    let database_status = match tokio::time::timeout(limit, ping_database(&state.db)).await {
        Ok(Ok(())) => "connected",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
        Err(_) => "disconnected",
    };
    let pool = get_pool_stats(&state.db);

    Ok(Json(HealthResponse {
        status: if database_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database_status.to_string(),
        active_connections: pool.active_connections,
        idle_connections: pool.idle_connections,
    }))
}
