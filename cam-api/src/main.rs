//! CAM API Server Entry Point
//!
//! Bootstraps configuration, builds the in-memory store and starts the
//! Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use cam_api::telemetry::{init_tracing, TelemetryConfig};
use cam_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig};
use cam_storage::InMemoryStorage;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();
    auth_config.validate_for_production()?;

    let storage = Arc::new(InMemoryStorage::new());
    let state = AppState::from_config(storage, &api_config)?;

    let app: Router = create_api_router(state, &api_config, auth_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, max_page_size = api_config.max_page_size, "Starting CAM API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("CAM_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("CAM_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str.parse::<u16>().map_err(|_| {
        ApiError::invalid_input(format!("Invalid port value: {}", port_str))
    })?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
