//! REST API Routes Module
//!
//! Assembles the router: unauthenticated health check, then the
//! authenticated `/api` surface behind the JWT middleware, wrapped in
//! request tracing and CORS.

pub mod access;
pub mod entity;
pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::AuthConfig,
    config::ApiConfig,
    middleware::{auth_middleware, AuthMiddlewareState},
    state::AppState,
};

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete API router with authentication, tracing and CORS.
pub fn create_api_router(state: AppState, api_config: &ApiConfig, auth_config: AuthConfig) -> Router {
    let auth_state = AuthMiddlewareState::new(auth_config);

    let api_routes = Router::new()
        .merge(access::create_router())
        .merge(entity::create_router())
        .layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(health::create_router())
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(api_config)),
        )
        .with_state(state)
}
