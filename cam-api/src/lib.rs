//! CAM API - REST layer for the case management backend
//!
//! Serves filtered, paginated and authorization-scoped access to
//! allegations, victims, investigators and perpetrators over Axum.
//! Every request runs normalize, scope, execute in that order.

pub mod auth;
pub mod config;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, validate_jwt_token, AuthConfig, Claims, FixedClock,
    JwtClock, JwtSecret, SystemClock,
};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use notify::{dispatch, LogNotifier, MutationEvent, Notifier, NotifyError, WebhookNotifier};
pub use routes::create_api_router;
pub use state::AppState;
