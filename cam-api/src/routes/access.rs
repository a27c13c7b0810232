//! Caller permissions.
//!
//! `GET /api/access` tells a client which operations the caller holds on
//! each entity so it can hide affordances it would only see rejected.

use axum::{extract::State, routing::get, Json, Router};
use cam_core::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{middleware::AuthExtractor, state::AppState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResponse {
    pub roles: BTreeSet<String>,
    /// Operations per entity name. Every entity appears, possibly empty.
    pub permissions: BTreeMap<String, BTreeSet<Operation>>,
}

/// GET /api/access
pub async fn get_access(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
) -> Json<AccessResponse> {
    let permissions = state
        .scoper
        .permissions(&caller)
        .into_iter()
        .map(|(entity, ops)| (entity.name().to_string(), ops))
        .collect();

    Json(AccessResponse {
        roles: caller.roles,
        permissions,
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route(
        "/access",
        get(get_access).fallback(super::entity::method_not_allowed),
    )
}
