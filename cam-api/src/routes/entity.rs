//! Entity REST handlers.
//!
//! One set of handlers serves every entity; the `:entity` path segment is
//! resolved against the schema registry on each request.
//!
//! - `GET    /api/:entity`      filtered, paginated list
//! - `POST   /api/:entity`      validated create, with nested to-many children
//! - `GET    /api/:entity/:id`  one record, optional `relations`
//! - `PUT    /api/:entity/:id`  validated update
//! - `DELETE /api/:entity/:id`  delete, returns the removed record

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use cam_core::{
    id_value, new_entity_id, validate_nested_create, validate_write, CallerContext, CamError,
    EntityId, EntityKind, NestedCreate, Operation, Page, Record, WriteMode,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    notify::{dispatch, MutationEvent},
    state::AppState,
};

type RawParams = Result<Query<Vec<(String, String)>>, QueryRejection>;
type JsonBody = Result<Json<Value>, JsonRejection>;

// ============================================================================
// EXTRACTION HELPERS
// ============================================================================

fn params(raw: RawParams) -> ApiResult<Vec<(String, String)>> {
    raw.map(|Query(pairs)| pairs)
        .map_err(|e| ApiError::invalid_input(format!("Invalid query string: {}", e.body_text())))
}

fn body(raw: JsonBody) -> ApiResult<Value> {
    raw.map(|Json(value)| value)
        .map_err(|e| ApiError::invalid_input(format!("Invalid JSON body: {}", e.body_text())))
}

fn parse_id(raw: &str) -> ApiResult<EntityId> {
    Ok(Uuid::parse_str(raw)?)
}

fn announce(state: &AppState, caller: &CallerContext, entity: EntityKind, operation: Operation, id: EntityId) {
    dispatch(
        state.notifier.clone(),
        MutationEvent {
            entity,
            operation,
            id,
            tenant_id: caller.tenant_id,
            actor: caller.user_id,
            occurred_at: chrono::Utc::now(),
        },
    );
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/:entity
pub async fn list_records(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
    Path(route): Path<String>,
    raw: RawParams,
) -> ApiResult<Json<Page<Record>>> {
    let descriptor = state.registry.describe_route(&route)?;
    let query = state.normalizer.normalize(descriptor, &params(raw)?)?;
    tracing::debug!(
        entity = %descriptor.kind,
        filters = query.filters.len(),
        relations = query.relations.len(),
        limit = query.limit,
        offset = query.offset,
        "Normalized list query"
    );

    let scoped = state.scoper.scope(query, &caller, Operation::Read)?;
    let page = state.executor.execute(&scoped).await?;
    Ok(Json(page))
}

/// POST /api/:entity
pub async fn create_record(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
    Path(route): Path<String>,
    raw: JsonBody,
) -> ApiResult<impl IntoResponse> {
    let descriptor = state.registry.describe_route(&route)?;
    let entity = descriptor.kind;
    if !state.scoper.can(&caller, entity, Operation::Create) {
        tracing::warn!(entity = %entity, user_id = %caller.user_id, "Create denied");
        return Err(CamError::forbidden(entity, Operation::Create).into());
    }

    let id = new_entity_id();
    let NestedCreate {
        mut record,
        mut children,
    } = validate_nested_create(&state.registry, descriptor, &body(raw)?, id)?;
    state
        .scoper
        .scope_write(entity, &caller, Operation::Create, &mut record)?;
    for child in &mut children {
        state
            .scoper
            .scope_write(child.entity(), &caller, Operation::Create, &mut child.record)?;
    }

    record.insert("id".to_string(), id_value(id));
    let created = state.storage().insert(entity, record).await?;
    tracing::info!(entity = %entity, id = %id, children = children.len(), "Record created");
    announce(&state, &caller, entity, Operation::Create, id);

    for mut child in children {
        let child_id = new_entity_id();
        let child_entity = child.entity();
        child.record.insert("id".to_string(), id_value(child_id));
        state.storage().insert(child_entity, child.record).await?;
        announce(&state, &caller, child_entity, Operation::Create, child_id);
    }
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/:entity/:id
pub async fn get_record(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
    Path((route, raw_id)): Path<(String, String)>,
    raw: RawParams,
) -> ApiResult<Json<Record>> {
    let descriptor = state.registry.describe_route(&route)?;
    let entity = descriptor.kind;
    let id = parse_id(&raw_id)?;
    let relations = state.normalizer.normalize(descriptor, &params(raw)?)?.relations;

    let scoped = state
        .scoper
        .scope_record(entity, id, relations, &caller, Operation::Read)?;
    state.executor.ensure_accessible(&scoped).await?;

    let record = state
        .executor
        .fetch_one(&scoped)
        .await?
        .ok_or(CamError::NotFound { entity, id })?;
    Ok(Json(record))
}

/// PUT /api/:entity/:id
pub async fn update_record(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
    Path((route, raw_id)): Path<(String, String)>,
    raw: JsonBody,
) -> ApiResult<Json<Record>> {
    let descriptor = state.registry.describe_route(&route)?;
    let entity = descriptor.kind;
    let id = parse_id(&raw_id)?;

    let scoped = state
        .scoper
        .scope_record(entity, id, Default::default(), &caller, Operation::Update)?;
    state.executor.ensure_accessible(&scoped).await?;

    let mut changes = validate_write(descriptor, &body(raw)?, WriteMode::Update)?;
    state
        .scoper
        .scope_write(entity, &caller, Operation::Update, &mut changes)?;
    let updated = state.storage().update(entity, id, changes).await?;

    tracing::info!(entity = %entity, id = %id, "Record updated");
    announce(&state, &caller, entity, Operation::Update, id);
    Ok(Json(updated))
}

/// DELETE /api/:entity/:id
pub async fn delete_record(
    State(state): State<AppState>,
    AuthExtractor(caller): AuthExtractor,
    Path((route, raw_id)): Path<(String, String)>,
) -> ApiResult<Json<Record>> {
    let entity = state.registry.describe_route(&route)?.kind;
    let id = parse_id(&raw_id)?;

    let scoped = state
        .scoper
        .scope_record(entity, id, Default::default(), &caller, Operation::Delete)?;
    state.executor.ensure_accessible(&scoped).await?;
    let deleted = state.storage().delete(entity, id).await?;

    tracing::info!(entity = %entity, id = %id, "Record deleted");
    announce(&state, &caller, entity, Operation::Delete, id);
    Ok(Json(deleted))
}

/// Any method without a handler on an entity route.
pub async fn method_not_allowed(method: Method) -> ApiError {
    CamError::MethodNotAllowed {
        method: method.to_string(),
    }
    .into()
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:entity",
            get(list_records)
                .post(create_record)
                .fallback(method_not_allowed),
        )
        .route(
            "/:entity/:id",
            get(get_record)
                .put(update_record)
                .delete(delete_record)
                .fallback(method_not_allowed),
        )
}
