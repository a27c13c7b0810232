//! List view controller tests against an in-process API.
//!
//! [`LocalApi`] answers the [`EntityApi`] calls with the same normalize,
//! scope and execute pipeline the server runs, over in-memory storage.

use async_trait::async_trait;
use cam_api::routes::access::AccessResponse;
use cam_api::ApiError;
use cam_client::api_client::{ApiClientError, EntityApi, Permissions};
use cam_client::columns::ColumnKind;
use cam_client::keys::Action;
use cam_client::list_view::{fetch_page, page_count, ListView, ListViewController, LoadState};
use cam_client::state::{App, FormTarget, InputMode};
use cam_core::{
    id_value, new_entity_id, normalize, validate_write, CallerContext, CamError, EntityId,
    EntityKind, ListQuery, Operation, Page, Record, SchemaRegistry, Scoper, WriteMode,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use cam_storage::{InMemoryStorage, PaginatedExecutor, Storage};
use cam_test_utils::fixtures::{self, TENANT};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct LocalApi {
    registry: SchemaRegistry,
    storage: Arc<InMemoryStorage>,
    executor: PaginatedExecutor,
    scoper: Scoper,
    caller: CallerContext,
    fail_deletes: AtomicBool,
}

impl LocalApi {
    fn new(caller: CallerContext) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        Self {
            registry: SchemaRegistry::new(),
            executor: PaginatedExecutor::new(storage.clone()),
            storage,
            scoper: fixtures::scoper(fixtures::clerk_policy()),
            caller,
            fail_deletes: AtomicBool::new(false),
        }
    }

    async fn seeded(count: u32) -> Arc<Self> {
        let api = Self::new(fixtures::admin(TENANT));
        fixtures::seed_case_files(api.storage.as_ref(), TENANT, count)
            .await
            .unwrap();
        Arc::new(api)
    }
}

fn client_error(err: CamError) -> ApiClientError {
    let api_error = ApiError::from(err);
    ApiClientError::Api {
        status: api_error.status_code().as_u16(),
        code: format!("{:?}", api_error.code),
        message: api_error.message,
    }
}

#[async_trait]
impl EntityApi for LocalApi {
    async fn list(&self, entity: EntityKind, query: &ListQuery) -> Result<Page<Record>, ApiClientError> {
        let descriptor = normalize(self.registry.get(entity), &query.to_params()).map_err(client_error)?;
        let scoped = self
            .scoper
            .scope(descriptor, &self.caller, Operation::Read)
            .map_err(client_error)?;
        self.executor.execute(&scoped).await.map_err(client_error)
    }

    async fn get(&self, entity: EntityKind, id: EntityId, _relations: &[String]) -> Result<Record, ApiClientError> {
        self.storage
            .get(entity, id)
            .await
            .map_err(client_error)?
            .ok_or_else(|| client_error(CamError::NotFound { entity, id }))
    }

    async fn create(&self, entity: EntityKind, body: &Value) -> Result<Record, ApiClientError> {
        let mut record =
            validate_write(self.registry.get(entity), body, WriteMode::Create).map_err(client_error)?;
        self.scoper
            .scope_write(entity, &self.caller, Operation::Create, &mut record)
            .map_err(client_error)?;
        record.insert("id".to_string(), id_value(new_entity_id()));
        self.storage.insert(entity, record).await.map_err(client_error)
    }

    async fn update(&self, entity: EntityKind, id: EntityId, body: &Value) -> Result<Record, ApiClientError> {
        let mut changes =
            validate_write(self.registry.get(entity), body, WriteMode::Update).map_err(client_error)?;
        self.scoper
            .scope_write(entity, &self.caller, Operation::Update, &mut changes)
            .map_err(client_error)?;
        self.storage.update(entity, id, changes).await.map_err(client_error)
    }

    async fn delete(&self, entity: EntityKind, id: EntityId) -> Result<Record, ApiClientError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(client_error(CamError::forbidden(entity, Operation::Delete)));
        }
        self.storage.delete(entity, id).await.map_err(client_error)
    }

    async fn access(&self) -> Result<Permissions, ApiClientError> {
        let permissions = self
            .scoper
            .permissions(&self.caller)
            .into_iter()
            .map(|(entity, ops)| (entity.name().to_string(), ops))
            .collect();
        Ok(Permissions(AccessResponse {
            roles: self.caller.roles.iter().cloned().collect(),
            permissions,
        }))
    }
}

async fn controller(api: Arc<LocalApi>, page_size: u32) -> ListViewController<LocalApi> {
    let permissions = api.access().await.unwrap();
    let view = ListView::new(EntityKind::Allegation, page_size).with_layout(&api.registry, &permissions);
    ListViewController::new(api, view)
}

#[tokio::test]
async fn test_first_page_loads() {
    let api = LocalApi::seeded(25).await;
    let mut list = controller(api, 20).await;

    assert!(list.refresh().await);
    let view = list.view();
    assert_eq!(view.state, LoadState::Loaded);
    assert_eq!(view.rows.len(), 20);
    assert_eq!(view.total_count, 25);
    assert_eq!(view.page_count(), 2);
}

#[tokio::test]
async fn test_delete_refetches_current_page() {
    let api = LocalApi::seeded(21).await;
    let mut list = controller(api, 20).await;

    list.set_page(1).await;
    assert_eq!(list.view().rows.len(), 1);
    let id = list.view().selected_id().unwrap();

    list.delete(id).await.unwrap();

    let view = list.view();
    assert_eq!(view.page, 1);
    assert!(view.rows.is_empty());
    assert_eq!(view.total_count, 20);
    assert_eq!(view.delete_error, None);
}

#[tokio::test]
async fn test_delete_failure_keeps_rows() {
    let api = LocalApi::seeded(3).await;
    api.fail_deletes.store(true, Ordering::SeqCst);
    let mut list = controller(api.clone(), 20).await;
    list.refresh().await;
    let before = list.view().rows.clone();
    let id = list.view().selected_id().unwrap();

    let err = list.delete(id).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    let view = list.view();
    assert!(view.delete_error.is_some());
    assert_eq!(view.rows, before);
    assert_eq!(api.storage.len(EntityKind::Allegation).unwrap(), 3);
}

#[tokio::test]
async fn test_search_resets_to_first_page() {
    let api = LocalApi::seeded(30).await;
    let mut list = controller(api, 5).await;

    list.set_page(3).await;
    list.set_search_term("case 00").await;

    let view = list.view();
    assert_eq!(view.page, 0);
    assert_eq!(view.total_count, 10);
    assert_eq!(view.rows.len(), 5);
}

#[tokio::test]
async fn test_superseded_fetch_is_discarded() {
    let api = LocalApi::seeded(30).await;
    let mut view = ListView::new(EntityKind::Allegation, 20);

    let broad = view.set_search_term("case");
    let narrow = view.set_search_term("case 001");
    let (broad, narrow) = tokio::join!(fetch_page(api.as_ref(), broad), fetch_page(api.as_ref(), narrow));

    // The newer result lands first, then the older one arrives late.
    assert!(view.apply(narrow.version, narrow.result));
    assert!(!view.apply(broad.version, broad.result));
    assert_eq!(view.total_count, 1);
}

#[tokio::test]
async fn test_relation_columns_filled_for_admin() {
    let api = LocalApi::seeded(2).await;
    let mut list = controller(api, 20).await;
    list.refresh().await;

    let view = list.view();
    let link = view
        .columns
        .iter()
        .find(|c| matches!(c.kind, ColumnKind::Link { .. }) && c.header == "victim")
        .unwrap();
    let count = view
        .columns
        .iter()
        .find(|c| matches!(c.kind, ColumnKind::Count(_)) && c.header == "# victims")
        .unwrap();

    for row in &view.rows {
        assert!(link.cell(row).starts_with("victim statement"));
        assert_eq!(count.cell(row), "1");
    }
}

#[tokio::test]
async fn test_clerk_sees_no_relation_columns_or_row_actions() {
    let api = LocalApi::new(fixtures::clerk());
    fixtures::seed_case_files(api.storage.as_ref(), TENANT, 3)
        .await
        .unwrap();
    let mut list = controller(Arc::new(api), 20).await;
    list.refresh().await;

    let view = list.view();
    assert_eq!(view.rows.len(), 3);
    assert!(view.relations.is_empty());
    assert!(view.affordances.view);
    assert!(!view.affordances.edit);
    assert!(!view.affordances.delete);
}

fn allegation_body(description: &str) -> Value {
    json!({
        "description": description,
        "status": "open",
        "victim_id": uuid::Uuid::from_u128(1).to_string(),
        "investigator_id": uuid::Uuid::from_u128(2).to_string(),
        "perpetrator_id": uuid::Uuid::from_u128(3).to_string(),
    })
}

fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

async fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        app.handle_key(press(KeyCode::Char(c)), None).await;
    }
}

#[tokio::test]
async fn test_create_refetches_page() {
    let api = LocalApi::seeded(3).await;
    let mut list = controller(api.clone(), 20).await;
    list.refresh().await;
    assert!(list.view().affordances.create);

    list.create(&allegation_body("walk-in report")).await.unwrap();

    let view = list.view();
    assert_eq!(view.total_count, 4);
    assert_eq!(view.rows.len(), 4);
    assert_eq!(view.write_error, None);
}

#[tokio::test]
async fn test_failed_update_keeps_rows() {
    let api = LocalApi::seeded(3).await;
    let mut list = controller(api.clone(), 20).await;
    list.refresh().await;
    let before = list.view().rows.clone();
    let version = list.view().version();
    let id = list.view().selected_id().unwrap();

    let err = list.update(id, &json!({ "status": 7 })).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    let view = list.view();
    assert!(view.write_error.as_deref().unwrap().contains("Validation failed"));
    assert_eq!(view.rows, before);
    assert_eq!(view.version(), version);
    let stored = api.storage.get(EntityKind::Allegation, id).await.unwrap().unwrap();
    assert_eq!(stored.get("status"), before[0].get("status"));
}

#[tokio::test]
async fn test_write_error_cleared_by_next_success() {
    let api = LocalApi::seeded(1).await;
    let mut list = controller(api, 20).await;
    list.refresh().await;

    list.create(&json!({ "description": "no status" })).await.unwrap_err();
    assert!(list.view().write_error.is_some());
    assert_eq!(list.view().total_count, 1);

    list.create(&allegation_body("complete")).await.unwrap();
    assert_eq!(list.view().write_error, None);
    assert_eq!(list.view().total_count, 2);
}

#[tokio::test]
async fn test_edit_form_saves_selected_row() {
    let api = LocalApi::seeded(2).await;
    let mut app = App::new(api.clone(), api.access().await.unwrap(), EntityKind::Allegation, 20);
    app.list.refresh().await;
    let id = app.view().selected_id().unwrap();

    app.handle_action(Action::EditItem).await;
    let InputMode::Form { target, input } = &app.mode else {
        panic!("expected the edit form, got {:?}", app.mode);
    };
    assert_eq!(*target, FormTarget::Edit(id));
    let prefill: Value = serde_json::from_str(input).unwrap();
    assert!(prefill.get("description").is_some());
    assert!(prefill.get("id").is_none());

    app.mode = InputMode::Form {
        target: FormTarget::Edit(id),
        input: String::new(),
    };
    type_text(&mut app, r#"{"status":"closed"}"#).await;
    app.handle_key(press(KeyCode::Enter), None).await;

    assert_eq!(app.mode, InputMode::Normal);
    assert_eq!(app.status.as_deref(), Some("Record saved"));
    let stored = api.storage.get(EntityKind::Allegation, id).await.unwrap().unwrap();
    assert_eq!(stored.get("status"), Some(&json!("closed")));
}

#[tokio::test]
async fn test_invalid_form_stays_open() {
    let api = LocalApi::seeded(1).await;
    let mut app = App::new(api.clone(), api.access().await.unwrap(), EntityKind::Allegation, 20);
    app.list.refresh().await;

    app.handle_action(Action::NewItem).await;
    type_text(&mut app, "{oops").await;
    app.handle_key(press(KeyCode::Enter), None).await;

    assert!(matches!(app.mode, InputMode::Form { target: FormTarget::Create, .. }));
    assert!(app.view().write_error.as_deref().unwrap().starts_with("invalid JSON"));
    assert_eq!(api.storage.len(EntityKind::Allegation).unwrap(), 1);

    app.handle_key(press(KeyCode::Esc), None).await;
    assert_eq!(app.mode, InputMode::Normal);
    assert_eq!(app.view().write_error, None);
}

#[tokio::test]
async fn test_write_keys_are_silent_without_grants() {
    let api = LocalApi::new(fixtures::clerk());
    fixtures::seed_case_files(api.storage.as_ref(), TENANT, 2)
        .await
        .unwrap();
    let api = Arc::new(api);
    let mut app = App::new(api.clone(), api.access().await.unwrap(), EntityKind::Allegation, 20);
    app.list.refresh().await;
    assert!(app.view().selected_id().is_some());

    for action in [Action::DeleteItem, Action::EditItem, Action::NewItem] {
        app.handle_action(action).await;
        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(app.status, None);
    }
    let hints = app.action_hints();
    assert!(!hints.contains("d delete"));
    assert!(!hints.contains("e edit"));
    assert!(!hints.contains("c new"));
}

proptest! {
    /// Every row lands on exactly one page.
    #[test]
    fn prop_page_count_covers_rows(total in 0u64..10_000, size in 1u32..200) {
        let pages = page_count(total, size);
        prop_assert!(pages * u64::from(size) >= total);
        if total > 0 {
            prop_assert!((pages - 1) * u64::from(size) < total);
        } else {
            prop_assert_eq!(pages, 0);
        }
    }

    /// Changing the page keeps the rest of the query.
    #[test]
    fn prop_set_page_offsets_by_page_size(page in 0u64..1_000, size in 1u32..200) {
        let mut view = ListView::new(EntityKind::Victim, size);
        view.set_search_term("bike");
        let ticket = view.set_page(page);
        prop_assert_eq!(ticket.query.offset, page * u64::from(size));
        prop_assert_eq!(ticket.query.limit, size);
        prop_assert_eq!(ticket.query.search_term, "bike");
        prop_assert_eq!(ticket.version, view.version());
    }
}
