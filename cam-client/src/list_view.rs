//! List page state and its controller.
//!
//! [`ListView`] is plain state. Every action that changes what the page
//! should show bumps its version and returns a [`FetchTicket`]; a result is
//! only applied when its ticket is still the newest one, so a slow response
//! can never overwrite a newer one.
//!
//! [`ListViewController`] pairs a view with an [`EntityApi`] and awaits the
//! fetch for each action.

use crate::api_client::{ApiClientError, EntityApi, Permissions};
use crate::columns::{columns_for, relation_paths, Column, RowAffordances};
use cam_core::{
    record_id, EntityId, EntityKind, ListQuery, OrderParam, Page, Record, SchemaRegistry,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const CONTAINS_SUFFIX: &str = ".contains";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored(String),
}

/// A fetch issued for one version of the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub version: u64,
    pub entity: EntityKind,
    pub query: ListQuery,
}

/// Outcome of a ticket, ready to hand back to [`ListView::apply`].
#[derive(Debug)]
pub struct FetchResult {
    pub version: u64,
    pub result: Result<Page<Record>, ApiClientError>,
}

/// Run a ticket against `api`.
pub async fn fetch_page<A: EntityApi + ?Sized>(api: &A, ticket: FetchTicket) -> FetchResult {
    let result = api.list(ticket.entity, &ticket.query).await;
    FetchResult {
        version: ticket.version,
        result,
    }
}

/// Number of pages needed for `total` rows.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

#[derive(Debug, Clone)]
pub struct ListView {
    pub entity: EntityKind,
    pub search_term: String,
    pub search_keys: Vec<String>,
    pub filters: BTreeMap<String, String>,
    pub order: Vec<OrderParam>,
    pub page: u64,
    pub page_size: u32,
    pub relations: Vec<String>,
    pub columns: Vec<Column>,
    pub affordances: RowAffordances,
    pub rows: Vec<Record>,
    pub total_count: u64,
    pub state: LoadState,
    pub delete_error: Option<String>,
    /// Last failed create or update.
    pub write_error: Option<String>,
    pub selected: usize,
    version: u64,
}

impl ListView {
    pub fn new(entity: EntityKind, page_size: u32) -> Self {
        Self {
            entity,
            search_term: String::new(),
            search_keys: Vec::new(),
            filters: BTreeMap::new(),
            order: Vec::new(),
            page: 0,
            page_size: page_size.max(1),
            relations: Vec::new(),
            columns: Vec::new(),
            affordances: RowAffordances::default(),
            rows: Vec::new(),
            total_count: 0,
            state: LoadState::Idle,
            delete_error: None,
            write_error: None,
            selected: 0,
            version: 0,
        }
    }

    /// Lay the page out for a caller: columns, requested relations, default
    /// search keys and row affordances.
    pub fn with_layout(mut self, registry: &SchemaRegistry, permissions: &Permissions) -> Self {
        let descriptor = registry.get(self.entity);
        self.columns = columns_for(registry, descriptor, permissions);
        self.relations = relation_paths(&self.columns);
        self.search_keys = descriptor
            .searchable_fields()
            .map(|field| format!("{field}{CONTAINS_SUFFIX}"))
            .collect();
        self.affordances = RowAffordances::for_entity(permissions, self.entity);
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The query the current state asks for.
    pub fn query(&self) -> ListQuery {
        ListQuery {
            relations: self.relations.clone(),
            limit: self.page_size,
            offset: self.page * u64::from(self.page_size),
            search_term: self.search_term.clone(),
            order: self.order.clone(),
            search_term_keys: self.search_keys.clone(),
            filters: self.filters.clone(),
        }
    }

    /// Re-fetch the current page without changing anything else.
    pub fn reload(&mut self) -> FetchTicket {
        self.version += 1;
        self.state = LoadState::Loading;
        FetchTicket {
            version: self.version,
            entity: self.entity,
            query: self.query(),
        }
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) -> FetchTicket {
        self.search_term = term.into();
        self.page = 0;
        self.reload()
    }

    pub fn set_filters(&mut self, filters: BTreeMap<String, String>) -> FetchTicket {
        self.filters = filters;
        self.page = 0;
        self.reload()
    }

    pub fn set_order(&mut self, order: Vec<OrderParam>) -> FetchTicket {
        self.order = order;
        self.page = 0;
        self.reload()
    }

    pub fn set_page(&mut self, page: u64) -> FetchTicket {
        self.page = page;
        self.reload()
    }

    pub fn set_page_size(&mut self, page_size: u32) -> FetchTicket {
        self.page_size = page_size.max(1);
        self.page = 0;
        self.reload()
    }

    pub fn next_page(&mut self) -> Option<FetchTicket> {
        let last = page_count(self.total_count, self.page_size).saturating_sub(1);
        (self.page < last).then(|| self.set_page(self.page + 1))
    }

    pub fn previous_page(&mut self) -> Option<FetchTicket> {
        (self.page > 0).then(|| self.set_page(self.page - 1))
    }

    /// Apply a fetch result. Returns false when the result was superseded.
    ///
    /// A failed fetch leaves the rows on screen untouched.
    pub fn apply(&mut self, version: u64, result: Result<Page<Record>, ApiClientError>) -> bool {
        if version != self.version {
            return false;
        }
        match result {
            Ok(page) => {
                self.rows = page.data;
                self.total_count = page.total_count;
                self.selected = self.selected.min(self.rows.len().saturating_sub(1));
                self.state = LoadState::Loaded;
            }
            Err(err) => {
                self.state = LoadState::Errored(err.to_string());
            }
        }
        true
    }

    pub fn page_count(&self) -> u64 {
        page_count(self.total_count, self.page_size)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_row(&self) -> Option<&Record> {
        self.rows.get(self.selected)
    }

    pub fn selected_id(&self) -> Option<EntityId> {
        self.selected_row().and_then(|row| record_id(row, "id"))
    }
}

/// Drives a [`ListView`] against an API, one awaited fetch per action.
pub struct ListViewController<A: EntityApi + ?Sized> {
    api: Arc<A>,
    view: ListView,
}

impl<A: EntityApi + ?Sized> ListViewController<A> {
    pub fn new(api: Arc<A>, view: ListView) -> Self {
        Self { api, view }
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ListView {
        &mut self.view
    }

    pub async fn run(&mut self, ticket: FetchTicket) -> bool {
        let FetchResult { version, result } = fetch_page(self.api.as_ref(), ticket).await;
        self.view.apply(version, result)
    }

    pub async fn refresh(&mut self) -> bool {
        let ticket = self.view.reload();
        self.run(ticket).await
    }

    pub async fn set_search_term(&mut self, term: impl Into<String>) -> bool {
        let ticket = self.view.set_search_term(term);
        self.run(ticket).await
    }

    pub async fn set_filters(&mut self, filters: BTreeMap<String, String>) -> bool {
        let ticket = self.view.set_filters(filters);
        self.run(ticket).await
    }

    pub async fn set_order(&mut self, order: Vec<OrderParam>) -> bool {
        let ticket = self.view.set_order(order);
        self.run(ticket).await
    }

    pub async fn set_page(&mut self, page: u64) -> bool {
        let ticket = self.view.set_page(page);
        self.run(ticket).await
    }

    pub async fn set_page_size(&mut self, page_size: u32) -> bool {
        let ticket = self.view.set_page_size(page_size);
        self.run(ticket).await
    }

    /// Create a record, then re-fetch the current page.
    ///
    /// Failures land in `write_error`; the rows on screen are left alone.
    pub async fn create(&mut self, body: &Value) -> Result<Record, ApiClientError> {
        self.view.write_error = None;
        let result = self.api.create(self.view.entity, body).await;
        self.after_write(result).await
    }

    /// Update a record, then re-fetch the current page.
    pub async fn update(&mut self, id: EntityId, body: &Value) -> Result<Record, ApiClientError> {
        self.view.write_error = None;
        let result = self.api.update(self.view.entity, id, body).await;
        self.after_write(result).await
    }

    async fn after_write(
        &mut self,
        result: Result<Record, ApiClientError>,
    ) -> Result<Record, ApiClientError> {
        match result {
            Ok(record) => {
                self.refresh().await;
                Ok(record)
            }
            Err(err) => {
                self.view.write_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Delete a record, then re-fetch the page the user is on.
    ///
    /// On failure the error lands in `delete_error` and the displayed rows
    /// stay as they were.
    pub async fn delete(&mut self, id: EntityId) -> Result<Record, ApiClientError> {
        self.view.delete_error = None;
        match self.api.delete(self.view.entity, id).await {
            Ok(deleted) => {
                self.refresh().await;
                Ok(deleted)
            }
            Err(err) => {
                self.view.delete_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: &[u128], total: u64) -> Page<Record> {
        let data = ids
            .iter()
            .map(|id| {
                json!({ "id": uuid::Uuid::from_u128(*id).to_string() })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        Page::new(data, total)
    }

    #[test]
    fn test_query_reflects_page_and_size() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        let ticket = view.set_page(2);
        assert_eq!(ticket.query.offset, 40);
        assert_eq!(ticket.query.limit, 20);
        assert_eq!(view.state, LoadState::Loading);
    }

    #[test]
    fn test_state_changes_reset_page() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        view.set_page(3);
        assert_eq!(view.set_search_term("case").query.offset, 0);

        view.set_page(3);
        assert_eq!(view.set_order(vec![OrderParam::asc("status")]).query.offset, 0);

        view.set_page(3);
        let mut filters = BTreeMap::new();
        filters.insert("status".to_string(), "open".to_string());
        assert_eq!(view.set_filters(filters).query.offset, 0);

        view.set_page(3);
        let ticket = view.set_page_size(50);
        assert_eq!((ticket.query.offset, ticket.query.limit), (0, 50));
    }

    #[test]
    fn test_set_page_keeps_search_and_filters() {
        let mut view = ListView::new(EntityKind::Victim, 10);
        view.set_search_term("bike");
        let ticket = view.set_page(1);
        assert_eq!(ticket.query.search_term, "bike");
        assert_eq!(ticket.query.offset, 10);
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        let first = view.set_search_term("a");
        let second = view.set_search_term("ab");

        assert!(view.apply(second.version, Ok(page(&[2], 1))));
        assert!(!view.apply(first.version, Ok(page(&[1, 3], 2))));
        assert_eq!(view.total_count, 1);
        assert_eq!(view.selected_id(), Some(uuid::Uuid::from_u128(2)));
    }

    #[test]
    fn test_failed_fetch_keeps_rows() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        let ticket = view.reload();
        view.apply(ticket.version, Ok(page(&[1, 2], 2)));

        let ticket = view.reload();
        let err = ApiClientError::InvalidResponse("HTTP 500".to_string());
        assert!(view.apply(ticket.version, Err(err)));
        assert_eq!(view.rows.len(), 2);
        assert!(matches!(view.state, LoadState::Errored(_)));
    }

    #[test]
    fn test_page_navigation_bounds() {
        let mut view = ListView::new(EntityKind::Allegation, 20);
        let ticket = view.reload();
        view.apply(ticket.version, Ok(page(&[1], 21)));

        assert!(view.previous_page().is_none());
        assert_eq!(view.next_page().map(|t| t.query.offset), Some(20));
        assert!(view.next_page().is_none());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
        assert_eq!(page_count(5, 0), 0);
    }
}
