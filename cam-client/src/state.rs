//! Application state and key handling.

use crate::api_client::{EntityApi, Permissions};
use crate::keys::Action;
use crate::list_view::{ListView, ListViewController};
use cam_core::{EntityId, EntityKind, OrderParam, Record, SchemaRegistry};
use crossterm::event::{KeyCode, KeyEvent};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Entities reachable with the digit keys, in key order.
pub const ENTITIES: [EntityKind; 4] = [
    EntityKind::Allegation,
    EntityKind::Victim,
    EntityKind::Investigator,
    EntityKind::Perpetrator,
];

const PAGE_SIZE_STEP: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search(String),
    ConfirmDelete(EntityId),
    /// A JSON body being typed for a create or an update.
    Form { target: FormTarget, input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTarget {
    Create,
    Edit(EntityId),
}

pub struct App {
    pub registry: SchemaRegistry,
    pub permissions: Permissions,
    pub list: ListViewController<dyn EntityApi>,
    pub mode: InputMode,
    pub detail: Option<Record>,
    pub status: Option<String>,
    api: Arc<dyn EntityApi>,
    page_size: u32,
}

impl App {
    pub fn new(
        api: Arc<dyn EntityApi>,
        permissions: Permissions,
        entity: EntityKind,
        page_size: u32,
    ) -> Self {
        let registry = SchemaRegistry::new();
        let view = ListView::new(entity, page_size).with_layout(&registry, &permissions);
        Self {
            list: ListViewController::new(api.clone(), view),
            registry,
            permissions,
            mode: InputMode::Normal,
            detail: None,
            status: None,
            api,
            page_size,
        }
    }

    pub fn view(&self) -> &ListView {
        self.list.view()
    }

    /// Show `entity`'s list page from its first page.
    pub async fn open(&mut self, entity: EntityKind) {
        let view = ListView::new(entity, self.page_size).with_layout(&self.registry, &self.permissions);
        self.list = ListViewController::new(self.api.clone(), view);
        self.detail = None;
        self.list.refresh().await;
    }

    /// Handle a key press. Returns true when the app should exit.
    pub async fn handle_key(&mut self, key: KeyEvent, action: Option<Action>) -> bool {
        if let InputMode::Search(input) = &mut self.mode {
            match key.code {
                KeyCode::Enter => {
                    let term = std::mem::take(input);
                    self.mode = InputMode::Normal;
                    self.list.set_search_term(term).await;
                }
                KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return false;
        }

        if let InputMode::Form { input, .. } = &mut self.mode {
            match key.code {
                KeyCode::Enter => self.submit_form().await,
                KeyCode::Esc => {
                    self.mode = InputMode::Normal;
                    self.list.view_mut().write_error = None;
                }
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return false;
        }

        match action {
            Some(action) => self.handle_action(action).await,
            None => false,
        }
    }

    pub async fn handle_action(&mut self, action: Action) -> bool {
        if let InputMode::ConfirmDelete(id) = self.mode {
            self.mode = InputMode::Normal;
            if action == Action::Confirm {
                self.status = match self.list.delete(id).await {
                    Ok(_) => Some("Record deleted".to_string()),
                    Err(_) => None,
                };
            }
            return false;
        }

        match action {
            Action::Quit => return true,
            Action::MoveUp => self.list.view_mut().select_previous(),
            Action::MoveDown => self.list.view_mut().select_next(),
            Action::NextPage => {
                if let Some(ticket) = self.list.view_mut().next_page() {
                    self.list.run(ticket).await;
                }
            }
            Action::PrevPage => {
                if let Some(ticket) = self.list.view_mut().previous_page() {
                    self.list.run(ticket).await;
                }
            }
            Action::FirstPage => {
                self.list.set_page(0).await;
            }
            Action::SwitchEntity(index) => {
                if let Some(entity) = ENTITIES.get(index) {
                    self.open(*entity).await;
                }
            }
            Action::ViewItem => self.view_selected().await,
            Action::NewItem => {
                if self.view().affordances.create {
                    self.open_form(FormTarget::Create, "{}".to_string());
                }
            }
            Action::EditItem => {
                if self.view().affordances.edit {
                    if let Some((id, body)) = self.edit_body() {
                        self.open_form(FormTarget::Edit(id), body);
                    }
                }
            }
            Action::DeleteItem => {
                if self.view().affordances.delete {
                    if let Some(id) = self.view().selected_id() {
                        self.mode = InputMode::ConfirmDelete(id);
                    }
                }
            }
            Action::ToggleOrder => {
                let desc = !self
                    .view()
                    .order
                    .first()
                    .map(|o| o.desc)
                    .unwrap_or(true);
                let order = if desc {
                    OrderParam::desc("created_at")
                } else {
                    OrderParam::asc("created_at")
                };
                self.list.set_order(vec![order]).await;
            }
            Action::GrowPage => {
                let size = self.view().page_size.saturating_add(PAGE_SIZE_STEP);
                self.list.set_page_size(size).await;
            }
            Action::ShrinkPage => {
                let size = self.view().page_size.saturating_sub(PAGE_SIZE_STEP).max(1);
                self.list.set_page_size(size).await;
            }
            Action::OpenSearch => self.mode = InputMode::Search(self.view().search_term.clone()),
            Action::Refresh => {
                self.list.refresh().await;
            }
            Action::Cancel => {
                self.detail = None;
                self.status = None;
            }
            Action::Confirm => {}
        }
        false
    }

    fn open_form(&mut self, target: FormTarget, input: String) {
        self.list.view_mut().write_error = None;
        self.status = None;
        self.mode = InputMode::Form { target, input };
    }

    /// The selected row's writable columns as a compact JSON object.
    fn edit_body(&self) -> Option<(EntityId, String)> {
        let view = self.view();
        let id = view.selected_id()?;
        let row = view.selected_row()?;
        let body: Map<String, Value> = self
            .registry
            .get(view.entity)
            .writable_fields()
            .filter_map(|field| row.get(field.name).map(|v| (field.name.to_string(), v.clone())))
            .collect();
        Some((id, Value::Object(body).to_string()))
    }

    /// Send the typed body. The form stays open while the write fails.
    async fn submit_form(&mut self) {
        let InputMode::Form { target, input } = &self.mode else {
            return;
        };
        let target = *target;
        let body: Value = match serde_json::from_str(input) {
            Ok(body) => body,
            Err(err) => {
                self.list.view_mut().write_error = Some(format!("invalid JSON: {}", err));
                return;
            }
        };
        let result = match target {
            FormTarget::Create => self.list.create(&body).await,
            FormTarget::Edit(id) => self.list.update(id, &body).await,
        };
        if result.is_ok() {
            self.mode = InputMode::Normal;
            self.status = Some("Record saved".to_string());
        }
    }

    async fn view_selected(&mut self) {
        let view = self.list.view();
        if !view.affordances.view {
            return;
        }
        let Some(id) = view.selected_id() else {
            return;
        };
        let entity = view.entity;
        let relations = view.relations.clone();
        match self.api.get(entity, id, &relations).await {
            Ok(record) => self.detail = Some(record),
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Row actions shown for the current page.
    pub fn action_hints(&self) -> String {
        let affordances = self.view().affordances;
        let mut hints = vec!["j/k move", "h/l page", "/ search", "o order"];
        if affordances.view {
            hints.push("enter view");
        }
        if affordances.create {
            hints.push("c new");
        }
        if affordances.edit {
            hints.push("e edit");
        }
        if affordances.delete {
            hints.push("d delete");
        }
        hints.push("1-4 entity");
        hints.push("q quit");
        hints.join(" | ")
    }
}
