//! Paginated query execution with batched relation includes.

use crate::Storage;
use cam_core::{
    CamError, CamResult, IncludeMode, Join, Page, Predicate, Record, RelationInclude, ScopedQuery,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub use cam_core::COUNT_KEY;

/// Runs scoped queries against a [`Storage`].
///
/// A page is one consistent read of rows plus total, followed by one batched
/// fetch per included relation. Any failure fails the whole request.
#[derive(Clone)]
pub struct PaginatedExecutor {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for PaginatedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedExecutor").finish_non_exhaustive()
    }
}

impl PaginatedExecutor {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Execute a scoped list query.
    pub async fn execute(&self, query: &ScopedQuery) -> CamResult<Page<Record>> {
        let entity = query.entity();
        let (mut rows, total_count) = self
            .storage
            .find_page(
                entity,
                &query.criteria(),
                query.order(),
                query.limit(),
                query.offset(),
            )
            .await?;

        for (include, scope) in query.includes() {
            self.attach(&mut rows, include, scope).await?;
        }

        tracing::debug!(
            entity = %entity,
            returned = rows.len(),
            total_count,
            limit = query.limit(),
            offset = query.offset(),
            "Executed list query"
        );
        Ok(Page::new(rows, total_count))
    }

    /// Execute a query expected to match at most one row.
    pub async fn fetch_one(&self, query: &ScopedQuery) -> CamResult<Option<Record>> {
        Ok(self.execute(query).await?.data.into_iter().next())
    }

    /// Fail with `Forbidden` unless the scoped query matches at least one row.
    ///
    /// A record that does not exist and one outside the caller's reach are
    /// indistinguishable here.
    pub async fn ensure_accessible(&self, query: &ScopedQuery) -> CamResult<()> {
        let entity = query.entity();
        let matching = self.storage.count(entity, &query.criteria()).await?;
        if matching == 0 {
            tracing::warn!(
                entity = %entity,
                operation = %query.operation(),
                "Access check matched no records"
            );
            return Err(CamError::forbidden(entity, query.operation()));
        }
        Ok(())
    }

    async fn attach(
        &self,
        rows: &mut [Record],
        include: &RelationInclude,
        scope: &Predicate,
    ) -> CamResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let spec = include.relation.spec();

        // Key each related row by the id it joins on.
        let (column, join_field) = match spec.join {
            Join::Local(column) => (column, "id"),
            Join::Foreign(column) => ("id", column),
        };
        let mut keys: Vec<Value> = rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        keys.dedup();

        let related = if keys.is_empty() {
            Vec::new()
        } else {
            let criteria = Predicate::all([
                scope.clone(),
                Predicate::In {
                    field: join_field,
                    values: keys,
                },
            ]);
            self.storage.find_all(spec.target, &criteria).await?
        };

        let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
        for record in related {
            if let Some(key) = record.get(join_field).and_then(Value::as_str) {
                grouped.entry(key.to_string()).or_default().push(record);
            }
        }

        for row in rows.iter_mut() {
            let group = row
                .get(column)
                .and_then(Value::as_str)
                .and_then(|key| grouped.get(key));
            match include.mode {
                IncludeMode::Record => {
                    let value = match spec.join {
                        Join::Local(_) => group
                            .and_then(|g| g.first())
                            .map(|r| Value::Object(r.clone()))
                            .unwrap_or(Value::Null),
                        Join::Foreign(_) => Value::Array(
                            group
                                .map(|g| g.iter().cloned().map(Value::Object).collect())
                                .unwrap_or_default(),
                        ),
                    };
                    row.insert(spec.name.to_string(), value);
                }
                IncludeMode::Count => {
                    let count = group.map(Vec::len).unwrap_or(0);
                    let counts = row
                        .entry(COUNT_KEY)
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(counts) = counts {
                        counts.insert(spec.name.to_string(), Value::from(count));
                    }
                }
            }
        }
        Ok(())
    }
}
