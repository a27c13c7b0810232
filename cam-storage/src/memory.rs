//! In-memory storage backend.

use crate::eval::{compare_records, matches, RecordSource};
use crate::Storage;
use async_trait::async_trait;
use cam_core::{
    record_id, timestamp_value, CamResult, EntityId, EntityKind, OrderSpec, Predicate, Record,
    StorageError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

type Tables = HashMap<EntityKind, BTreeMap<Uuid, Record>>;

struct Snapshot<'a>(&'a Tables);

impl RecordSource for Snapshot<'_> {
    fn record(&self, entity: EntityKind, id: Uuid) -> Option<&Record> {
        self.0.get(&entity)?.get(&id)
    }

    fn records(&self, entity: EntityKind) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self.0.get(&entity) {
            Some(table) => Box::new(table.values()),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl Snapshot<'_> {
    fn scan(&self, entity: EntityKind, criteria: &Predicate) -> Vec<&Record> {
        self.records(entity)
            .filter(|record| matches(self, criteria, record))
            .collect()
    }
}

/// Record store holding every table behind one lock, so a page and its
/// total are always computed from the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CamResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> CamResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Number of stored records of one entity.
    pub fn len(&self, entity: EntityKind) -> CamResult<usize> {
        Ok(self.read()?.get(&entity).map(BTreeMap::len).unwrap_or(0))
    }

    /// Remove every record.
    pub fn clear(&self) -> CamResult<()> {
        self.write()?.clear();
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_page(
        &self,
        entity: EntityKind,
        criteria: &Predicate,
        order: &[OrderSpec],
        limit: u32,
        offset: u64,
    ) -> CamResult<(Vec<Record>, u64)> {
        let tables = self.read()?;
        let snapshot = Snapshot(&tables);
        let mut rows = snapshot.scan(entity, criteria);
        let total = rows.len() as u64;
        rows.sort_by(|a, b| compare_records(order, a, b));

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let page = rows
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_all(&self, entity: EntityKind, criteria: &Predicate) -> CamResult<Vec<Record>> {
        let tables = self.read()?;
        let snapshot = Snapshot(&tables);
        Ok(snapshot
            .scan(entity, criteria)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn count(&self, entity: EntityKind, criteria: &Predicate) -> CamResult<u64> {
        let tables = self.read()?;
        Ok(Snapshot(&tables).scan(entity, criteria).len() as u64)
    }

    async fn get(&self, entity: EntityKind, id: EntityId) -> CamResult<Option<Record>> {
        let tables = self.read()?;
        Ok(tables.get(&entity).and_then(|t| t.get(&id)).cloned())
    }

    async fn insert(&self, entity: EntityKind, mut record: Record) -> CamResult<Record> {
        let id = record_id(&record, "id").ok_or_else(|| StorageError::InsertFailed {
            entity,
            reason: "record has no id".to_string(),
        })?;

        let mut tables = self.write()?;
        let table = tables.entry(entity).or_default();
        if table.contains_key(&id) {
            return Err(StorageError::InsertFailed {
                entity,
                reason: "already exists".to_string(),
            }
            .into());
        }

        let now = timestamp_value(chrono::Utc::now());
        record
            .entry("created_at")
            .or_insert_with(|| now.clone());
        record.entry("updated_at").or_insert(now);
        table.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, entity: EntityKind, id: EntityId, changes: Record) -> CamResult<Record> {
        let mut tables = self.write()?;
        let record = tables
            .get_mut(&entity)
            .and_then(|t| t.get_mut(&id))
            .ok_or(StorageError::NotFound { entity, id })?;

        for (column, value) in changes {
            if column == "id" {
                continue;
            }
            record.insert(column, value);
        }
        record.insert(
            "updated_at".to_string(),
            timestamp_value(chrono::Utc::now()),
        );
        Ok(record.clone())
    }

    async fn delete(&self, entity: EntityKind, id: EntityId) -> CamResult<Record> {
        let mut tables = self.write()?;
        tables
            .get_mut(&entity)
            .and_then(|t| t.remove(&id))
            .ok_or_else(|| StorageError::NotFound { entity, id }.into())
    }
}
