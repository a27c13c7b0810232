//! CAM Storage - Storage Trait, In-Memory Store and Paginated Executor
//!
//! Defines the persistence collaborator the list pipeline queries by
//! criteria, an in-memory implementation used for tests and local runs, and
//! the executor that turns a [`ScopedQuery`](cam_core::ScopedQuery) into a
//! [`Page`](cam_core::Page).

pub mod eval;
pub mod executor;
pub mod memory;

pub use eval::{compare_records, compare_values, matches, RecordSource};
pub use executor::PaginatedExecutor;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use cam_core::{CamResult, EntityId, EntityKind, OrderSpec, Predicate, Record};

/// Async storage collaborator for entity records.
///
/// Implementations evaluate [`Predicate`] trees, including `Related`
/// traversals, and must answer `find_page` from a single consistent read so
/// the returned rows and total agree.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The `limit`/`offset` window of matching rows in `order`, plus the
    /// number of rows matching `criteria` overall.
    async fn find_page(
        &self,
        entity: EntityKind,
        criteria: &Predicate,
        order: &[OrderSpec],
        limit: u32,
        offset: u64,
    ) -> CamResult<(Vec<Record>, u64)>;

    /// Every matching row, in id order.
    async fn find_all(&self, entity: EntityKind, criteria: &Predicate) -> CamResult<Vec<Record>>;

    async fn count(&self, entity: EntityKind, criteria: &Predicate) -> CamResult<u64>;

    async fn get(&self, entity: EntityKind, id: EntityId) -> CamResult<Option<Record>>;

    /// Insert a record carrying its own `id`. Fails if the id exists.
    async fn insert(&self, entity: EntityKind, record: Record) -> CamResult<Record>;

    /// Merge `changes` into an existing record and return the result.
    async fn update(&self, entity: EntityKind, id: EntityId, changes: Record) -> CamResult<Record>;

    /// Remove a record and return what was removed.
    async fn delete(&self, entity: EntityKind, id: EntityId) -> CamResult<Record>;
}
