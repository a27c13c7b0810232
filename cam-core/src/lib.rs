//! CAM Core - Schema, query normalization and access scoping
//!
//! The list/query pipeline shared by the server and the terminal client:
//! raw parameters are normalized into a [`QueryDescriptor`] against the
//! [`SchemaRegistry`], then restricted by the [`Scoper`] into a
//! [`ScopedQuery`] that storage executes.

pub mod access;
pub mod contract;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod validation;

pub use access::{
    AccessPolicy, CallerContext, EntityGrant, Operation, OwnershipRule, OwnershipRules,
    PolicyError, RoleGrant, ScopedQuery, Scoper, Visibility, ROLE_ADMIN, ROLE_INVESTIGATOR,
    ROLE_VICTIM,
};
pub use contract::{ListQuery, OrderParam};
pub use error::{CamError, CamResult, StorageError};
pub use identity::{
    id_value, new_entity_id, record_id, timestamp_value, EntityId, Record, TenantId, Timestamp,
    UserId,
};
pub use normalize::{normalize, Normalizer};
pub use query::{
    FieldPredicate, OrderSpec, Page, Predicate, QueryDescriptor, SortDirection, DEFAULT_LIMIT,
    MAX_LIMIT,
};
pub use schema::{
    AllegationRelation, Cardinality, EntityDescriptor, EntityKind, FieldType, IncludeMode,
    InvestigatorRelation, Join, PerpetratorRelation, Relation, RelationInclude, RelationShape,
    RelationSpec, ScalarField, SchemaRegistry, VictimRelation, COUNT_KEY, COUNT_SUFFIX,
    MANAGED_FIELDS, TENANT_FIELD,
};
pub use validation::{
    validate_nested_create, validate_write, FieldError, NestedChild, NestedCreate, WriteMode,
};
