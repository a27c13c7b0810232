//! Query descriptors and predicates
//!
//! A [`QueryDescriptor`] is the validated form of a list request: every field
//! and relation it mentions exists in the entity's schema. Predicates are a
//! small expression tree that storage backends evaluate.

use crate::schema::{EntityKind, Relation, RelationInclude};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default page size when the request carries none.
pub const DEFAULT_LIMIT: u32 = 20;

/// Server-side ceiling for page size.
pub const MAX_LIMIT: u32 = 100;

// ============================================================================
// PREDICATES
// ============================================================================

/// Boolean expression over a record's columns.
///
/// `And(vec![])` always holds and `Or(vec![])` never does.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column equals value exactly.
    Eq { field: &'static str, value: Value },
    /// Column value is one of the given values.
    In {
        field: &'static str,
        values: Vec<Value>,
    },
    /// Text column contains the needle, ignoring case.
    Contains { field: &'static str, needle: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Some record reachable through `relation` satisfies the inner predicate.
    Related {
        relation: Relation,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn never() -> Self {
        Predicate::Or(Vec::new())
    }

    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field,
            value: value.into(),
        }
    }

    pub fn contains(field: &'static str, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            field,
            needle: needle.into(),
        }
    }

    pub fn related(relation: Relation, predicate: Predicate) -> Self {
        Predicate::Related {
            relation,
            predicate: Box::new(predicate),
        }
    }

    /// Conjunction that flattens trivially-true operands.
    pub fn all(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::And(flat)
        }
    }
}

/// A per-column filter as written by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    Equals(Value),
    Contains(String),
}

impl FieldPredicate {
    pub fn on(&self, field: &'static str) -> Predicate {
        match self {
            FieldPredicate::Equals(value) => Predicate::eq(field, value.clone()),
            FieldPredicate::Contains(needle) => Predicate::contains(field, needle.clone()),
        }
    }
}

// ============================================================================
// ORDERING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn asc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Validated list query for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub entity: EntityKind,
    pub filters: BTreeMap<&'static str, FieldPredicate>,
    pub search_term: Option<String>,
    pub search_fields: Vec<&'static str>,
    pub order: Vec<OrderSpec>,
    pub relations: BTreeSet<RelationInclude>,
    pub limit: u32,
    pub offset: u64,
}

impl QueryDescriptor {
    /// Unfiltered first page in id order.
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            filters: BTreeMap::new(),
            search_term: None,
            search_fields: Vec::new(),
            order: vec![OrderSpec::asc("id")],
            relations: BTreeSet::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Query selecting a single record by id.
    pub fn by_id(entity: EntityKind, id: uuid::Uuid) -> Self {
        let mut descriptor = Self::new(entity);
        descriptor
            .filters
            .insert("id", FieldPredicate::Equals(crate::identity::id_value(id)));
        descriptor.limit = 1;
        descriptor
    }

    pub fn with_relations(mut self, relations: BTreeSet<RelationInclude>) -> Self {
        self.relations = relations;
        self
    }

    /// The row predicate expressed by filters and search term.
    pub fn criteria(&self) -> Predicate {
        let mut parts: Vec<Predicate> = self
            .filters
            .iter()
            .map(|(field, predicate)| predicate.on(*field))
            .collect();

        if let Some(term) = &self.search_term {
            parts.push(Predicate::Or(
                self.search_fields
                    .iter()
                    .map(|field| Predicate::contains(*field, term.clone()))
                    .collect(),
            ));
        }

        Predicate::all(parts)
    }
}

// ============================================================================
// PAGE
// ============================================================================

/// One page of results plus the size of the whole matching set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_count: u64) -> Self {
        Self { data, total_count }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_count: 0,
        }
    }
}
