//! Entity Schema Registry
//!
//! Static descriptions of the four case-management entities: their scalar
//! columns, the relations between them and how each relation joins. Relation
//! paths arrive from clients as strings (`victim_allegation_victim_idTovictim`,
//! `perpetrator_perpetrator_allegation_idToallegation.count`) and are resolved
//! here exactly once into tagged [`Relation`] values; nothing downstream
//! re-parses a path.

use crate::error::{CamError, CamResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// The registered entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Allegation,
    Victim,
    Investigator,
    Perpetrator,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Allegation,
        EntityKind::Victim,
        EntityKind::Investigator,
        EntityKind::Perpetrator,
    ];

    /// Singular entity name, as used in schema and policy files.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Allegation => "allegation",
            EntityKind::Victim => "victim",
            EntityKind::Investigator => "investigator",
            EntityKind::Perpetrator => "perpetrator",
        }
    }

    /// Plural route segment (`/api/allegations`).
    pub fn route(self) -> &'static str {
        match self {
            EntityKind::Allegation => "allegations",
            EntityKind::Victim => "victims",
            EntityKind::Investigator => "investigators",
            EntityKind::Perpetrator => "perpetrators",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn from_route(route: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.route() == route)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SCALAR FIELDS
// ============================================================================

/// Semantic type of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text. Filtered with case-insensitive substring matching.
    Text,
    /// Calendar date, stored as `YYYY-MM-DD`.
    Date,
    /// Server-managed RFC 3339 instant.
    Timestamp,
    /// UUID reference.
    Id,
}

/// A scalar column of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarField {
    pub name: &'static str,
    pub ty: FieldType,
    /// Must be present and non-empty on create.
    pub required: bool,
    /// Accepted in create/update bodies.
    pub writable: bool,
    /// Included in the default free-text search.
    pub searchable: bool,
}

impl ScalarField {
    const fn managed(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            writable: false,
            searchable: false,
        }
    }

    const fn column(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            writable: true,
            searchable: false,
        }
    }

    const fn text(name: &'static str) -> Self {
        Self::column(name, FieldType::Text).searchable()
    }

    const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    const fn searchable(self) -> Self {
        Self {
            searchable: true,
            ..self
        }
    }
}

/// Column holding the owning tenant on every record.
pub const TENANT_FIELD: &str = "tenant_id";

/// Columns the server owns; never taken from request bodies.
pub const MANAGED_FIELDS: [&str; 4] = ["id", TENANT_FIELD, "created_at", "updated_at"];

const ALLEGATION_FIELDS: &[ScalarField] = &[
    ScalarField::managed("id", FieldType::Id),
    ScalarField::managed(TENANT_FIELD, FieldType::Id),
    ScalarField::managed("created_at", FieldType::Timestamp),
    ScalarField::managed("updated_at", FieldType::Timestamp),
    ScalarField::text("description").required(),
    ScalarField::text("status").required(),
    ScalarField::column("victim_id", FieldType::Id).required(),
    ScalarField::column("investigator_id", FieldType::Id).required(),
    ScalarField::column("perpetrator_id", FieldType::Id).required(),
];

const VICTIM_FIELDS: &[ScalarField] = &[
    ScalarField::managed("id", FieldType::Id),
    ScalarField::managed(TENANT_FIELD, FieldType::Id),
    ScalarField::managed("created_at", FieldType::Timestamp),
    ScalarField::managed("updated_at", FieldType::Timestamp),
    ScalarField::column("user_id", FieldType::Id).required(),
    ScalarField::column("allegation_id", FieldType::Id).required(),
    ScalarField::column("incident_date", FieldType::Date),
    ScalarField::text("incident_description"),
    ScalarField::text("incident_location"),
];

const INVESTIGATOR_FIELDS: &[ScalarField] = &[
    ScalarField::managed("id", FieldType::Id),
    ScalarField::managed(TENANT_FIELD, FieldType::Id),
    ScalarField::managed("created_at", FieldType::Timestamp),
    ScalarField::managed("updated_at", FieldType::Timestamp),
    ScalarField::column("user_id", FieldType::Id).required(),
    ScalarField::column("assigned_allegation_id", FieldType::Id).required(),
    ScalarField::text("investigation_status"),
    ScalarField::text("investigation_result"),
    ScalarField::column("investigation_date", FieldType::Date),
];

const PERPETRATOR_FIELDS: &[ScalarField] = &[
    ScalarField::managed("id", FieldType::Id),
    ScalarField::managed(TENANT_FIELD, FieldType::Id),
    ScalarField::managed("created_at", FieldType::Timestamp),
    ScalarField::managed("updated_at", FieldType::Timestamp),
    ScalarField::column("user_id", FieldType::Id).required(),
    ScalarField::column("allegation_id", FieldType::Id).required(),
    ScalarField::text("incident_role"),
    ScalarField::text("incident_consequence"),
    ScalarField::text("incident_remarks"),
];

// ============================================================================
// RELATIONS
// ============================================================================

/// How a relation joins its owner to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// The owner's column holds the target's id.
    Local(&'static str),
    /// The target's column holds the owner's id.
    Foreign(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Static description of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: &'static str,
    pub target: EntityKind,
    pub join: Join,
}

impl RelationSpec {
    pub fn cardinality(&self) -> Cardinality {
        match self.join {
            Join::Local(_) => Cardinality::One,
            Join::Foreign(_) => Cardinality::Many,
        }
    }
}

macro_rules! relation_enum {
    (
        $(#[$meta:meta])*
        $enum:ident {
            $($variant:ident => ($name:literal, $target:ident, $join:expr)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $enum {
            $($variant),+
        }

        impl $enum {
            pub const ALL: &'static [$enum] = &[$($enum::$variant),+];

            pub fn spec(self) -> RelationSpec {
                match self {
                    $($enum::$variant => RelationSpec {
                        name: $name,
                        target: EntityKind::$target,
                        join: $join,
                    }),+
                }
            }
        }
    };
}

relation_enum! {
    /// Relations reachable from an allegation.
    AllegationRelation {
        Victim => ("victim_allegation_victim_idTovictim", Victim, Join::Local("victim_id")),
        Investigator => (
            "investigator_allegation_investigator_idToinvestigator",
            Investigator,
            Join::Local("investigator_id")
        ),
        Perpetrator => (
            "perpetrator_allegation_perpetrator_idToperpetrator",
            Perpetrator,
            Join::Local("perpetrator_id")
        ),
        AssignedInvestigators => (
            "investigator_investigator_assigned_allegation_idToallegation",
            Investigator,
            Join::Foreign("assigned_allegation_id")
        ),
        Perpetrators => (
            "perpetrator_perpetrator_allegation_idToallegation",
            Perpetrator,
            Join::Foreign("allegation_id")
        ),
        Victims => (
            "victim_victim_allegation_idToallegation",
            Victim,
            Join::Foreign("allegation_id")
        ),
    }
}

relation_enum! {
    /// Relations reachable from a victim.
    VictimRelation {
        Allegations => ("allegation_allegation_victim_idTovictim", Allegation, Join::Foreign("victim_id")),
        Allegation => (
            "allegation_victim_allegation_idToallegation",
            Allegation,
            Join::Local("allegation_id")
        ),
    }
}

relation_enum! {
    /// Relations reachable from an investigator.
    InvestigatorRelation {
        Allegations => (
            "allegation_allegation_investigator_idToinvestigator",
            Allegation,
            Join::Foreign("investigator_id")
        ),
        AssignedAllegation => (
            "allegation_investigator_assigned_allegation_idToallegation",
            Allegation,
            Join::Local("assigned_allegation_id")
        ),
    }
}

relation_enum! {
    /// Relations reachable from a perpetrator.
    PerpetratorRelation {
        Allegations => (
            "allegation_allegation_perpetrator_idToperpetrator",
            Allegation,
            Join::Foreign("perpetrator_id")
        ),
        Allegation => (
            "allegation_perpetrator_allegation_idToallegation",
            Allegation,
            Join::Local("allegation_id")
        ),
    }
}

/// A relation, tagged by the entity that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Allegation(AllegationRelation),
    Victim(VictimRelation),
    Investigator(InvestigatorRelation),
    Perpetrator(PerpetratorRelation),
}

impl Relation {
    /// Every relation owned by `entity`, in declaration order.
    pub fn of(entity: EntityKind) -> Vec<Relation> {
        match entity {
            EntityKind::Allegation => AllegationRelation::ALL
                .iter()
                .copied()
                .map(Relation::Allegation)
                .collect(),
            EntityKind::Victim => VictimRelation::ALL
                .iter()
                .copied()
                .map(Relation::Victim)
                .collect(),
            EntityKind::Investigator => InvestigatorRelation::ALL
                .iter()
                .copied()
                .map(Relation::Investigator)
                .collect(),
            EntityKind::Perpetrator => PerpetratorRelation::ALL
                .iter()
                .copied()
                .map(Relation::Perpetrator)
                .collect(),
        }
    }

    pub fn parse(entity: EntityKind, name: &str) -> Option<Relation> {
        Self::of(entity).into_iter().find(|r| r.name() == name)
    }

    pub fn owner(self) -> EntityKind {
        match self {
            Relation::Allegation(_) => EntityKind::Allegation,
            Relation::Victim(_) => EntityKind::Victim,
            Relation::Investigator(_) => EntityKind::Investigator,
            Relation::Perpetrator(_) => EntityKind::Perpetrator,
        }
    }

    pub fn spec(self) -> RelationSpec {
        match self {
            Relation::Allegation(r) => r.spec(),
            Relation::Victim(r) => r.spec(),
            Relation::Investigator(r) => r.spec(),
            Relation::Perpetrator(r) => r.spec(),
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn target(self) -> EntityKind {
        self.spec().target
    }

    pub fn cardinality(self) -> Cardinality {
        self.spec().cardinality()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an include materializes related records or only counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IncludeMode {
    Record,
    Count,
}

/// What a resolved relation path yields in a response row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    /// A single related object, or null.
    Single,
    /// An array of related objects.
    Collection,
    /// An integer under `_count.<relation>`.
    Count,
}

/// A relation path after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationInclude {
    pub relation: Relation,
    pub mode: IncludeMode,
}

/// Suffix requesting the reverse-count aggregate of a to-many relation.
pub const COUNT_SUFFIX: &str = ".count";

/// Row key under which relation counts are nested.
pub const COUNT_KEY: &str = "_count";

impl RelationInclude {
    pub fn record(relation: Relation) -> Self {
        Self {
            relation,
            mode: IncludeMode::Record,
        }
    }

    pub fn count(relation: Relation) -> Self {
        Self {
            relation,
            mode: IncludeMode::Count,
        }
    }

    pub fn shape(&self) -> RelationShape {
        match (self.mode, self.relation.cardinality()) {
            (IncludeMode::Count, _) => RelationShape::Count,
            (IncludeMode::Record, Cardinality::One) => RelationShape::Single,
            (IncludeMode::Record, Cardinality::Many) => RelationShape::Collection,
        }
    }

    /// The wire path this include was parsed from.
    pub fn path(&self) -> String {
        match self.mode {
            IncludeMode::Record => self.relation.name().to_string(),
            IncludeMode::Count => format!("{}{}", self.relation.name(), COUNT_SUFFIX),
        }
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Schema of one entity.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub fields: &'static [ScalarField],
    pub relations: Vec<Relation>,
    /// Column shown when a record of this entity is rendered as a link.
    pub display_field: &'static str,
}

impl EntityDescriptor {
    fn new(kind: EntityKind) -> Self {
        let (fields, display_field) = match kind {
            EntityKind::Allegation => (ALLEGATION_FIELDS, "description"),
            EntityKind::Victim => (VICTIM_FIELDS, "incident_description"),
            EntityKind::Investigator => (INVESTIGATOR_FIELDS, "investigation_status"),
            EntityKind::Perpetrator => (PERPETRATOR_FIELDS, "incident_role"),
        };
        Self {
            kind,
            fields,
            relations: Relation::of(kind),
            display_field,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.relations.iter().copied().find(|r| r.name() == name)
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().filter(|f| f.searchable).map(|f| f.name)
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &'static ScalarField> {
        self.fields.iter().filter(|f| f.writable)
    }

    /// Resolve a relation path such as `victim_victim_allegation_idToallegation.count`.
    ///
    /// The count suffix is only meaningful on to-many relations.
    pub fn resolve_relation_path(&self, path: &str) -> CamResult<RelationInclude> {
        let invalid = || CamError::InvalidRelationPath {
            entity: self.kind,
            path: path.to_string(),
        };

        match path.strip_suffix(COUNT_SUFFIX) {
            Some(name) => {
                let relation = self.relation(name).ok_or_else(invalid)?;
                if relation.cardinality() != Cardinality::Many {
                    return Err(invalid());
                }
                Ok(RelationInclude::count(relation))
            }
            None => self
                .relation(path)
                .map(RelationInclude::record)
                .ok_or_else(invalid),
        }
    }
}

/// Registry of every entity descriptor, built once at startup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    descriptors: Vec<EntityDescriptor>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: EntityKind::ALL.into_iter().map(EntityDescriptor::new).collect(),
        }
    }

    /// Look up an entity by its singular name.
    pub fn describe(&self, name: &str) -> CamResult<&EntityDescriptor> {
        EntityKind::from_name(name)
            .map(|kind| self.get(kind))
            .ok_or_else(|| CamError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Look up an entity by its plural route segment.
    pub fn describe_route(&self, route: &str) -> CamResult<&EntityDescriptor> {
        EntityKind::from_route(route)
            .map(|kind| self.get(kind))
            .ok_or_else(|| CamError::UnknownEntity {
                name: route.to_string(),
            })
    }

    pub fn get(&self, kind: EntityKind) -> &EntityDescriptor {
        &self.descriptors[kind.index()]
    }

    pub fn resolve_relation_path(
        &self,
        entity: EntityKind,
        path: &str,
    ) -> CamResult<RelationInclude> {
        self.get(entity).resolve_relation_path(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.descriptors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_and_unknown() {
        let registry = SchemaRegistry::new();
        let allegation = registry.describe("allegation").unwrap();
        assert_eq!(allegation.kind, EntityKind::Allegation);
        assert!(allegation.field("description").is_some());

        let err = registry.describe("user").unwrap_err();
        assert_eq!(
            err,
            CamError::UnknownEntity {
                name: "user".to_string()
            }
        );
    }

    #[test]
    fn test_route_mapping() {
        let registry = SchemaRegistry::new();
        assert_eq!(
            registry.describe_route("perpetrators").unwrap().kind,
            EntityKind::Perpetrator
        );
        assert!(registry.describe_route("perpetrator").is_err());
    }

    #[test]
    fn test_registry_indexing_matches_kind() {
        let registry = SchemaRegistry::new();
        for kind in EntityKind::ALL {
            assert_eq!(registry.get(kind).kind, kind);
        }
    }

    #[test]
    fn test_resolve_relation_shapes() {
        let registry = SchemaRegistry::new();

        let single = registry
            .resolve_relation_path(EntityKind::Allegation, "victim_allegation_victim_idTovictim")
            .unwrap();
        assert_eq!(single.shape(), RelationShape::Single);
        assert_eq!(single.relation.target(), EntityKind::Victim);

        let many = registry
            .resolve_relation_path(
                EntityKind::Allegation,
                "perpetrator_perpetrator_allegation_idToallegation",
            )
            .unwrap();
        assert_eq!(many.shape(), RelationShape::Collection);

        let count = registry
            .resolve_relation_path(
                EntityKind::Allegation,
                "perpetrator_perpetrator_allegation_idToallegation.count",
            )
            .unwrap();
        assert_eq!(count.shape(), RelationShape::Count);
        assert_eq!(
            count.path(),
            "perpetrator_perpetrator_allegation_idToallegation.count"
        );
    }

    #[test]
    fn test_count_suffix_rejected_on_single_relation() {
        let registry = SchemaRegistry::new();
        let err = registry
            .resolve_relation_path(
                EntityKind::Allegation,
                "victim_allegation_victim_idTovictim.count",
            )
            .unwrap_err();
        assert!(matches!(err, CamError::InvalidRelationPath { .. }));
    }

    #[test]
    fn test_relation_path_belongs_to_owner() {
        let registry = SchemaRegistry::new();
        // A victim relation name is not valid on perpetrator.
        assert!(registry
            .resolve_relation_path(
                EntityKind::Perpetrator,
                "allegation_victim_allegation_idToallegation"
            )
            .is_err());
    }

    #[test]
    fn test_every_relation_targets_registered_columns() {
        let registry = SchemaRegistry::new();
        for descriptor in registry.iter() {
            for relation in &descriptor.relations {
                assert_eq!(relation.owner(), descriptor.kind);
                let target = registry.get(relation.target());
                match relation.spec().join {
                    Join::Local(column) => assert!(descriptor.field(column).is_some()),
                    Join::Foreign(column) => assert!(target.field(column).is_some()),
                }
                assert!(target.field(target.display_field).is_some());
            }
        }
    }
}
