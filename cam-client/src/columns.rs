//! Column layout for list pages.
//!
//! A list page shows the entity's own columns, one link column per to-one
//! relation and one count column per to-many relation. Relation columns are
//! dropped when the caller cannot read the target entity.

use crate::api_client::Permissions;
use cam_core::{
    Cardinality, EntityDescriptor, EntityKind, Operation, Record, Relation, RelationInclude,
    SchemaRegistry, COUNT_KEY, TENANT_FIELD,
};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(&'static str),
    /// Shows the related record's display field.
    Link {
        relation: Relation,
        display_field: &'static str,
    },
    Count(Relation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn scalar(name: &'static str) -> Self {
        Self {
            header: name.to_string(),
            kind: ColumnKind::Scalar(name),
        }
    }

    /// Relation path the server needs in `relations` to fill this column.
    pub fn relation_path(&self) -> Option<String> {
        match &self.kind {
            ColumnKind::Scalar(_) => None,
            ColumnKind::Link { relation, .. } => Some(RelationInclude::record(*relation).path()),
            ColumnKind::Count(relation) => Some(RelationInclude::count(*relation).path()),
        }
    }

    /// Text shown for `row` in this column.
    pub fn cell(&self, row: &Record) -> String {
        match &self.kind {
            ColumnKind::Scalar(name) => display(row.get(*name)),
            ColumnKind::Link {
                relation,
                display_field,
            } => match row.get(relation.name()) {
                Some(Value::Object(target)) => display(target.get(*display_field)),
                _ => String::new(),
            },
            ColumnKind::Count(relation) => row
                .get(COUNT_KEY)
                .and_then(|counts| counts.get(relation.name()))
                .and_then(Value::as_u64)
                .map(|n| n.to_string())
                .unwrap_or_default(),
        }
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Columns for `descriptor`'s list page as seen by a caller with `permissions`.
pub fn columns_for(
    registry: &SchemaRegistry,
    descriptor: &EntityDescriptor,
    permissions: &Permissions,
) -> Vec<Column> {
    let mut columns: Vec<Column> = descriptor
        .fields
        .iter()
        .filter(|f| f.name != TENANT_FIELD && f.name != "updated_at")
        .map(|f| Column::scalar(f.name))
        .collect();

    for relation in &descriptor.relations {
        let target = relation.target();
        if !permissions.allows(target, Operation::Read) {
            continue;
        }
        let header = relation_header(*relation, target);
        let kind = match relation.cardinality() {
            Cardinality::One => ColumnKind::Link {
                relation: *relation,
                display_field: registry.get(target).display_field,
            },
            Cardinality::Many => ColumnKind::Count(*relation),
        };
        columns.push(Column { header, kind });
    }
    columns
}

fn relation_header(relation: Relation, target: EntityKind) -> String {
    match relation.cardinality() {
        Cardinality::One => target.name().to_string(),
        Cardinality::Many => format!("# {}", target.route()),
    }
}

/// Relation paths a page must request to fill `columns`.
pub fn relation_paths(columns: &[Column]) -> Vec<String> {
    columns.iter().filter_map(Column::relation_path).collect()
}

/// Actions the caller may take on an entity's list page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowAffordances {
    pub create: bool,
    pub view: bool,
    pub edit: bool,
    pub delete: bool,
}

impl RowAffordances {
    pub fn for_entity(permissions: &Permissions, entity: EntityKind) -> Self {
        Self {
            create: permissions.allows(entity, Operation::Create),
            view: permissions.allows(entity, Operation::Read),
            edit: permissions.allows(entity, Operation::Update),
            delete: permissions.allows(entity, Operation::Delete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_api::routes::access::AccessResponse;
    use cam_core::AllegationRelation;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    fn permissions(grants: &[(&str, &[Operation])]) -> Permissions {
        let permissions: BTreeMap<String, BTreeSet<Operation>> = grants
            .iter()
            .map(|(entity, ops)| (entity.to_string(), ops.iter().copied().collect()))
            .collect();
        Permissions(AccessResponse {
            roles: BTreeSet::new(),
            permissions,
        })
    }

    fn allegation_columns(grants: &[(&str, &[Operation])]) -> Vec<Column> {
        let registry = SchemaRegistry::new();
        columns_for(
            &registry,
            registry.get(EntityKind::Allegation),
            &permissions(grants),
        )
    }

    #[test]
    fn test_relation_columns_hidden_without_target_read() {
        let columns = allegation_columns(&[("allegation", &[Operation::Read])]);
        assert!(columns
            .iter()
            .all(|c| matches!(c.kind, ColumnKind::Scalar(_))));
        assert!(relation_paths(&columns).is_empty());
    }

    #[test]
    fn test_readable_targets_get_link_and_count_columns() {
        let columns = allegation_columns(&[
            ("allegation", &[Operation::Read]),
            ("victim", &[Operation::Read]),
        ]);
        let paths = relation_paths(&columns);
        assert!(paths.contains(&"victim_allegation_victim_idTovictim".to_string()));
        assert!(paths.contains(&"victim_victim_allegation_idToallegation.count".to_string()));
        assert!(!paths.iter().any(|p| p.starts_with("perpetrator")));
    }

    #[test]
    fn test_cells_read_links_and_counts() {
        let victims = Relation::Allegation(AllegationRelation::Victims);
        let victim = Relation::Allegation(AllegationRelation::Victim);
        let row = json!({
            "description": "theft case",
            victim.name(): { "incident_description": "bike stolen" },
            "_count": { victims.name(): 2 },
        })
        .as_object()
        .cloned()
        .unwrap();

        let link = Column {
            header: "victim".to_string(),
            kind: ColumnKind::Link {
                relation: victim,
                display_field: "incident_description",
            },
        };
        let count = Column {
            header: "# victims".to_string(),
            kind: ColumnKind::Count(victims),
        };

        assert_eq!(Column::scalar("description").cell(&row), "theft case");
        assert_eq!(link.cell(&row), "bike stolen");
        assert_eq!(count.cell(&row), "2");
        assert_eq!(Column::scalar("status").cell(&row), "");
    }

    #[test]
    fn test_affordances_follow_permissions() {
        let perms = permissions(&[("victim", &[Operation::Read, Operation::Update])]);
        assert_eq!(
            RowAffordances::for_entity(&perms, EntityKind::Victim),
            RowAffordances {
                create: false,
                view: true,
                edit: true,
                delete: false,
            }
        );
        assert_eq!(
            RowAffordances::for_entity(&perms, EntityKind::Perpetrator),
            RowAffordances::default()
        );
    }
}
