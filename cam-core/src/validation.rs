//! Write-body validation
//!
//! Checks create and update bodies against an entity's scalar columns and
//! returns the canonical record to persist. Server-managed columns are dropped
//! silently; any other unknown key is an error.
//!
//! [`validate_nested_create`] additionally accepts arrays of child records
//! under a to-many relation name. Each child is validated against its own
//! entity with its join column pointing at the new parent.

use crate::error::{CamError, CamResult};
use crate::identity::{id_value, timestamp_value, Record};
use crate::schema::{
    EntityDescriptor, EntityKind, FieldType, Join, Relation, ScalarField, SchemaRegistry,
    MANAGED_FIELDS,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single invalid field in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every required column must be present.
    Create,
    /// Only the supplied columns are checked.
    Update,
}

/// `YYYY-MM-DD`, also accepting a full RFC 3339 instant.
pub fn canonical_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .map(|date| date.format("%Y-%m-%d").to_string())
}

pub fn canonical_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .and_then(|dt| match timestamp_value(dt.with_timezone(&Utc)) {
            Value::String(s) => Some(s),
            _ => None,
        })
}

fn check_value(field: &ScalarField, value: &Value) -> Result<Value, &'static str> {
    if value.is_null() {
        return if field.required {
            Err("is required")
        } else {
            Ok(Value::Null)
        };
    }

    let Some(raw) = value.as_str() else {
        return Err(match field.ty {
            FieldType::Text => "must be a string",
            FieldType::Id => "must be a UUID",
            FieldType::Date => "must be a date",
            FieldType::Timestamp => "must be a timestamp",
        });
    };

    match field.ty {
        FieldType::Text => {
            if field.required && raw.trim().is_empty() {
                Err("is required")
            } else {
                Ok(Value::String(raw.to_string()))
            }
        }
        FieldType::Id => Uuid::parse_str(raw.trim())
            .map(id_value)
            .map_err(|_| "must be a UUID"),
        FieldType::Date => canonical_date(raw)
            .map(Value::String)
            .ok_or("must be a date"),
        FieldType::Timestamp => canonical_timestamp(raw)
            .map(Value::String)
            .ok_or("must be a timestamp"),
    }
}

/// Validate a request body for `descriptor`.
pub fn validate_write(descriptor: &EntityDescriptor, body: &Value, mode: WriteMode) -> CamResult<Record> {
    let fail = |errors: Vec<FieldError>| CamError::ValidationFailed {
        entity: descriptor.kind,
        errors,
    };

    let Some(object) = body.as_object() else {
        return Err(fail(vec![FieldError::new("body", "must be a JSON object")]));
    };

    let mut errors = Vec::new();
    let mut record = Record::new();

    for (key, value) in object {
        if MANAGED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let Some(field) = descriptor.field(key).filter(|f| f.writable) else {
            errors.push(FieldError::new(key.clone(), "is not a writable field"));
            continue;
        };
        match check_value(field, value) {
            Ok(value) => {
                record.insert(field.name.to_string(), value);
            }
            Err(reason) => errors.push(FieldError::new(field.name, reason)),
        }
    }

    if mode == WriteMode::Create {
        for field in descriptor.writable_fields().filter(|f| f.required) {
            if !object.contains_key(field.name) {
                errors.push(FieldError::new(field.name, "is required"));
            }
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(fail(errors))
    }
}

/// A child record created together with its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedChild {
    pub relation: Relation,
    pub record: Record,
}

impl NestedChild {
    pub fn entity(&self) -> EntityKind {
        self.relation.target()
    }
}

/// A create body split into the parent record and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedCreate {
    pub record: Record,
    pub children: Vec<NestedChild>,
}

fn field_errors(result: CamResult<Record>, errors: &mut Vec<FieldError>) -> CamResult<Option<Record>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(CamError::ValidationFailed { errors: found, .. }) => {
            errors.extend(found);
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

/// Validate a create body that may carry child arrays under to-many
/// relation names.
///
/// Children get their join column set to `parent_id`. An empty array is
/// ignored. Child errors are reported as `<relation>[<index>].<field>`.
pub fn validate_nested_create(
    registry: &SchemaRegistry,
    descriptor: &EntityDescriptor,
    body: &Value,
    parent_id: Uuid,
) -> CamResult<NestedCreate> {
    let Some(object) = body.as_object() else {
        return validate_write(descriptor, body, WriteMode::Create).map(|record| NestedCreate {
            record,
            children: Vec::new(),
        });
    };

    let mut own = serde_json::Map::new();
    let mut nested = Vec::new();
    for (key, value) in object {
        match descriptor
            .relation(key)
            .filter(|r| matches!(r.spec().join, Join::Foreign(_)))
        {
            Some(relation) => nested.push((relation, value)),
            None => {
                own.insert(key.clone(), value.clone());
            }
        }
    }

    let mut errors = Vec::new();
    let record = field_errors(
        validate_write(descriptor, &Value::Object(own), WriteMode::Create),
        &mut errors,
    )?;

    let mut children = Vec::new();
    for (relation, value) in nested {
        let Join::Foreign(column) = relation.spec().join else {
            continue;
        };
        let items = match value {
            Value::Array(items) => items,
            Value::Null => continue,
            _ => {
                errors.push(FieldError::new(relation.name(), "must be an array of objects"));
                continue;
            }
        };
        let child_descriptor = registry.get(relation.target());
        for (index, item) in items.iter().enumerate() {
            let mut item = item.clone();
            if let Some(fields) = item.as_object_mut() {
                fields.insert(column.to_string(), id_value(parent_id));
            }
            let mut child_errors = Vec::new();
            let child = field_errors(
                validate_write(child_descriptor, &item, WriteMode::Create),
                &mut child_errors,
            )?;
            errors.extend(child_errors.into_iter().map(|err| {
                FieldError::new(format!("{}[{}].{}", relation.name(), index, err.field), err.reason)
            }));
            if let Some(record) = child {
                children.push(NestedChild { relation, record });
            }
        }
    }

    match record {
        Some(record) if errors.is_empty() => Ok(NestedCreate { record, children }),
        _ => Err(CamError::ValidationFailed {
            entity: descriptor.kind,
            errors,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AllegationRelation;
    use serde_json::json;

    fn descriptor(kind: EntityKind) -> EntityDescriptor {
        SchemaRegistry::new().get(kind).clone()
    }

    fn errors_of(result: CamResult<Record>) -> Vec<FieldError> {
        match result {
            Err(CamError::ValidationFailed { errors, .. }) => errors,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_allegation_create_requires_all_fields() {
        let errors = errors_of(validate_write(
            &descriptor(EntityKind::Allegation),
            &json!({"description": "theft case"}),
            WriteMode::Create,
        ));
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["status", "victim_id", "investigator_id", "perpetrator_id"]
        );
    }

    #[test]
    fn test_blank_required_text_rejected() {
        let errors = errors_of(validate_write(
            &descriptor(EntityKind::Allegation),
            &json!({"status": "  "}),
            WriteMode::Update,
        ));
        assert_eq!(errors, vec![FieldError::new("status", "is required")]);
    }

    #[test]
    fn test_managed_fields_stripped_and_values_canonicalized() {
        let user = Uuid::from_u128(5);
        let record = validate_write(
            &descriptor(EntityKind::Victim),
            &json!({
                "id": "ignored",
                "tenant_id": "ignored",
                "created_at": "ignored",
                "user_id": user.to_string().to_uppercase(),
                "allegation_id": Uuid::from_u128(6).to_string(),
                "incident_date": "2024-03-05T10:00:00Z",
                "incident_location": null,
            }),
            WriteMode::Create,
        )
        .unwrap();

        assert!(!record.contains_key("id"));
        assert!(!record.contains_key("tenant_id"));
        assert_eq!(record["user_id"], id_value(user));
        assert_eq!(record["incident_date"], json!("2024-03-05"));
        assert_eq!(record["incident_location"], Value::Null);
    }

    #[test]
    fn test_unknown_and_relation_keys_rejected() {
        let errors = errors_of(validate_write(
            &descriptor(EntityKind::Perpetrator),
            &json!({
                "severity": "high",
                "allegation_perpetrator_allegation_idToallegation": {"create": {}},
            }),
            WriteMode::Update,
        ));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.reason == "is not a writable field"));
    }

    #[test]
    fn test_type_errors() {
        let errors = errors_of(validate_write(
            &descriptor(EntityKind::Investigator),
            &json!({
                "investigation_date": "yesterday",
                "investigation_status": 3,
                "assigned_allegation_id": "abc",
            }),
            WriteMode::Update,
        ));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_non_object_body() {
        let errors = errors_of(validate_write(
            &descriptor(EntityKind::Victim),
            &json!([1, 2]),
            WriteMode::Create,
        ));
        assert_eq!(errors[0].field, "body");
    }

    #[test]
    fn test_canonical_timestamp_normalizes_offset() {
        assert_eq!(
            canonical_timestamp("2024-01-01T02:00:00+02:00").as_deref(),
            Some("2024-01-01T00:00:00.000000Z")
        );
        assert_eq!(canonical_timestamp("2024-01-01"), None);
    }

    fn allegation_body(extra: Value) -> Value {
        let mut body = json!({
            "description": "stolen bicycle",
            "status": "open",
            "victim_id": Uuid::from_u128(1).to_string(),
            "investigator_id": Uuid::from_u128(2).to_string(),
            "perpetrator_id": Uuid::from_u128(3).to_string(),
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        body
    }

    #[test]
    fn test_nested_children_get_parent_id() {
        let registry = SchemaRegistry::new();
        let parent = Uuid::from_u128(99);
        let nested = validate_nested_create(
            &registry,
            registry.get(EntityKind::Allegation),
            &allegation_body(json!({
                "victim_victim_allegation_idToallegation": [
                    {"user_id": Uuid::from_u128(7).to_string(), "incident_description": "bike"}
                ],
                "investigator_investigator_assigned_allegation_idToallegation": [
                    {"user_id": Uuid::from_u128(8).to_string()}
                ],
                "perpetrator_perpetrator_allegation_idToallegation": [],
            })),
            parent,
        )
        .unwrap();

        assert!(!nested.record.contains_key("victim_victim_allegation_idToallegation"));
        assert_eq!(nested.children.len(), 2);
        let victim = nested
            .children
            .iter()
            .find(|c| c.relation == Relation::Allegation(AllegationRelation::Victims))
            .unwrap();
        assert_eq!(victim.entity(), EntityKind::Victim);
        assert_eq!(victim.record["allegation_id"], id_value(parent));
        let investigator = nested
            .children
            .iter()
            .find(|c| c.entity() == EntityKind::Investigator)
            .unwrap();
        assert_eq!(investigator.record["assigned_allegation_id"], id_value(parent));
    }

    #[test]
    fn test_nested_child_errors_are_prefixed() {
        let registry = SchemaRegistry::new();
        let errors = match validate_nested_create(
            &registry,
            registry.get(EntityKind::Allegation),
            &allegation_body(json!({
                "victim_victim_allegation_idToallegation": [{"incident_description": "bike"}],
                "perpetrator_perpetrator_allegation_idToallegation": {"user_id": "x"},
            })),
            Uuid::from_u128(99),
        ) {
            Err(CamError::ValidationFailed { errors, .. }) => errors,
            other => panic!("expected validation failure, got {:?}", other),
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"victim_victim_allegation_idToallegation[0].user_id"));
        assert!(fields.contains(&"perpetrator_perpetrator_allegation_idToallegation"));
    }

    #[test]
    fn test_to_one_relation_is_not_nestable() {
        let registry = SchemaRegistry::new();
        let result = validate_nested_create(
            &registry,
            registry.get(EntityKind::Allegation),
            &allegation_body(json!({"victim_allegation_victim_idTovictim": [{}]})),
            Uuid::from_u128(99),
        );
        assert!(matches!(result, Err(CamError::ValidationFailed { .. })));
    }
}
