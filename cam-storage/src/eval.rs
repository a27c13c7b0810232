//! Predicate evaluation and row ordering over JSON records.

use cam_core::{record_id, Join, OrderSpec, Predicate, Record, SortDirection, EntityKind};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// Read access to every table, needed to follow `Related` predicates.
pub trait RecordSource {
    fn record(&self, entity: EntityKind, id: Uuid) -> Option<&Record>;

    fn records(&self, entity: EntityKind) -> Box<dyn Iterator<Item = &Record> + '_>;
}

/// Evaluate `predicate` against `record`.
pub fn matches(source: &dyn RecordSource, predicate: &Predicate, record: &Record) -> bool {
    match predicate {
        Predicate::Eq { field, value } => record.get(*field).unwrap_or(&Value::Null) == value,
        Predicate::In { field, values } => {
            let actual = record.get(*field).unwrap_or(&Value::Null);
            values.iter().any(|v| v == actual)
        }
        Predicate::Contains { field, needle } => record
            .get(*field)
            .and_then(Value::as_str)
            .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        Predicate::And(parts) => parts.iter().all(|p| matches(source, p, record)),
        Predicate::Or(parts) => parts.iter().any(|p| matches(source, p, record)),
        Predicate::Related {
            relation,
            predicate,
        } => {
            let spec = relation.spec();
            match spec.join {
                Join::Local(column) => record_id(record, column)
                    .and_then(|id| source.record(spec.target, id))
                    .map(|target| matches(source, predicate, target))
                    .unwrap_or(false),
                Join::Foreign(column) => {
                    let Some(own_id) = record.get("id") else {
                        return false;
                    };
                    source
                        .records(spec.target)
                        .filter(|target| target.get(column) == Some(own_id))
                        .any(|target| matches(source, predicate, target))
                }
            }
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values; missing and null sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare two rows by a multi-key order.
pub fn compare_records(order: &[OrderSpec], a: &Record, b: &Record) -> Ordering {
    for key in order {
        let ordering = compare_values(a.get(key.field), b.get(key.field));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
