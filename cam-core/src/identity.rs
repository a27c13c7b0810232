//! Identity types for CAM records

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Tenant identifier. Every stored record carries one in `tenant_id`.
pub type TenantId = Uuid;

/// Identifier of an authenticated user (the JWT subject).
pub type UserId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A stored record: a flat JSON object keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Canonical wire form of an id inside a record.
pub fn id_value(id: Uuid) -> serde_json::Value {
    serde_json::Value::String(id.to_string())
}

/// Canonical wire form of a timestamp: RFC 3339, microseconds, `Z` suffix.
/// Fixed width, so lexical order matches chronological order.
pub fn timestamp_value(ts: Timestamp) -> serde_json::Value {
    serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Read a UUID column out of a record, if present and well formed.
pub fn record_id(record: &Record, column: &str) -> Option<Uuid> {
    record
        .get(column)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_parses_canonical_and_rejects_garbage() {
        let id = new_entity_id();
        let mut record = Record::new();
        record.insert("id".to_string(), id_value(id));
        record.insert("victim_id".to_string(), serde_json::json!("not-a-uuid"));

        assert_eq!(record_id(&record, "id"), Some(id));
        assert_eq!(record_id(&record, "victim_id"), None);
        assert_eq!(record_id(&record, "missing"), None);
    }
}
