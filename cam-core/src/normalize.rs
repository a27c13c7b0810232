//! Query Parameter Normalizer
//!
//! Converts raw list-request parameters into a validated [`QueryDescriptor`].
//!
//! Recognized keys (a trailing `[]` or `[n]` is accepted on every key):
//!
//! | key              | meaning                                               |
//! |------------------|-------------------------------------------------------|
//! | `limit`          | page size, default 20, clamped to the server maximum  |
//! | `offset`         | rows to skip, default 0                               |
//! | `order`          | `{"id":..,"desc":..}` JSON, `field`, or `field:desc`  |
//! | `order[n][id]`   | indexed form, paired with `order[n][desc]`            |
//! | `searchTerm`     | free-text term                                        |
//! | `searchTermKeys` | `field` or `field.contains`                           |
//! | `relations`      | relation path, optionally with `.count`               |
//! | anything else    | a scalar column filter                                |
//!
//! Ordering is permissive (unknown columns are dropped) while filters, search
//! keys and relation paths are strict.

use crate::error::{CamError, CamResult};
use crate::identity::id_value;
use crate::query::{FieldPredicate, OrderSpec, QueryDescriptor, DEFAULT_LIMIT, MAX_LIMIT};
use crate::schema::{EntityDescriptor, FieldType, ScalarField};
use crate::validation::{canonical_date, canonical_timestamp, FieldError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const CONTAINS_SUFFIX: &str = ".contains";

#[derive(Debug, Deserialize)]
struct OrderParam {
    id: String,
    #[serde(default)]
    desc: bool,
}

#[derive(Debug, Default)]
struct IndexedOrder {
    id: Option<String>,
    desc: bool,
}

/// Stateless normalizer carrying the server's page-size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    max_limit: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            max_limit: MAX_LIMIT,
        }
    }
}

impl Normalizer {
    pub fn new(max_limit: u32) -> Self {
        Self {
            max_limit: max_limit.max(1),
        }
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    pub fn normalize<K, V>(
        &self,
        descriptor: &EntityDescriptor,
        params: &[(K, V)],
    ) -> CamResult<QueryDescriptor>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entity = descriptor.kind;
        let mut limit = None;
        let mut offset = None;
        let mut search_term = None;
        let mut search_keys: Vec<&str> = Vec::new();
        let mut order_values: Vec<&str> = Vec::new();
        let mut indexed_order: BTreeMap<usize, IndexedOrder> = BTreeMap::new();
        let mut relations = BTreeSet::new();
        let mut filters = BTreeMap::new();

        for (raw_key, raw_value) in params {
            let raw_key = raw_key.as_ref();
            let value = raw_value.as_ref();
            let (base, segments) = split_key(raw_key);

            match base {
                "limit" => limit = Some(value),
                "offset" => offset = Some(value),
                "searchTerm" => search_term = Some(value),
                "searchTermKeys" => {
                    if !value.is_empty() {
                        search_keys.push(value);
                    }
                }
                "relations" => {
                    if !value.is_empty() {
                        relations.insert(descriptor.resolve_relation_path(value)?);
                    }
                }
                "order" => match segments.as_slice() {
                    [index, prop] => {
                        let Ok(index) = index.parse::<usize>() else {
                            continue;
                        };
                        let slot = indexed_order.entry(index).or_default();
                        match *prop {
                            "id" => slot.id = Some(value.to_string()),
                            "desc" => slot.desc = value.eq_ignore_ascii_case("true"),
                            _ => {}
                        }
                    }
                    _ => order_values.push(value),
                },
                column => {
                    if segments.iter().any(|s| !s.is_empty() && s.parse::<usize>().is_err()) {
                        return Err(CamError::invalid_field(entity, raw_key));
                    }
                    let field = descriptor
                        .field(column)
                        .ok_or_else(|| CamError::invalid_field(entity, column))?;
                    if value.is_empty() {
                        continue;
                    }
                    filters.insert(field.name, field_predicate(descriptor, field, value)?);
                }
            }
        }

        let mut order: Vec<OrderSpec> = Vec::new();
        let requested = order_values
            .into_iter()
            .filter_map(parse_order_value)
            .chain(
                indexed_order
                    .into_values()
                    .filter_map(|o| o.id.map(|id| (id, o.desc))),
            );
        for (name, desc) in requested {
            let Some(field) = descriptor.field(&name) else {
                continue;
            };
            if order.iter().any(|o| o.field == field.name) {
                continue;
            }
            order.push(if desc {
                OrderSpec::desc(field.name)
            } else {
                OrderSpec::asc(field.name)
            });
        }
        if order.is_empty() {
            order.push(OrderSpec::desc("created_at"));
        }
        if !order.iter().any(|o| o.field == "id") {
            order.push(OrderSpec::asc("id"));
        }

        let mut search_fields: Vec<&'static str> = Vec::new();
        for key in search_keys {
            let name = key.strip_suffix(CONTAINS_SUFFIX).unwrap_or(key);
            let field = descriptor
                .field(name)
                .filter(|f| f.ty == FieldType::Text)
                .ok_or_else(|| CamError::invalid_field(entity, key))?;
            if !search_fields.contains(&field.name) {
                search_fields.push(field.name);
            }
        }
        if search_fields.is_empty() {
            search_fields = descriptor.searchable_fields().collect();
        }

        let search_term = search_term
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        Ok(QueryDescriptor {
            entity,
            filters,
            search_term,
            search_fields,
            order,
            relations,
            limit: self.parse_limit(limit),
            offset: offset
                .and_then(leading_integer)
                .filter(|v| *v >= 0)
                .map(|v| v as u64)
                .unwrap_or(0),
        })
    }

    fn parse_limit(&self, raw: Option<&str>) -> u32 {
        raw.and_then(leading_integer)
            .filter(|v| *v > 0)
            .map(|v| v.min(i64::from(self.max_limit)) as u32)
            .unwrap_or(DEFAULT_LIMIT)
            .min(self.max_limit)
    }
}

/// Leading decimal integer of `raw`, ignoring trailing junk (`"50abc"` is 50).
/// Out-of-range values saturate.
fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, rest) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Normalize with the default page-size ceiling.
pub fn normalize<K, V>(descriptor: &EntityDescriptor, params: &[(K, V)]) -> CamResult<QueryDescriptor>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    Normalizer::default().normalize(descriptor, params)
}

/// Split `order[0][id]` into `("order", ["0", "id"])`.
fn split_key(raw: &str) -> (&str, Vec<&str>) {
    let Some(open) = raw.find('[') else {
        return (raw, Vec::new());
    };
    let base = &raw[..open];
    let segments = raw[open..]
        .split(']')
        .filter_map(|part| part.strip_prefix('['))
        .collect();
    (base, segments)
}

fn parse_order_value(raw: &str) -> Option<(String, bool)> {
    let raw = raw.trim();
    if raw.starts_with('{') {
        return serde_json::from_str::<OrderParam>(raw)
            .ok()
            .map(|o| (o.id, o.desc));
    }
    match raw.split_once(':') {
        None if !raw.is_empty() => Some((raw.to_string(), false)),
        None => None,
        Some((field, direction)) => match direction.to_ascii_lowercase().as_str() {
            "asc" => Some((field.to_string(), false)),
            "desc" => Some((field.to_string(), true)),
            _ => None,
        },
    }
}

fn field_predicate(
    descriptor: &EntityDescriptor,
    field: &ScalarField,
    value: &str,
) -> CamResult<FieldPredicate> {
    let bad_value = |reason: &str| CamError::ValidationFailed {
        entity: descriptor.kind,
        errors: vec![FieldError::new(field.name, reason)],
    };

    Ok(match field.ty {
        FieldType::Text => FieldPredicate::Contains(value.to_string()),
        FieldType::Id => {
            let id = Uuid::parse_str(value.trim()).map_err(|_| bad_value("must be a UUID"))?;
            FieldPredicate::Equals(id_value(id))
        }
        FieldType::Date => {
            let date = canonical_date(value).ok_or_else(|| bad_value("must be a date"))?;
            FieldPredicate::Equals(Value::String(date))
        }
        FieldType::Timestamp => {
            let ts = canonical_timestamp(value).ok_or_else(|| bad_value("must be an RFC 3339 timestamp"))?;
            FieldPredicate::Equals(Value::String(ts))
        }
    })
}
