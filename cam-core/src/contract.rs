//! Client-side list query contract.
//!
//! The shape a list page sends to `GET /api/{entities}`. [`ListQuery::to_params`]
//! produces exactly the key/value pairs the normalizer consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sort key as the list page holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParam {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

impl OrderParam {
    pub fn asc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: false,
        }
    }

    pub fn desc(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub relations: Vec<String>,
    pub limit: u32,
    pub offset: u64,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub order: Vec<OrderParam>,
    #[serde(default)]
    pub search_term_keys: Vec<String>,
    /// Column filters, keyed by column name.
    #[serde(default, flatten)]
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];

        for relation in &self.relations {
            params.push(("relations[]".to_string(), relation.clone()));
        }
        for order in &self.order {
            let direction = if order.desc { "desc" } else { "asc" };
            params.push(("order[]".to_string(), format!("{}:{}", order.id, direction)));
        }
        if !self.search_term.trim().is_empty() {
            params.push(("searchTerm".to_string(), self.search_term.clone()));
            for key in &self.search_term_keys {
                params.push(("searchTermKeys[]".to_string(), key.clone()));
            }
        }
        for (field, value) in &self.filters {
            if !value.is_empty() {
                params.push((field.clone(), value.clone()));
            }
        }
        params
    }
}
