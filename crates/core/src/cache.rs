//! Datatype id cache
//!
//! Responses may carry a `#s` schema section listing the datatypes used by the
//! form. The ids are collected once and forwarded as a header on later
//! requests so the server can skip re-sending them.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// Header carrying the cached datatype ids
pub const DATATYPE_HEADER: &str = "X-Appian-Cached-Datatypes";

/// Append-only set of datatype ids, shared between sessions
#[derive(Debug, Clone, Default)]
pub struct DatatypeCache {
    ids: Arc<RwLock<BTreeSet<String>>>,
}

impl DatatypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the datatype ids listed in `response`, if any
    pub fn cache(&self, response: &Value) {
        let Some(schema) = response.get("#s") else {
            return;
        };
        let is_datatype_list = schema
            .get("#t")
            .and_then(Value::as_str)
            .map_or(false, |t| t.ends_with("DataType?list"));
        if !is_datatype_list {
            return;
        }

        let Some(datatypes) = schema.get("#v").and_then(Value::as_array) else {
            return;
        };
        let mut ids = self.ids.write();
        for datatype in datatypes {
            match datatype.get("id") {
                Some(Value::String(id)) => {
                    ids.insert(id.clone());
                }
                Some(Value::Number(id)) => {
                    ids.insert(id.to_string());
                }
                _ => {}
            }
        }
        debug!("Datatype cache holds {} ids", ids.len());
    }

    /// Comma-joined ids, for the request header
    pub fn header_value(&self) -> String {
        self.ids.read().iter().cloned().collect::<Vec<_>>().join(",")
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collects_datatype_ids() {
        let cache = DatatypeCache::new();
        cache.cache(&json!({"#s": {"#t": "Type?DataType?list", "#v": [{"id": 12}, {"id": "7"}]}}));
        cache.cache(&json!({"#s": {"#t": "Other?list", "#v": [{"id": 99}]}}));
        cache.cache(&json!({"ui": {}}));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.header_value(), "12,7");
    }

    #[test]
    fn test_shared_between_clones() {
        let cache = DatatypeCache::new();
        let other = cache.clone();
        other.cache(&json!({"#s": {"#t": "DataType?list", "#v": [{"id": 1}]}}));
        assert_eq!(cache.header_value(), "1");
    }
}
