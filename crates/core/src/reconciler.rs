//! State reconciliation
//!
//! Merges a server response into the retained UI snapshot. A response whose
//! `ui` is a `UiComponentsDelta` with `modifiedComponents` patches the snapshot
//! by `_cId`; any other response replaces it outright.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

const DELTA_TYPE: &str = "UiComponentsDelta";
const MODIFIED_COMPONENTS: &str = "modifiedComponents";

/// True when `response` carries only modified components
pub fn is_delta(response: &Value) -> bool {
    let Some(ui) = response.get("ui") else {
        return false;
    };
    ui.get("#t").and_then(Value::as_str) == Some(DELTA_TYPE) && ui.get(MODIFIED_COMPONENTS).is_some()
}

/// Merge `response` into `snapshot`, returning the new snapshot
///
/// Every node whose `_cId` appears among the modified components is replaced by
/// the matching component, at every depth it occurs; its old subtree is not
/// searched further. All other nodes are left as they were. The snapshot's
/// `context` is taken from the response.
pub fn reconcile(snapshot: Value, response: Value) -> Value {
    if !is_delta(&response) {
        debug!("Full state replacement");
        return response;
    }

    let replacements = index_modified_components(&response);
    let mut merged = snapshot;
    let replaced = patch(&mut merged, &replacements);
    debug!(
        "Applied delta: {} modified components, {} nodes replaced",
        replacements.len(),
        replaced
    );

    if let Value::Object(map) = &mut merged {
        match response.get("context") {
            Some(context) => {
                map.insert("context".to_string(), context.clone());
            }
            None => {
                map.remove("context");
            }
        }
    }
    merged
}

fn index_modified_components(response: &Value) -> HashMap<String, Value> {
    response["ui"][MODIFIED_COMPONENTS]
        .as_array()
        .map(|components| {
            components
                .iter()
                .filter_map(|c| {
                    c.get("_cId")
                        .and_then(Value::as_str)
                        .map(|cid| (cid.to_string(), c.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn patch(node: &mut Value, replacements: &HashMap<String, Value>) -> usize {
    let replacement = match node {
        Value::Object(map) => map
            .get("_cId")
            .and_then(Value::as_str)
            .and_then(|cid| replacements.get(cid))
            .cloned(),
        _ => None,
    };
    if let Some(replacement) = replacement {
        *node = replacement;
        return 1;
    }

    match node {
        Value::Object(map) => map.values_mut().map(|v| patch(v, replacements)).sum(),
        Value::Array(items) => items.iter_mut().map(|v| patch(v, replacements)).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Value {
        json!({
            "context": {"v": 1},
            "uuid": "u-1",
            "ui": {
                "#t": "FormLayout",
                "contents": [
                    {"_cId": "a", "#t": "TextField", "value": "old-a"},
                    {"_cId": "b", "#t": "TextField", "value": "old-b"},
                    {"#t": "SectionLayout", "contents": [
                        {"_cId": "a", "#t": "TextField", "value": "old-a"},
                        {"#t": "RichTextDisplayField", "value": "static"}
                    ]}
                ]
            }
        })
    }

    fn delta() -> Value {
        json!({
            "context": {"v": 2},
            "ui": {
                "#t": "UiComponentsDelta",
                "modifiedComponents": [
                    {"_cId": "a", "#t": "TextField", "value": "new-a"},
                    {"#t": "NoCid", "value": "ignored"}
                ]
            }
        })
    }

    #[test]
    fn test_full_replace_is_idempotent() {
        let response = json!({"ui": {"#t": "FormLayout", "contents": []}, "context": {"v": 9}});
        let once = reconcile(snapshot(), response.clone());
        let twice = reconcile(once.clone(), response.clone());
        assert_eq!(once, response);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_delta_replaces_every_occurrence() {
        let merged = reconcile(snapshot(), delta());
        let contents = &merged["ui"]["contents"];
        assert_eq!(contents[0]["value"], "new-a");
        assert_eq!(contents[2]["contents"][0]["value"], "new-a");
        assert_eq!(contents[0], contents[2]["contents"][0]);
    }

    #[test]
    fn test_delta_preserves_untouched_nodes() {
        let before = snapshot();
        let merged = reconcile(before.clone(), delta());
        assert_eq!(merged["ui"]["contents"][1], before["ui"]["contents"][1]);
        assert_eq!(merged["ui"]["contents"][2]["contents"][1], before["ui"]["contents"][2]["contents"][1]);
        assert_eq!(merged["uuid"], "u-1");
        assert_eq!(merged["context"], json!({"v": 2}));
    }

    #[test]
    fn test_delta_is_idempotent() {
        let once = reconcile(snapshot(), delta());
        let twice = reconcile(once.clone(), delta());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_delta_without_modified_components_is_full_replace() {
        let response = json!({"ui": {"#t": "UiComponentsDelta"}});
        assert_eq!(reconcile(snapshot(), response.clone()), response);
    }

    #[test]
    fn test_replacement_does_not_descend() {
        let old = json!({"ui": {"_cId": "outer", "contents": [{"_cId": "inner", "value": 1}]}});
        let response = json!({
            "ui": {"#t": "UiComponentsDelta", "modifiedComponents": [
                {"_cId": "outer", "contents": []},
                {"_cId": "inner", "value": 2}
            ]}
        });
        let merged = reconcile(old, response);
        assert_eq!(merged["ui"], json!({"_cId": "outer", "contents": []}));
    }
}
