//! Component search over a UI tree
//!
//! A UI tree is an arbitrarily nested mix of JSON objects and arrays. Interactive
//! nodes carry a `#t` type tag; most carry a `label`, `testLabel` or `_cId`.
//!
//! Traversal order is fixed: a node is tested before its children, and its
//! children are placed at the *front* of the remaining work, in document order.
//! That makes the walk near depth-first with first-match-wins semantics, which
//! decides which of several same-labelled components is "index 1". Scripts
//! depend on this order, so it must not change.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Key holding a component's type discriminator
pub const TYPE_KEY: &str = "#t";

/// Filters for a single component lookup
///
/// Both filters are optional. With neither set the query matches every object
/// in the tree, so `index` alone picks the index'th object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentQuery<'q> {
    component_type: Option<&'q str>,
    attribute: Option<(&'q str, &'q str)>,
    index: i64,
}

impl Default for ComponentQuery<'_> {
    fn default() -> Self {
        Self {
            component_type: None,
            attribute: None,
            index: 1,
        }
    }
}

impl<'q> ComponentQuery<'q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match nodes whose `#t` equals `component_type`
    pub fn of_type(mut self, component_type: &'q str) -> Self {
        self.component_type = Some(component_type).filter(|t| !t.is_empty());
        self
    }

    /// Only match nodes whose `attribute` equals `value`
    pub fn with_attribute(mut self, attribute: &'q str, value: &'q str) -> Self {
        self.attribute = Some((attribute, value)).filter(|(a, _)| !a.is_empty());
        self
    }

    /// 1-based occurrence to return
    pub fn at_index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    fn validate(&self) -> Result<()> {
        if self.index == 0 {
            return Err(Error::InvalidIndex {
                index: self.index,
                reason: "Please enter a positive number. Indexing is 1-based to match the protocol's indexing convention"
                    .to_string(),
            });
        }
        if self.index < 0 {
            return Err(Error::InvalidIndex {
                index: self.index,
                reason: "Please enter a positive number".to_string(),
            });
        }
        Ok(())
    }

    fn type_matches(&self, node: &Map<String, Value>) -> bool {
        match self.component_type {
            None => true,
            Some(t) => attribute_equals(node, TYPE_KEY, t),
        }
    }

    fn attribute_matches(&self, node: &Map<String, Value>) -> bool {
        match self.attribute {
            None => true,
            Some((attribute, value)) => attribute_equals(node, attribute, value),
        }
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = self.component_type {
            parts.push(format!("type '{}'", t));
        }
        if let Some((a, v)) = self.attribute {
            parts.push(format!("{} '{}'", a, v));
        }
        if parts.is_empty() {
            "any component".to_string()
        } else {
            parts.join(" and ")
        }
    }
}

/// A missing attribute compares as the empty string; non-string values never match.
fn attribute_equals(node: &Map<String, Value>, attribute: &str, value: &str) -> bool {
    match node.get(attribute) {
        None => value.is_empty(),
        Some(Value::String(s)) => s == value,
        Some(_) => false,
    }
}

/// Walks `tree` in search order, handing every object to `visit` until it returns false.
fn walk<'a>(tree: &'a Value, mut visit: impl FnMut(&'a Value, &'a Map<String, Value>) -> bool) {
    let mut pending: Vec<&'a Value> = vec![tree];
    while let Some(node) = pending.pop() {
        match node {
            Value::Array(items) => pending.extend(items.iter().rev()),
            Value::Object(map) => {
                if !visit(node, map) {
                    return;
                }
                pending.extend(map.values().rev());
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct MatchTrackers {
    type_seen: bool,
    attribute_seen: bool,
    both_seen: bool,
}

/// Find the index'th component matching `query`, or `None` when it does not exist
///
/// A zero or negative index is still an error.
pub fn try_find_component<'a>(tree: &'a Value, query: &ComponentQuery<'_>) -> Result<Option<&'a Value>> {
    query.validate()?;
    Ok(search(tree, query).0)
}

/// Find the index'th component matching `query`
///
/// The error distinguishes a type that never appears, an attribute value that
/// never appears, the two appearing only on different nodes, and an index past
/// the number of matches.
pub fn find_component<'a>(tree: &'a Value, query: &ComponentQuery<'_>) -> Result<&'a Value> {
    query.validate()?;
    let (found, trackers) = search(tree, query);
    if let Some(component) = found {
        return Ok(component);
    }

    if let Some(t) = query.component_type {
        if !trackers.type_seen {
            return Err(Error::ComponentNotFound(format!(
                "No components with type '{}' found on page",
                t
            )));
        }
    }
    if let Some((attribute, value)) = query.attribute {
        if !trackers.attribute_seen {
            return Err(Error::ComponentNotFound(format!(
                "No components with {} '{}' found on page",
                attribute, value
            )));
        }
    }
    if trackers.both_seen {
        return Err(Error::IndexOutOfRange { index: query.index });
    }
    let (attribute, value) = query.attribute.unwrap_or(("", ""));
    Err(Error::ComponentNotFound(format!(
        "Type '{}' and {} '{}' found, but on different components",
        query.component_type.unwrap_or(""),
        attribute,
        value
    )))
}

fn search<'a>(tree: &'a Value, query: &ComponentQuery<'_>) -> (Option<&'a Value>, MatchTrackers) {
    let mut trackers = MatchTrackers::default();
    let mut remaining = query.index;
    let mut found: Option<&'a Value> = None;

    walk(tree, |value, node| {
        let type_ok = query.type_matches(node);
        let attribute_ok = query.attribute_matches(node);
        trackers.type_seen |= type_ok;
        trackers.attribute_seen |= attribute_ok;
        if type_ok && attribute_ok {
            trackers.both_seen = true;
            if remaining == 1 {
                found = Some(value);
                return false;
            }
            remaining -= 1;
        }
        true
    });

    (found, trackers)
}

/// Number of components matching the filters of `query`, ignoring its index
pub fn count_matches(tree: &Value, query: &ComponentQuery<'_>) -> usize {
    let mut count = 0;
    walk(tree, |_, node| {
        if query.type_matches(node) && query.attribute_matches(node) {
            count += 1;
        }
        true
    });
    count
}

/// First component whose `attribute` equals `value`
pub fn find_by_attribute<'a>(tree: &'a Value, attribute: &str, value: &str) -> Result<&'a Value> {
    try_find_component(tree, &ComponentQuery::new().with_attribute(attribute, value))?.ok_or_else(|| {
        Error::ComponentNotFound(format!(
            "Could not find the component with {} '{}' in the provided form",
            attribute, value
        ))
    })
}

/// First component of `component_type` whose `attribute` equals `value`
pub fn find_by_label_and_type<'a>(
    tree: &'a Value,
    attribute: &str,
    value: &str,
    component_type: &str,
) -> Result<&'a Value> {
    find_component(
        tree,
        &ComponentQuery::new()
            .of_type(component_type)
            .with_attribute(attribute, value),
    )
}

/// The index'th component of `component_type` (1-based)
pub fn find_by_index<'a>(tree: &'a Value, component_type: &str, index: i64) -> Result<&'a Value> {
    find_component(
        tree,
        &ComponentQuery::new().of_type(component_type).at_index(index),
    )
}

/// The index'th component whose `attribute` equals `value` (1-based)
pub fn find_by_attribute_and_index<'a>(
    tree: &'a Value,
    attribute: &str,
    value: &str,
    index: i64,
) -> Result<&'a Value> {
    find_component(
        tree,
        &ComponentQuery::new()
            .with_attribute(attribute, value)
            .at_index(index),
    )
}

/// Every object holding a scalar `key` whose value is one of `values`
///
/// Unlike [`find_component`] this collects all matches. Nested containers are
/// searched before the enclosing object is yielded.
pub fn extract_values_multiple<'a>(tree: &'a Value, key: &str, values: &[Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_by_key_value(tree, key, values, &mut out);
    out
}

/// Every object holding `key` equal to `value`
pub fn extract_values<'a>(tree: &'a Value, key: &str, value: &Value) -> Vec<&'a Value> {
    extract_values_multiple(tree, key, std::slice::from_ref(value))
}

fn collect_by_key_value<'a>(node: &'a Value, key: &str, values: &[Value], out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                if v.is_object() || v.is_array() {
                    collect_by_key_value(v, key, values, out);
                } else if k == key && values.contains(v) {
                    out.push(node);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_by_key_value(item, key, values, out);
            }
        }
        _ => {}
    }
}

/// Every value stored under `label`, at any depth, depth-first
pub fn extract_all_by_label<'a>(tree: &'a Value, label: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_by_label(tree, label, &mut out);
    out
}

fn collect_by_label<'a>(node: &'a Value, label: &str, out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                if k == label {
                    out.push(v);
                }
                collect_by_label(v, label, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_by_label(item, label, out);
            }
        }
        _ => {}
    }
}

/// Strips `{"#t", "#v"}` wrappers, leaving plain nested values
pub fn remove_type_info(tree: &Value) -> Value {
    match tree {
        Value::Array(items) => Value::Array(items.iter().map(unwrap_typed).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), unwrap_typed(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn unwrap_typed(value: &Value) -> Value {
    match value.get("#v") {
        Some(inner) if value.is_object() => remove_type_info(inner),
        _ => remove_type_info(value),
    }
}
