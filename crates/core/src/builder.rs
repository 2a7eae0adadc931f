//! Save request construction
//!
//! A save request tells the server to apply a new value through a component's
//! `saveInto` target. The builder refuses to produce a payload with a missing
//! component, uuid, context or `saveInto`; nothing malformed is ever sent.

use serde_json::{json, Map, Value};

use crate::component::Component;
use crate::error::{Error, Result};

/// Fluent builder for one save request
#[derive(Debug, Clone, Default)]
pub struct SaveRequestBuilder {
    component: Option<Value>,
    value: Option<Value>,
    context: Option<Value>,
    uuid: Option<String>,
    identifier: Option<Value>,
}

impl SaveRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(mut self, component: &Value) -> Self {
        self.component = Some(component.clone());
        self
    }

    /// New value; defaults to the component's current `value`
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn context(mut self, context: &Value) -> Self {
        self.context = Some(context.clone());
        self
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Record-list instance this update is scoped to
    pub fn identifier(mut self, identifier: Option<Value>) -> Self {
        self.identifier = identifier;
        self
    }

    /// Full `UiConfig` payload carrying a single update
    pub fn build(&self) -> Result<Value> {
        Self::build_many(std::slice::from_ref(self))
    }

    /// One `UiConfig` payload carrying every update, in order
    ///
    /// Context, uuid and identifier are taken from the first request.
    pub fn build_many(requests: &[SaveRequestBuilder]) -> Result<Value> {
        let first = requests
            .first()
            .ok_or_else(|| Error::MalformedRequest("no save requests to build".to_string()))?;
        let updates = requests
            .iter()
            .map(SaveRequestBuilder::build_update)
            .collect::<Result<Vec<_>>>()?;
        let (context, uuid) = first.session_fields()?;

        let mut payload = Map::new();
        payload.insert("#t".into(), json!("UiConfig"));
        payload.insert("context".into(), context.clone());
        payload.insert("uuid".into(), json!(uuid));
        payload.insert(
            "updates".into(),
            json!({"#t": "SaveRequest?list", "#v": updates}),
        );
        if let Some(identifier) = first.identifier.as_ref().filter(|i| is_truthy(i)) {
            payload.insert("identifier".into(), identifier.clone());
        }
        Ok(Value::Object(payload))
    }

    /// The `SaveRequest` entry alone
    pub fn build_update(&self) -> Result<Value> {
        let component = self
            .component
            .as_ref()
            .ok_or_else(|| Error::MalformedRequest("Component not set".to_string()))?;
        self.session_fields()?;
        let view = Component::new(component)?;

        let save_into = view.save_into().ok_or_else(|| {
            Error::MalformedRequest(format!(
                "saveInto not set on component '{}'",
                view.display_label()
            ))
        })?;
        let value = match &self.value {
            Some(v) => v.clone(),
            None => view.value().cloned().unwrap_or(Value::Null),
        };

        Ok(json!({
            "_cId": view.cid(),
            "model": component,
            "value": value,
            "saveInto": save_into,
            "saveType": "PRIMARY",
        }))
    }

    fn session_fields(&self) -> Result<(&Value, &str)> {
        if self.component.is_none() {
            return Err(Error::MalformedRequest("Component not set".to_string()));
        }
        let uuid = self
            .uuid
            .as_deref()
            .ok_or_else(|| Error::MalformedRequest("uuid not set".to_string()))?;
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| Error::MalformedRequest("context not set".to_string()))?;
        Ok((context, uuid))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
