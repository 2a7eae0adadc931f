//! Transport seam
//!
//! The engine never talks HTTP itself. Sessions hand fully built requests to a
//! [`Transport`] and reconcile whatever JSON comes back. A non-success status
//! must surface as an [`Error::Transport`](crate::Error::Transport); the engine
//! does not retry.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A mutating UI request
#[derive(Debug, Clone, PartialEq)]
pub struct UiRequest {
    pub uri: String,
    pub payload: Value,
    /// Opaque headers, forwarded as given
    pub headers: Vec<(String, String)>,
    /// Name used for request statistics
    pub label: String,
}

impl UiRequest {
    pub fn new(uri: impl Into<String>, payload: Value, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            payload,
            headers: Vec::new(),
            label: label.into(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Executes UI requests against the server
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a save request, returning the response body
    async fn post(&self, request: UiRequest) -> Result<Value>;

    /// GET a form, returning the response body
    async fn get(&self, uri: &str, label: &str) -> Result<Value>;
}
