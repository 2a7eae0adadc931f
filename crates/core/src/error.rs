//! Error types for the UI interaction engine

use thiserror::Error;

/// Result type alias using the engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
///
/// Every variant is fatal to the verb that produced it. Grid paging past either
/// end is not an error at all: it is refused and logged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    ComponentNotFound(String),

    #[error("Component found but index: '{index}' out of range")]
    IndexOutOfRange { index: i64 },

    #[error("Invalid index: '{index}'. {reason}")]
    InvalidIndex { index: i64, reason: String },

    #[error("Malformed save request: {0}")]
    MalformedRequest(String),

    #[error("Choice {choice} not found for {component}, valid choices were {valid:?}")]
    InvalidChoice {
        choice: String,
        component: String,
        valid: Vec<String>,
    },

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Grid error: {0}")]
    Grid(String),

    #[error("Validations present in form {form}: {validations}")]
    ServerValidation { form: String, validations: String },

    #[error("Transport error calling {uri}{}: {message}", status_suffix(.status))]
    Transport {
        uri: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl Error {
    /// Build a transport error without an HTTP status
    pub fn transport(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            uri: uri.into(),
            status: None,
            message: message.into(),
        }
    }

    /// True when a lookup failed, as opposed to a lookup that was malformed
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ComponentNotFound(_) | Error::IndexOutOfRange { .. })
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport {
            uri: e.url().map(|u| u.to_string()).unwrap_or_default(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_carries_status() {
        let err = Error::Transport {
            uri: "/suite/form".into(),
            status: Some(503),
            message: "unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transport error calling /suite/form (status 503): unavailable"
        );
    }

    #[test]
    fn test_transport_message_without_status() {
        let err = Error::transport("/suite/form", "connection reset");
        assert_eq!(err.to_string(), "Transport error calling /suite/form: connection reset");
    }
}
