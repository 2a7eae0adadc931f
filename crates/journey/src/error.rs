//! Error types for journeys

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JourneyError {
    #[error("Journey spec parse error: {0}")]
    SpecParse(String),

    #[error("Journey not found: {0}")]
    NotFound(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Session error: {0}")]
    Session(#[from] uisim_core::Error),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type JourneyResult<T> = Result<T, JourneyError>;
