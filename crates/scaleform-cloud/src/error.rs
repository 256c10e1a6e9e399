//! Cloud provider error types

use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote side reported the resource as gone
    #[error("Resource not found: {resource} (status {status})")]
    NotFound { resource: String, status: u16 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Error creating instance with image {image}: {source}")]
    CreateFailed {
        image: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Error powering on instance {id}: {source}")]
    PowerOnFailed {
        id: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Timeout: instance {id} not ready after {attempts} attempts{}", last_error_note(.last_error))]
    ReadinessTimeout {
        id: String,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Timeout: instance {id} did not stop after {attempts} attempts{}", last_error_note(.last_error))]
    StopTimeout {
        id: String,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether this is the distinguished not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

fn last_error_note(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last poll: {e})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Failure of a Define pass.
///
/// `id` is set whenever the creation call succeeded before a later step
/// failed, so the caller can keep track of the half-built instance.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct DefineError {
    pub id: Option<String>,
    #[source]
    pub source: CloudError,
}

impl DefineError {
    pub fn before_create(source: CloudError) -> Self {
        Self { id: None, source }
    }

    pub fn after_create(id: impl Into<String>, source: CloudError) -> Self {
        Self {
            id: Some(id.into()),
            source,
        }
    }
}
