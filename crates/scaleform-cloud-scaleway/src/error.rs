//! Scaleway provider error types

use scaleform_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScalewayError {
    #[error("scaleway api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("scaleway api {endpoint} ({resource}) returned {status}: {message}")]
    Api {
        endpoint: &'static str,
        resource: String,
        status: u16,
        message: String,
    },

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Unknown region: {0}")]
    InvalidRegion(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl ScalewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScalewayError::Api { status: 404, .. })
    }
}

impl From<ScalewayError> for CloudError {
    fn from(err: ScalewayError) -> Self {
        match err {
            ScalewayError::Api {
                resource,
                status: 404,
                ..
            } => CloudError::NotFound {
                resource,
                status: 404,
            },
            ScalewayError::Api {
                endpoint,
                status,
                message,
                ..
            } => CloudError::Api {
                status,
                message: format!("{}: {}", endpoint, message),
            },
            ScalewayError::Request(e) => CloudError::Request(e.to_string()),
            ScalewayError::CloudError(e) => e,
            ScalewayError::JsonError(e) => CloudError::Json(e),
            ScalewayError::IoError(e) => CloudError::Io(e),
            other => CloudError::InvalidConfig(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScalewayError>;
