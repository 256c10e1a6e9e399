//! Scaleway credentials and endpoint
//!
//! Credentials come from the environment first, then from the JSON rc file
//! the Scaleway CLI writes (`~/.scwrc`).

use crate::error::{Result, ScalewayError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "par1";
const RC_FILE: &str = ".scwrc";

/// Compute API endpoint of a region
pub fn region_api_url(region: &str) -> Result<String> {
    match region {
        "par1" | "ams1" => Ok(format!("https://cp-{}.scaleway.com", region)),
        other => Err(ScalewayError::InvalidRegion(other.to_string())),
    }
}

/// Configuration for the Scaleway client
#[derive(Debug, Clone)]
pub struct ScalewayConfig {
    pub organization: String,
    pub token: String,
    pub api_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RcFile {
    organization: String,
    token: String,
    region: Option<String>,
}

impl ScalewayConfig {
    pub fn new(organization: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            token: token.into(),
            api_url: format!("https://cp-{}.scaleway.com", DEFAULT_REGION),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create ScalewayConfig from environment variables
    ///
    /// `SCALEWAY_ORGANIZATION` and `SCALEWAY_TOKEN` are required;
    /// `SCALEWAY_API_URL` overrides the endpoint derived from `SCALEWAY_REGION`.
    pub fn from_env() -> Result<Self> {
        let organization = std::env::var("SCALEWAY_ORGANIZATION")
            .map_err(|_| ScalewayError::MissingEnvVar("SCALEWAY_ORGANIZATION".to_string()))?;
        let token = std::env::var("SCALEWAY_TOKEN")
            .map_err(|_| ScalewayError::MissingEnvVar("SCALEWAY_TOKEN".to_string()))?;

        let api_url = match std::env::var("SCALEWAY_API_URL") {
            Ok(url) => url,
            Err(_) => {
                let region =
                    std::env::var("SCALEWAY_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
                region_api_url(&region)?
            }
        };

        Ok(Self::new(organization, token).with_api_url(api_url))
    }

    /// Read the JSON rc file at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScalewayError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let rc: RcFile = serde_json::from_str(&content)?;
        let region = rc.region.as_deref().unwrap_or(DEFAULT_REGION);

        Ok(Self::new(rc.organization, rc.token).with_api_url(region_api_url(region)?))
    }

    /// Location of the rc file in the home directory
    pub fn rc_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(RC_FILE))
    }

    /// Environment first, then `~/.scwrc`
    pub fn load() -> Result<Self> {
        match Self::from_env() {
            Ok(config) => Ok(config),
            Err(ScalewayError::MissingEnvVar(var)) => {
                tracing::debug!("{} not set, falling back to rc file", var);
                let path = Self::rc_path()
                    .ok_or_else(|| ScalewayError::ConfigNotFound(PathBuf::from(RC_FILE)))?;
                Self::from_file(path)
            }
            Err(e) => Err(e),
        }
    }
}
