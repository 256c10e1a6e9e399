//! Scaleway provider for Scaleform
//!
//! This crate implements the `InstanceApi` trait against the Scaleway compute
//! API, so the reconciler from `scaleform-cloud` can manage Scaleway servers.
//!
//! # Features
//!
//! - Server management (create, read, patch, power actions)
//! - Safe delete (power off, delete, optionally remove attached volumes)
//! - Credentials from the environment or `~/.scwrc`
//!
//! # Example
//!
//! ```ignore
//! use scaleform_cloud::{DeclaredConfig, ResourceHandler};
//! use scaleform_cloud_scaleway::ScalewayProvider;
//!
//! let handler = ScalewayProvider::load()?.server_handler()?;
//!
//! let config = DeclaredConfig::from_value(&block)?;
//! let data = handler.define(&config).await?;
//! println!("{} is at {}", data.config.name, data.computed.ipv4_address);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use api::ScalewayClient;
pub use config::{DEFAULT_REGION, ScalewayConfig, region_api_url};
pub use error::{Result, ScalewayError};
pub use provider::{ScalewayProvider, ScalewayServerHandler};
pub use types::{CreateServerRequest, PublicIp, Server, Volume};
