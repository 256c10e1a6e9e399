//! Provider-facing traits
//!
//! [`InstanceApi`] is what a cloud client has to offer; [`ResourceHandler`] is
//! what an orchestrator calls for a single server resource.

use crate::error::{DefineError, Result};
use crate::schema::{DeclaredConfig, Observation, ResourceData, VolumeMap};
use crate::waiter::{READY_STATE, STOPPED_STATE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remote compute API abstraction trait
///
/// Each call is treated as atomic. Retries, pooling and auth belong to the
/// implementation, not to the callers.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Submit a creation request and return the new instance identifier
    async fn create_instance(&self, definition: &InstanceDefinition) -> Result<String>;

    /// Request a power transition
    async fn set_power_state(&self, id: &str, action: PowerAction) -> Result<()>;

    /// Fetch the instance; a vanished instance yields `CloudError::NotFound`
    async fn fetch_instance(&self, id: &str) -> Result<RemoteInstance>;

    /// Apply a sparse patch
    async fn patch_instance(&self, id: &str, patch: &InstancePatch) -> Result<()>;

    /// Remove the instance, stopping it first if needed
    async fn delete_instance_safely(&self, id: &str, options: &DeleteOptions) -> Result<()>;
}

/// The four lifecycle operations of a server resource
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Create, power on, wait for readiness, then observe
    async fn define(&self, config: &DeclaredConfig) -> std::result::Result<ResourceData, DefineError>;

    /// Project remote state; `Observation::Absent` when the instance is gone
    async fn observe(&self, id: &str) -> Result<Observation>;

    /// Patch the mutable fields that changed between `old` and `new`
    async fn update(
        &self,
        id: &str,
        old: &DeclaredConfig,
        new: &DeclaredConfig,
    ) -> Result<InstancePatch>;

    /// Remove the instance
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Creation request built from a declared configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDefinition {
    pub name: String,

    pub image: String,

    pub volumes: VolumeMap,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_ip_required: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootscript: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl From<&DeclaredConfig> for InstanceDefinition {
    fn from(config: &DeclaredConfig) -> Self {
        Self {
            name: config.name.clone(),
            image: config.image.clone(),
            volumes: config.volumes.clone(),
            dynamic_ip_required: config.dynamic_ip_required,
            bootscript: config.bootscript.clone(),
            tags: config.tags.clone(),
        }
    }
}

/// Volume reference in the remote attachment shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub id: String,
}

/// Sparse update; `None` fields are left untouched remotely
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<BTreeMap<String, VolumeRef>>,
}

impl InstancePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.volumes.is_none()
    }

    /// Build the patch for the mutable fields that changed
    pub fn between(old: &DeclaredConfig, new: &DeclaredConfig) -> Self {
        let mut patch = Self::default();

        if old.name != new.name {
            patch.name = Some(new.name.clone());
        }

        if old.volumes != new.volumes {
            patch.volumes = Some(
                new.volumes
                    .iter()
                    .map(|(slot, id)| (slot.clone(), VolumeRef { id: id.clone() }))
                    .collect(),
            );
        }

        patch
    }
}

/// Power transitions understood by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    PowerOn,
    PowerOff,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::PowerOn => "poweron",
            PowerAction::PowerOff => "poweroff",
        }
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote view of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInstance {
    pub id: String,
    pub name: String,
    pub state: String,
    pub state_detail: String,
    pub public_address: Option<String>,
    pub private_ip: Option<String>,
    pub volumes: VolumeMap,
}

impl RemoteInstance {
    pub fn is_running(&self) -> bool {
        self.state == READY_STATE
    }

    pub fn is_stopped(&self) -> bool {
        self.state == STOPPED_STATE
    }
}

/// Options for safe delete
///
/// Volumes are declared by reference and are not created by Define, so they
/// outlive the instance unless `with_volumes` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Also delete the volumes attached to the instance
    #[serde(default)]
    pub with_volumes: bool,
}
