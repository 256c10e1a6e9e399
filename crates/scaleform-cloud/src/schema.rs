//! Declared and computed shapes of a server resource
//!
//! The orchestrator hands over a loosely typed configuration block. It is
//! parsed once at the boundary into [`DeclaredConfig`]; everything past that
//! point works on typed values only.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attachment slot name → volume identifier
pub type VolumeMap = BTreeMap<String, String>;

/// How a field behaves once the resource exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    /// Can be patched in place
    Mutable,
    /// Changing it replaces the resource
    ForceNew,
    /// Only sent at creation; later changes are ignored
    SetOnce,
    /// Produced by the remote side
    Computed,
}

/// Schema entry for a single field
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub required: bool,
    pub mutability: Mutability,
}

const fn field(name: &'static str, required: bool, mutability: Mutability) -> FieldSchema {
    FieldSchema {
        name,
        required,
        mutability,
    }
}

/// Field table of the server resource
pub const SERVER_SCHEMA: &[FieldSchema] = &[
    field("name", true, Mutability::Mutable),
    field("image", true, Mutability::ForceNew),
    field("volumes", true, Mutability::Mutable),
    field("dynamic_ip_required", false, Mutability::SetOnce),
    field("bootscript", false, Mutability::SetOnce),
    field("tags", false, Mutability::SetOnce),
    field("ipv4_address", false, Mutability::Computed),
    field("ipv4_address_private", false, Mutability::Computed),
    field("state", false, Mutability::Computed),
    field("state_detail", false, Mutability::Computed),
];

/// Look up a field in [`SERVER_SCHEMA`]
pub fn schema_field(name: &str) -> Option<&'static FieldSchema> {
    SERVER_SCHEMA.iter().find(|f| f.name == name)
}

/// Desired state supplied by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredConfig {
    pub name: String,

    pub image: String,

    pub volumes: VolumeMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_ip_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootscript: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl DeclaredConfig {
    pub fn new(name: impl Into<String>, image: impl Into<String>, volumes: VolumeMap) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            volumes,
            dynamic_ip_required: None,
            bootscript: None,
            tags: None,
        }
    }

    pub fn with_dynamic_ip(mut self, required: bool) -> Self {
        self.dynamic_ip_required = Some(required);
        self
    }

    pub fn with_bootscript(mut self, bootscript: impl Into<String>) -> Self {
        self.bootscript = Some(bootscript.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Parse a configuration block handed over by the orchestrator
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| CloudError::InvalidConfig("expected an object".to_string()))?;

        for field in SERVER_SCHEMA.iter().filter(|f| f.required) {
            if object.get(field.name).is_none_or(|v| v.is_null()) {
                return Err(CloudError::InvalidConfig(format!(
                    "missing required field `{}`",
                    field.name
                )));
            }
        }

        if let Some(volumes) = object.get("volumes").and_then(|v| v.as_object()) {
            for (slot, id) in volumes {
                if !id.is_string() {
                    return Err(CloudError::InvalidConfig(format!(
                        "volume `{}` must be a volume identifier string",
                        slot
                    )));
                }
            }
        }

        let config: DeclaredConfig = serde_json::from_value(value.clone())
            .map_err(|e| CloudError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints the type system doesn't cover
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CloudError::InvalidConfig("`name` must not be empty".to_string()));
        }
        if self.image.trim().is_empty() {
            return Err(CloudError::InvalidConfig("`image` must not be empty".to_string()));
        }
        Ok(())
    }

    /// Names of the fields whose values differ from `other`
    pub fn changed_fields(&self, other: &DeclaredConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name != other.name {
            changed.push("name");
        }
        if self.image != other.image {
            changed.push("image");
        }
        if self.volumes != other.volumes {
            changed.push("volumes");
        }
        if self.dynamic_ip_required != other.dynamic_ip_required {
            changed.push("dynamic_ip_required");
        }
        if self.bootscript != other.bootscript {
            changed.push("bootscript");
        }
        if self.tags != other.tags {
            changed.push("tags");
        }
        changed
    }
}

/// Fields only the remote side can produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedState {
    pub ipv4_address: String,
    pub ipv4_address_private: String,
    pub state: String,
    pub state_detail: String,
}

/// How downstream tooling reaches the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
}

impl ConnectionInfo {
    pub fn ssh(host: impl Into<String>) -> Self {
        Self {
            kind: "ssh".to_string(),
            host: host.into(),
        }
    }
}

/// Result of an Observe pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Present {
        computed: ComputedState,
        connection: ConnectionInfo,
    },
    /// The instance no longer exists remotely
    Absent,
}

/// Everything the caller persists for one server resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Remote identifier; `None` means not created yet or already gone
    pub id: Option<String>,

    pub config: DeclaredConfig,

    #[serde(default)]
    pub computed: ComputedState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionInfo>,
}

impl ResourceData {
    pub fn new(config: DeclaredConfig) -> Self {
        Self {
            id: None,
            config,
            computed: ComputedState::default(),
            connection: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether a remote instance is tracked
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Fold an observation into this record.
    ///
    /// Computed fields are replaced wholesale; an absent instance clears the id.
    pub fn refresh(mut self, observation: Observation) -> Self {
        match observation {
            Observation::Present {
                computed,
                connection,
            } => {
                self.computed = computed;
                self.connection = Some(connection);
            }
            Observation::Absent => {
                self.id = None;
                self.connection = None;
            }
        }
        self
    }
}
