//! Scaleway compute API wire types

use scaleform_cloud::{InstanceDefinition, RemoteInstance, VolumeMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Requests ─────────────────────────────────────────────────────────

/// Body of `POST /servers`
#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub organization: String,
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

impl CreateServerRequest {
    pub fn new(organization: impl Into<String>, definition: &InstanceDefinition) -> Self {
        Self {
            organization: organization.into(),
            name: definition.name.clone(),
            image: definition.image.clone(),
            volumes: definition.volumes.clone(),
            dynamic_ip_required: definition.dynamic_ip_required,
            bootscript: definition.bootscript.clone(),
            tags: definition.tags.clone(),
        }
    }
}

/// Body of `POST /servers/{id}/action`
#[derive(Debug, Clone, Serialize)]
pub struct ServerActionRequest {
    pub action: String,
}

// ── Responses ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ServerResponse {
    pub server: Server,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub state_detail: String,
    pub public_ip: Option<PublicIp>,
    pub private_ip: Option<String>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Volume>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dynamic_ip_required: bool,
    pub hostname: Option<String>,
}

impl Server {
    pub fn public_address(&self) -> Option<String> {
        self.public_ip.as_ref().map(|ip| ip.address.clone())
    }
}

impl From<Server> for RemoteInstance {
    fn from(server: Server) -> Self {
        Self {
            public_address: server.public_address(),
            id: server.id,
            name: server.name,
            state: server.state,
            state_detail: server.state_detail,
            private_ip: server.private_ip,
            volumes: server
                .volumes
                .into_iter()
                .map(|(slot, volume)| (slot, volume.id))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicIp {
    pub id: Option<String>,
    pub address: String,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub volume_type: Option<String>,
}

/// Error body returned on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
