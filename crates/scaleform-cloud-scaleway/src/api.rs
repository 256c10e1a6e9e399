//! Scaleway compute API client
//!
//! Direct REST implementation of the server endpoints, authenticated with the
//! `X-Auth-Token` header.

use crate::config::ScalewayConfig;
use crate::error::{Result, ScalewayError};
use crate::types::{ApiErrorBody, CreateServerRequest, Server, ServerActionRequest, ServerResponse};
use async_trait::async_trait;
use scaleform_cloud::waiter::STOPPED_STATE;
use scaleform_cloud::{
    DeleteOptions, InstanceApi, InstanceDefinition, InstancePatch, PowerAction, RemoteInstance,
    WaitConfig, wait_until_stopped,
};

const AUTH_HEADER: &str = "X-Auth-Token";

/// Power-off in progress; no new action is accepted
const STOPPING_STATE: &str = "stopping";

/// Client for the Scaleway compute REST API
#[derive(Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    organization: String,
    stop_wait: WaitConfig,
}

impl ScalewayClient {
    pub fn new(config: &ScalewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("scaleform/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            organization: config.organization.clone(),
            stop_wait: WaitConfig::default(),
        })
    }

    /// Polling used by safe delete while waiting for the server to stop
    pub fn with_stop_wait(mut self, wait: WaitConfig) -> Self {
        self.stop_wait = wait;
        self
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn check(
        resp: reqwest::Response,
        endpoint: &'static str,
        resource: &str,
    ) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| match e.kind {
                    Some(kind) => format!("{} ({})", e.message, kind),
                    None => e.message,
                })
                .unwrap_or(body);
            return Err(ScalewayError::Api {
                endpoint,
                resource: resource.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    // ── Servers ──────────────────────────────────────────────────────

    pub async fn post_server(&self, definition: &InstanceDefinition) -> Result<Server> {
        let request = CreateServerRequest::new(&self.organization, definition);
        tracing::debug!("POST /servers ({})", definition.name);

        let resp = self
            .http
            .post(self.url("/servers"))
            .header(AUTH_HEADER, &self.token)
            .json(&request)
            .send()
            .await?;

        let body: ServerResponse = Self::check(resp, "create server", &definition.name)
            .await?
            .json()
            .await?;
        Ok(body.server)
    }

    pub async fn post_server_action(&self, id: &str, action: PowerAction) -> Result<()> {
        tracing::debug!("POST /servers/{}/action ({})", id, action);

        let resp = self
            .http
            .post(self.url(&format!("/servers/{id}/action")))
            .header(AUTH_HEADER, &self.token)
            .json(&ServerActionRequest {
                action: action.as_str().to_string(),
            })
            .send()
            .await?;

        Self::check(resp, "server action", id).await?;
        Ok(())
    }

    pub async fn get_server(&self, id: &str) -> Result<Server> {
        let resp = self
            .http
            .get(self.url(&format!("/servers/{id}")))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;

        let body: ServerResponse = Self::check(resp, "get server", id).await?.json().await?;
        Ok(body.server)
    }

    pub async fn patch_server(&self, id: &str, patch: &InstancePatch) -> Result<()> {
        tracing::debug!("PATCH /servers/{}", id);

        let resp = self
            .http
            .patch(self.url(&format!("/servers/{id}")))
            .header(AUTH_HEADER, &self.token)
            .json(patch)
            .send()
            .await?;

        Self::check(resp, "patch server", id).await?;
        Ok(())
    }

    pub async fn delete_server(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/servers/{id}")))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;

        Self::check(resp, "delete server", id).await?;
        Ok(())
    }

    // ── Volumes ──────────────────────────────────────────────────────

    pub async fn delete_volume(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/volumes/{id}")))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;

        Self::check(resp, "delete volume", id).await?;
        Ok(())
    }

    /// Delete a server whatever its power state
    ///
    /// A running server is powered off and waited on first. Volumes are
    /// detached by the server deletion and only removed when `with_volumes`
    /// is set.
    pub async fn delete_server_safe(&self, id: &str, with_volumes: bool) -> Result<()> {
        let server = self.get_server(id).await?;

        if server.state != STOPPED_STATE {
            if server.state != STOPPING_STATE {
                tracing::info!("Server {} is {}, powering off before delete", id, server.state);
                self.post_server_action(id, PowerAction::PowerOff).await?;
            }
            wait_until_stopped(self, id, &self.stop_wait).await?;
        }

        self.delete_server(id).await?;

        if with_volumes {
            for volume in server.volumes.values() {
                tracing::debug!("Deleting volume {} of server {}", volume.id, id);
                self.delete_volume(&volume.id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceApi for ScalewayClient {
    async fn create_instance(&self, definition: &InstanceDefinition) -> scaleform_cloud::Result<String> {
        Ok(self.post_server(definition).await?.id)
    }

    async fn set_power_state(&self, id: &str, action: PowerAction) -> scaleform_cloud::Result<()> {
        Ok(self.post_server_action(id, action).await?)
    }

    async fn fetch_instance(&self, id: &str) -> scaleform_cloud::Result<RemoteInstance> {
        Ok(self.get_server(id).await?.into())
    }

    async fn patch_instance(&self, id: &str, patch: &InstancePatch) -> scaleform_cloud::Result<()> {
        Ok(self.patch_server(id, patch).await?)
    }

    async fn delete_instance_safely(
        &self,
        id: &str,
        options: &DeleteOptions,
    ) -> scaleform_cloud::Result<()> {
        Ok(self.delete_server_safe(id, options.with_volumes).await?)
    }
}
