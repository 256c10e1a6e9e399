//! Instance reconciler
//!
//! Maps the lifecycle of a declared server resource onto an [`InstanceApi`].
//! All operations take immutable inputs and hand back new data; persisting the
//! results is the caller's business.

use crate::error::{CloudError, DefineError, Result};
use crate::provider::{
    DeleteOptions, InstanceApi, InstanceDefinition, InstancePatch, PowerAction, RemoteInstance,
    ResourceHandler,
};
use crate::schema::{ComputedState, ConnectionInfo, DeclaredConfig, Observation, ResourceData};
use crate::waiter::{WaitConfig, wait_until_ready};
use async_trait::async_trait;

/// Server resource handler backed by an [`InstanceApi`]
pub struct InstanceReconciler<A> {
    api: A,
    wait: WaitConfig,
    delete_options: DeleteOptions,
}

impl<A: InstanceApi> InstanceReconciler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            wait: WaitConfig::default(),
            delete_options: DeleteOptions::default(),
        }
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_delete_options(mut self, options: DeleteOptions) -> Self {
        self.delete_options = options;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn wait_config(&self) -> &WaitConfig {
        &self.wait
    }
}

/// Project a remote instance into computed fields and a connection descriptor
pub fn project(instance: &RemoteInstance) -> Observation {
    let public = instance.public_address.clone().unwrap_or_default();

    Observation::Present {
        computed: ComputedState {
            ipv4_address: public.clone(),
            ipv4_address_private: instance.private_ip.clone().unwrap_or_default(),
            state: instance.state.clone(),
            state_detail: instance.state_detail.clone(),
        },
        connection: ConnectionInfo::ssh(public),
    }
}

#[async_trait]
impl<A: InstanceApi> ResourceHandler for InstanceReconciler<A> {
    async fn define(&self, config: &DeclaredConfig) -> std::result::Result<ResourceData, DefineError> {
        config.validate().map_err(DefineError::before_create)?;

        let definition = InstanceDefinition::from(config);
        tracing::info!("Creating instance {} from image {}", config.name, config.image);

        let id = self
            .api
            .create_instance(&definition)
            .await
            .map_err(|e| {
                DefineError::before_create(CloudError::CreateFailed {
                    image: config.image.clone(),
                    source: Box::new(e),
                })
            })?;

        // From here on the instance exists remotely; every failure carries the id.
        tracing::info!("Instance {} created (ID: {})", config.name, id);

        self.api
            .set_power_state(&id, PowerAction::PowerOn)
            .await
            .map_err(|e| {
                DefineError::after_create(
                    id.clone(),
                    CloudError::PowerOnFailed {
                        id: id.clone(),
                        source: Box::new(e),
                    },
                )
            })?;

        wait_until_ready(&self.api, &id, &self.wait)
            .await
            .map_err(|e| DefineError::after_create(id.clone(), e))?;

        let observation = self
            .observe(&id)
            .await
            .map_err(|e| DefineError::after_create(id.clone(), e))?;

        Ok(ResourceData::new(config.clone())
            .with_id(id)
            .refresh(observation))
    }

    async fn observe(&self, id: &str) -> Result<Observation> {
        match self.api.fetch_instance(id).await {
            Ok(instance) => Ok(project(&instance)),
            Err(e) if e.is_not_found() => {
                tracing::info!("Instance {} no longer exists, marking absent", id);
                Ok(Observation::Absent)
            }
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        id: &str,
        old: &DeclaredConfig,
        new: &DeclaredConfig,
    ) -> Result<InstancePatch> {
        let patch = InstancePatch::between(old, new);
        tracing::info!(
            "Patching instance {} (name: {}, volumes: {})",
            id,
            patch.name.is_some(),
            patch.volumes.is_some()
        );

        self.api.patch_instance(id, &patch).await?;
        Ok(patch)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!(
            "Deleting instance {} (with volumes: {})",
            id,
            self.delete_options.with_volumes
        );
        self.api
            .delete_instance_safely(id, &self.delete_options)
            .await
    }
}
