//! Executing planned actions
//!
//! The [`Applier`] drives a [`ResourceHandler`] through planned actions and
//! records every outcome in a [`GlobalState`]. When a [`StateManager`] is
//! attached, its lock is held for the run and the state is written after each
//! action, so a partially created instance is never forgotten.

use crate::action::{Action, ActionType, Plan};
use crate::error::{CloudError, DefineError, Result};
use crate::provider::ResourceHandler;
use crate::schema::{DeclaredConfig, Observation, ResourceData};
use crate::state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
use serde::{Deserialize, Serialize};

/// Result of applying a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, address: String, message: String) {
        self.succeeded.push(ActionResult {
            address,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, address: String, error: String) {
        self.failed.push(ActionResult {
            address,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Address of the resource
    pub address: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Runs actions against a handler and keeps the state in sync
pub struct Applier<'a, H: ?Sized> {
    handler: &'a H,
    manager: Option<&'a StateManager>,
}

impl<'a, H: ResourceHandler + ?Sized> Applier<'a, H> {
    pub fn new(handler: &'a H) -> Self {
        Self {
            handler,
            manager: None,
        }
    }

    /// Persist the state after every action
    pub fn with_state_manager(mut self, manager: &'a StateManager) -> Self {
        self.manager = Some(manager);
        self
    }

    async fn persist(&self, state: &GlobalState) -> Result<()> {
        if let Some(manager) = self.manager {
            manager.save(state).await?;
        }
        Ok(())
    }

    async fn lock(&self) -> Result<Option<StateLock>> {
        match self.manager {
            Some(manager) => Ok(Some(manager.acquire_lock().await?)),
            None => Ok(None),
        }
    }

    async fn unlock(lock: Option<StateLock>) -> Result<()> {
        match lock {
            Some(lock) => lock.release().await,
            None => Ok(()),
        }
    }

    /// Apply every action of a plan, continuing past failures
    ///
    /// With a state manager attached, the project lock is held for the whole
    /// run; failing to take it aborts before any action.
    pub async fn apply_plan(&self, state: &mut GlobalState, plan: &Plan) -> Result<ApplyResult> {
        let lock = self.lock().await?;
        let result = self.apply_actions(state, plan).await;
        Self::unlock(lock).await?;
        Ok(result)
    }

    async fn apply_actions(&self, state: &mut GlobalState, plan: &Plan) -> ApplyResult {
        let mut result = ApplyResult::new();
        let start = std::time::Instant::now();

        for action in &plan.actions {
            if action.action_type == ActionType::NoOp {
                continue;
            }

            match self.apply(state, action).await {
                Ok(()) => result.add_success(action.address.clone(), action.description.clone()),
                Err(e) => {
                    tracing::warn!("{} failed: {}", action.address, e);
                    result.add_failure(action.address.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Apply a single action
    pub async fn apply(&self, state: &mut GlobalState, action: &Action) -> Result<()> {
        let outcome = match action.action_type {
            ActionType::Create => self.create(state, action).await,
            ActionType::Update => self.update(state, action).await,
            ActionType::Replace => match self.delete(state, &action.address).await {
                Ok(()) => self.create(state, action).await,
                Err(e) => Err(e),
            },
            ActionType::Delete => self.delete(state, &action.address).await,
            ActionType::NoOp => Ok(()),
        };

        // Whatever happened, the state reflects it now
        self.persist(state).await?;
        outcome
    }

    async fn create(&self, state: &mut GlobalState, action: &Action) -> Result<()> {
        let desired = desired_of(action)?;
        tracing::info!("{}: creating", action.address);

        match self.handler.define(desired).await {
            Ok(data) => {
                state.set_resource(
                    action.address.clone(),
                    ResourceState::new(data).with_status(ResourceStatus::Ready),
                );
                Ok(())
            }
            Err(DefineError {
                id: Some(id),
                source,
            }) => {
                tracing::warn!(
                    "{}: instance {} created but not ready, recording as tainted",
                    action.address,
                    id
                );
                state.set_resource(
                    action.address.clone(),
                    ResourceState::new(ResourceData::new(desired.clone()).with_id(id))
                        .with_status(ResourceStatus::Tainted),
                );
                Err(source)
            }
            Err(DefineError { id: None, source }) => Err(source),
        }
    }

    async fn update(&self, state: &mut GlobalState, action: &Action) -> Result<()> {
        let desired = desired_of(action)?;
        let record = state
            .get_resource(&action.address)
            .cloned()
            .ok_or_else(|| CloudError::StateError(format!("{} is not recorded", action.address)))?;
        let id = recorded_id(&action.address, &record.data)?;

        self.handler.update(&id, &record.data.config, desired).await?;
        let observation = self.handler.observe(&id).await?;

        let mut data = record.data.clone();
        data.config = desired.clone();
        self.record_observation(state, &action.address, record, data, observation);
        Ok(())
    }

    async fn delete(&self, state: &mut GlobalState, address: &str) -> Result<()> {
        let Some(record) = state.get_resource(address) else {
            return Ok(());
        };
        if let Some(id) = record.data.id.clone() {
            tracing::info!("{}: deleting instance {}", address, id);
            self.handler.delete(&id).await?;
        }
        state.remove_resource(address);
        Ok(())
    }

    /// Observe every recorded resource, dropping those that disappeared
    ///
    /// Returns the addresses that were removed from the state.
    pub async fn refresh(&self, state: &mut GlobalState) -> Result<Vec<String>> {
        let lock = self.lock().await?;
        let removed = self.refresh_all(state).await;
        Self::unlock(lock).await?;
        removed
    }

    async fn refresh_all(&self, state: &mut GlobalState) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        let addresses: Vec<String> = state.resources.keys().cloned().collect();

        for address in addresses {
            let Some(record) = state.get_resource(&address).cloned() else {
                continue;
            };
            let Some(id) = record.data.id.clone() else {
                state.remove_resource(&address);
                removed.push(address);
                continue;
            };

            let observation = self.handler.observe(&id).await?;
            if observation == Observation::Absent {
                removed.push(address.clone());
            }
            let data = record.data.clone();
            self.record_observation(state, &address, record, data, observation);
        }

        self.persist(state).await?;
        Ok(removed)
    }

    fn record_observation(
        &self,
        state: &mut GlobalState,
        address: &str,
        mut record: ResourceState,
        data: ResourceData,
        observation: Observation,
    ) {
        let data = data.refresh(observation);
        if !data.exists() {
            tracing::info!("{}: instance is gone, removing from state", address);
            state.remove_resource(address);
            return;
        }
        let status = record.status;
        record.update(data, status);
        state.set_resource(address.to_string(), record);
    }
}

fn desired_of(action: &Action) -> Result<&DeclaredConfig> {
    action.desired.as_ref().ok_or_else(|| {
        CloudError::InvalidConfig(format!("{}: no desired configuration", action.address))
    })
}

fn recorded_id(address: &str, data: &ResourceData) -> Result<String> {
    data.id
        .clone()
        .ok_or_else(|| CloudError::StateError(format!("{} has no instance identifier", address)))
}
