use async_trait::async_trait;
use scaleform_cloud::{
    CloudError, DeclaredConfig, DeleteOptions, InstanceApi, InstanceDefinition, InstancePatch,
    PowerAction, RemoteInstance, Result, VolumeMap, WaitConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Call recorded by [`StubApi`]
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Call {
    Create(InstanceDefinition),
    Power(String, PowerAction),
    Fetch(String),
    Patch(String, InstancePatch),
    Delete(String, bool),
}

/// In-memory stand-in for a compute API
#[derive(Default)]
pub struct StubApi {
    next_ids: Mutex<VecDeque<String>>,
    instances: Mutex<HashMap<String, RemoteInstance>>,
    /// States returned by successive fetches before the stored instance
    fetch_script: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Call>>,
    fail_create: bool,
    fail_power_on: bool,
    fail_patch: bool,
    fail_fetch: bool,
    never_ready: bool,
}

#[allow(dead_code)]
impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(self, ids: &[&str]) -> Self {
        *self.next_ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_power_on(mut self) -> Self {
        self.fail_power_on = true;
        self
    }

    pub fn failing_patch(mut self) -> Self {
        self.fail_patch = true;
        self
    }

    /// Every fetch fails with a server error
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Every fetch reports the instance as still starting
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Make the stub report `instance` under its id
    pub fn report(&self, instance: RemoteInstance) {
        self.instances
            .lock()
            .unwrap()
            .insert(instance.id.clone(), instance);
    }

    /// Drop an instance behind the reconciler's back
    pub fn forget(&self, id: &str) {
        self.instances.lock().unwrap().remove(id);
    }

    /// States the next fetches return before the stored one
    pub fn script_states(&self, states: &[&str]) {
        *self.fetch_script.lock().unwrap() = states.iter().map(|s| s.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<InstancePatch> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Patch(_, patch) => Some(patch),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn not_found(id: &str) -> CloudError {
        CloudError::NotFound {
            resource: id.to_string(),
            status: 404,
        }
    }
}

#[async_trait]
impl InstanceApi for StubApi {
    async fn create_instance(&self, definition: &InstanceDefinition) -> Result<String> {
        self.record(Call::Create(definition.clone()));
        if self.fail_create {
            return Err(CloudError::Api {
                status: 400,
                message: "image not found".to_string(),
            });
        }

        let id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "srv-generated".to_string());

        let mut instances = self.instances.lock().unwrap();
        instances.entry(id.clone()).or_insert_with(|| RemoteInstance {
            id: id.clone(),
            name: definition.name.clone(),
            state: "stopped".to_string(),
            volumes: definition.volumes.clone(),
            ..Default::default()
        });
        Ok(id)
    }

    async fn set_power_state(&self, id: &str, action: PowerAction) -> Result<()> {
        self.record(Call::Power(id.to_string(), action));
        if self.fail_power_on && action == PowerAction::PowerOn {
            return Err(CloudError::Api {
                status: 500,
                message: "power on failed".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_instance(&self, id: &str) -> Result<RemoteInstance> {
        self.record(Call::Fetch(id.to_string()));
        if self.fail_fetch {
            return Err(CloudError::Api {
                status: 500,
                message: "backend unavailable".to_string(),
            });
        }
        let mut instance = self
            .instances
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))?;

        if self.never_ready {
            instance.state = "starting".to_string();
        } else if let Some(state) = self.fetch_script.lock().unwrap().pop_front() {
            instance.state = state;
        }
        Ok(instance)
    }

    async fn patch_instance(&self, id: &str, patch: &InstancePatch) -> Result<()> {
        self.record(Call::Patch(id.to_string(), patch.clone()));
        if self.fail_patch {
            return Err(CloudError::Api {
                status: 400,
                message: "invalid volume".to_string(),
            });
        }

        let mut instances = self.instances.lock().unwrap();
        let instance = instances.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if let Some(name) = &patch.name {
            instance.name = name.clone();
        }
        if let Some(volumes) = &patch.volumes {
            instance.volumes = volumes
                .iter()
                .map(|(slot, v)| (slot.clone(), v.id.clone()))
                .collect();
        }
        Ok(())
    }

    async fn delete_instance_safely(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        self.record(Call::Delete(id.to_string(), options.with_volumes));
        self.instances
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }
}

pub fn running(id: &str, public: &str, private: &str) -> RemoteInstance {
    RemoteInstance {
        id: id.to_string(),
        name: "web1".to_string(),
        state: "running".to_string(),
        state_detail: String::new(),
        public_address: Some(public.to_string()),
        private_ip: Some(private.to_string()),
        volumes: VolumeMap::new(),
    }
}

pub fn web1() -> DeclaredConfig {
    DeclaredConfig::new(
        "web1",
        "img-123",
        [("0".to_string(), "vol-abc".to_string())].into_iter().collect(),
    )
}

pub fn fast_wait(max_retries: u32) -> WaitConfig {
    WaitConfig {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        multiplier: 2.0,
    }
}
