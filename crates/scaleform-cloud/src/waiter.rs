//! Instance readiness wait (exponential backoff)
//!
//! Polls the remote API until a freshly created instance reports the wanted
//! state, giving up after a bounded number of attempts.

use crate::error::{CloudError, Result};
use crate::provider::{InstanceApi, RemoteInstance};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Remote state of an instance that is ready for use
pub const READY_STATE: &str = "running";

/// Remote state of a powered-off instance
pub const STOPPED_STATE: &str = "stopped";

/// Polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Maximum number of polls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial delay (milliseconds)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Delay cap (milliseconds)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Exponential multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    30
}
fn default_initial_delay() -> u64 {
    1000 // 1s
}
fn default_max_delay() -> u64 {
    15000 // 15s
}
fn default_multiplier() -> f64 {
    1.5
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl WaitConfig {
    /// Number of polls actually made; a zero budget still polls once
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay before the poll following `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }

    /// Upper bound of the total time spent sleeping
    pub fn total_budget(&self) -> Duration {
        let ms: u64 = (0..self.attempts() - 1)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum();
        Duration::from_millis(ms)
    }
}

/// Wait until the instance is running
pub async fn wait_until_ready<A: InstanceApi + ?Sized>(
    api: &A,
    id: &str,
    config: &WaitConfig,
) -> Result<RemoteInstance> {
    poll_until(api, id, config, READY_STATE, RemoteInstance::is_running)
        .await
        .map_err(|exhausted| CloudError::ReadinessTimeout {
            id: id.to_string(),
            attempts: exhausted.attempts,
            last_error: exhausted.last_error,
        })
}

/// Wait until the instance is powered off
pub async fn wait_until_stopped<A: InstanceApi + ?Sized>(
    api: &A,
    id: &str,
    config: &WaitConfig,
) -> Result<RemoteInstance> {
    poll_until(api, id, config, STOPPED_STATE, RemoteInstance::is_stopped)
        .await
        .map_err(|exhausted| CloudError::StopTimeout {
            id: id.to_string(),
            attempts: exhausted.attempts,
            last_error: exhausted.last_error,
        })
}

struct Exhausted {
    attempts: u32,
    /// Error of the final poll, if it failed
    last_error: Option<String>,
}

/// Fetch errors count as "not there yet"; only exhausting the attempts fails.
async fn poll_until<A: InstanceApi + ?Sized>(
    api: &A,
    id: &str,
    config: &WaitConfig,
    target: &str,
    reached: fn(&RemoteInstance) -> bool,
) -> std::result::Result<RemoteInstance, Exhausted> {
    let attempts = config.attempts();
    let mut last_error = None;

    tracing::debug!(
        "Waiting up to {:?} for instance {} to be {}",
        config.total_budget(),
        id,
        target
    );

    for attempt in 0..attempts {
        match api.fetch_instance(id).await {
            Ok(instance) if reached(&instance) => {
                tracing::debug!("Instance {} reached state {}", id, target);
                return Ok(instance);
            }
            Ok(instance) => {
                last_error = None;
                tracing::debug!(
                    "Instance {} is {} ({}), waiting for {} (attempt {}/{})",
                    id,
                    instance.state,
                    instance.state_detail,
                    target,
                    attempt + 1,
                    attempts
                );
            }
            Err(e) => {
                tracing::debug!("Polling instance {} failed: {}", id, e);
                last_error = Some(e.to_string());
            }
        }

        if attempt + 1 < attempts {
            sleep(Duration::from_millis(config.delay_for_attempt(attempt))).await;
        }
    }

    Err(Exhausted {
        attempts,
        last_error,
    })
}
