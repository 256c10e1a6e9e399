//! Scaleway provider implementation

use crate::api::ScalewayClient;
use crate::config::ScalewayConfig;
use crate::error::Result;
use scaleform_cloud::{DeleteOptions, InstanceReconciler, WaitConfig};

/// Server handler wired to the Scaleway API
pub type ScalewayServerHandler = InstanceReconciler<ScalewayClient>;

/// Scaleway provider
pub struct ScalewayProvider {
    config: ScalewayConfig,
    wait: WaitConfig,
    delete_options: DeleteOptions,
}

impl ScalewayProvider {
    pub fn new(config: ScalewayConfig) -> Self {
        Self {
            config,
            wait: WaitConfig::default(),
            delete_options: DeleteOptions::default(),
        }
    }

    /// Provider with credentials from the environment or `~/.scwrc`
    pub fn load() -> Result<Self> {
        Ok(Self::new(ScalewayConfig::load()?))
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_delete_options(mut self, options: DeleteOptions) -> Self {
        self.delete_options = options;
        self
    }

    pub fn name(&self) -> &str {
        "scaleway"
    }

    pub fn display_name(&self) -> &str {
        "Scaleway"
    }

    pub fn config(&self) -> &ScalewayConfig {
        &self.config
    }

    /// Build the handler for `server` resources
    pub fn server_handler(&self) -> Result<ScalewayServerHandler> {
        let client = ScalewayClient::new(&self.config)?.with_stop_wait(self.wait.clone());
        tracing::debug!(
            "Scaleway server handler for organization {} at {}",
            self.config.organization,
            self.config.api_url
        );

        Ok(InstanceReconciler::new(client)
            .with_wait_config(self.wait.clone())
            .with_delete_options(self.delete_options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_handler_carries_settings() {
        let wait = WaitConfig {
            max_retries: 3,
            ..Default::default()
        };
        let provider = ScalewayProvider::new(
            ScalewayConfig::new("org-1", "secret").with_api_url("http://localhost:1"),
        )
        .with_wait_config(wait.clone());

        let handler = provider.server_handler().unwrap();
        assert_eq!(handler.wait_config(), &wait);
        assert_eq!(handler.api().organization(), "org-1");
        assert_eq!(provider.name(), "scaleway");
    }
}
