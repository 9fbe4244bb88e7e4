//! Shared dependencies every action is built from.

use std::fmt;
use std::sync::Arc;

use cpi_config::CloudConfig;

use crate::ids::IdGenerator;
use crate::infra::InfraClient;

/// Infrastructure client, identifier source and cloud configuration shared
/// read-only by every action a factory builds.
#[derive(Clone)]
pub struct Dependencies {
    infra: Arc<dyn InfraClient>,
    ids: Arc<dyn IdGenerator>,
    config: Arc<CloudConfig>,
}

impl Dependencies {
    /// Bundles the shared dependencies.
    #[must_use]
    pub fn new(
        infra: Arc<dyn InfraClient>,
        ids: Arc<dyn IdGenerator>,
        config: CloudConfig,
    ) -> Self {
        Self {
            infra,
            ids,
            config: Arc::new(config),
        }
    }

    /// Returns the infrastructure client.
    #[must_use]
    pub fn infra(&self) -> &dyn InfraClient {
        self.infra.as_ref()
    }

    /// Returns the identifier source.
    #[must_use]
    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    /// Returns the cloud configuration document.
    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Generates an identifier with a kind prefix, such as `disk-<id>`.
    #[must_use]
    pub fn next_cid(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.ids.generate())
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Dependencies")
            .field("plugin", &self.config.plugin())
            .field("project", &self.config.project())
            .finish_non_exhaustive()
    }
}
