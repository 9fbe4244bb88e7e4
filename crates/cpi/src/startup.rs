//! Startup wiring shared by the binary and the harness.

use std::sync::Arc;

use cpi_actions::{Dependencies, IdGenerator, MemoryInfra, concrete_factory};
use cpi_config::{CloudConfig, CloudConfigError, Config};
use cpi_dispatch::{DiagnosticSink, DiagnosticsError, Dispatcher, RegistryError, TransportError};
use ortho_config::OrthoError;
use thiserror::Error;
use tracing::info;

use crate::STARTUP_TARGET;
use crate::telemetry::TelemetryError;

/// The only backend plugin this executable provides.
pub const MEMORY_PLUGIN: &str = "memory";

/// Project used when no cloud document is configured.
const LOCAL_PROJECT: &str = "local";

/// Errors surfaced before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Process configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The cloud document could not be read or validated.
    #[error("failed to load cloud configuration: {source}")]
    CloudConfig {
        /// Underlying document error.
        #[source]
        source: CloudConfigError,
    },
    /// The cloud document names a backend this executable does not provide.
    #[error("unsupported cloud plugin '{plugin}'; expected '{MEMORY_PLUGIN}'")]
    UnsupportedPlugin {
        /// Plugin named in the document.
        plugin: String,
    },
    /// The per-request diagnostics could not be configured.
    #[error("failed to configure diagnostics: {source}")]
    Diagnostics {
        /// Underlying diagnostics error.
        #[source]
        source: DiagnosticsError,
    },
    /// The action table could not be built.
    #[error("failed to register actions: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// A standard stream failed while serving.
    #[error("transport failed: {source}")]
    Transport {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
}

/// Reads the cloud document named by `config`, or builds a local
/// memory-backed document when none is named.
///
/// # Errors
///
/// Returns [`StartupError::CloudConfig`] when the document cannot be read or
/// fails validation.
pub fn load_cloud_config(config: &Config) -> Result<CloudConfig, StartupError> {
    config
        .cloud_config()
        .map_or_else(
            || Ok(CloudConfig::new(MEMORY_PLUGIN, LOCAL_PROJECT)),
            CloudConfig::from_path,
        )
        .map_err(|source| StartupError::CloudConfig { source })
}

/// Builds the dispatcher over the concrete factory.
///
/// The cloud document is validated and handed to the factory once; every
/// action sees the same value.
///
/// # Errors
///
/// Returns [`StartupError::CloudConfig`] for an invalid document,
/// [`StartupError::UnsupportedPlugin`] for any plugin other than
/// [`MEMORY_PLUGIN`], and [`StartupError::Registry`] if the action table is
/// inconsistent.
pub fn build_dispatcher(
    cloud_config: CloudConfig,
    ids: Arc<dyn IdGenerator>,
    diagnostics: DiagnosticSink,
) -> Result<Dispatcher<Dependencies>, StartupError> {
    cloud_config
        .validate()
        .map_err(|source| StartupError::CloudConfig { source })?;
    if cloud_config.plugin() != MEMORY_PLUGIN {
        return Err(StartupError::UnsupportedPlugin {
            plugin: cloud_config.plugin().to_owned(),
        });
    }
    info!(
        target: STARTUP_TARGET,
        plugin = cloud_config.plugin(),
        project = cloud_config.project(),
        "building action factory"
    );
    let dependencies = Dependencies::new(Arc::new(MemoryInfra::new()), ids, cloud_config);
    let factory =
        concrete_factory(dependencies).map_err(|source| StartupError::Registry { source })?;
    Ok(Dispatcher::new(factory, diagnostics))
}
