//! The cloud configuration document consumed by the action factory.
//!
//! The document is JSON and mirrors the shape the director writes for the
//! provider process. Only the handful of fields this crate validates are
//! typed; everything else is kept in `extra` maps so the factory can pass the
//! document to actions without losing information.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while reading or validating a [`CloudConfig`].
#[derive(Debug, Clone, Error)]
pub enum CloudConfigError {
    /// The document could not be read from disk.
    #[error("failed to read cloud configuration '{path}': {source}")]
    Read {
        /// Path that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The document is not valid JSON for the expected shape.
    #[error("failed to parse cloud configuration: {source}")]
    Parse {
        /// Underlying JSON error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The document parsed but a required value is unusable.
    #[error("invalid cloud configuration: {message}")]
    Invalid {
        /// Description of the validation failure.
        message: String,
    },
}

/// Top-level cloud configuration document.
///
/// # Example
///
/// ```
/// use cpi_config::CloudConfig;
///
/// let config = CloudConfig::from_json_str(
///     r#"{"cloud":{"plugin":"memory","properties":{"google":{"project":"demo"}}}}"#,
/// )
/// .expect("parse");
/// assert_eq!(config.plugin(), "memory");
/// assert_eq!(config.project(), "demo");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// The `cloud` section.
    pub cloud: CloudSection,
}

/// The `cloud` section naming the backend plugin and its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSection {
    /// Backend plugin name.
    pub plugin: String,
    /// Backend properties.
    #[serde(default)]
    pub properties: CloudProperties,
}

/// Properties shared with every action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudProperties {
    /// Project coordinates for the infrastructure API.
    #[serde(default)]
    pub google: GoogleProperties,
    /// Settings forwarded to the agent running on each VM.
    #[serde(default)]
    pub agent: AgentProperties,
    /// Where VMs discover their settings.
    #[serde(default)]
    pub registry: RegistryProperties,
    /// Any further properties, preserved unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Infrastructure project coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleProperties {
    /// Project identifier.
    #[serde(default)]
    pub project: String,
    /// Zone used when an action does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_zone: Option<String>,
    /// Any further properties, preserved unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Agent settings embedded into created VMs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProperties {
    /// Message bus URL the agent connects to.
    #[serde(default)]
    pub mbus: String,
    /// Blobstore the agent uses.
    #[serde(default)]
    pub blobstore: BlobstoreProperties,
}

/// Agent blobstore selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobstoreProperties {
    /// Blobstore provider name.
    #[serde(default)]
    pub provider: String,
    /// Provider options, preserved unchanged.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

/// Settings registry selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryProperties {
    /// Whether VMs read their settings from instance metadata.
    #[serde(default)]
    pub use_gce_metadata: bool,
}

impl CloudConfig {
    /// Builds the canonical document for a plugin and project.
    ///
    /// The agent talks to a local message bus and blobstore and the registry
    /// is served from instance metadata.
    #[must_use]
    pub fn new(plugin: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            cloud: CloudSection {
                plugin: plugin.into(),
                properties: CloudProperties {
                    google: GoogleProperties {
                        project: project.into(),
                        ..GoogleProperties::default()
                    },
                    agent: AgentProperties {
                        mbus: String::from("http://127.0.0.1"),
                        blobstore: BlobstoreProperties {
                            provider: String::from("local"),
                            options: Map::new(),
                        },
                    },
                    registry: RegistryProperties {
                        use_gce_metadata: true,
                    },
                    extra: Map::new(),
                },
            },
        }
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CloudConfigError::Parse`] for malformed JSON and
    /// [`CloudConfigError::Invalid`] when validation fails.
    pub fn from_json_str(text: &str) -> Result<Self, CloudConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| CloudConfigError::Parse {
            source: Arc::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CloudConfigError::Read`] when the file cannot be read, or
    /// any error from [`CloudConfig::from_json_str`].
    pub fn from_path(path: &Utf8Path) -> Result<Self, CloudConfigError> {
        let text = fs::read_to_string(path).map_err(|source| CloudConfigError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_json_str(&text)
    }

    /// Checks the values every action depends on.
    ///
    /// # Errors
    ///
    /// Returns [`CloudConfigError::Invalid`] when the plugin or project is
    /// blank.
    pub fn validate(&self) -> Result<(), CloudConfigError> {
        if self.cloud.plugin.trim().is_empty() {
            return Err(CloudConfigError::Invalid {
                message: String::from("cloud.plugin must not be empty"),
            });
        }
        if self.cloud.properties.google.project.trim().is_empty() {
            return Err(CloudConfigError::Invalid {
                message: String::from("cloud.properties.google.project must not be empty"),
            });
        }
        Ok(())
    }

    /// Backend plugin name.
    #[must_use]
    pub fn plugin(&self) -> &str {
        self.cloud.plugin.as_str()
    }

    /// Infrastructure project identifier.
    #[must_use]
    pub fn project(&self) -> &str {
        self.cloud.properties.google.project.as_str()
    }

    /// Backend properties.
    #[must_use]
    pub const fn properties(&self) -> &CloudProperties {
        &self.cloud.properties
    }
}
