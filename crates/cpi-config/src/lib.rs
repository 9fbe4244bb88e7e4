//! Shared configuration for the cloud provider interface executable.
//!
//! Two kinds of configuration live here. [`Config`] governs the process
//! itself (log filter and format, the transport lifecycle, and where to find
//! the cloud document); it is layered by `ortho_config` from defaults, a
//! configuration file, `CPI_*` environment variables and CLI flags. The
//! [`CloudConfig`] document describes the target infrastructure and is
//! handed to the action factory verbatim, once, at construction.

mod cloud;
mod defaults;
mod logging;
mod serve;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::cloud::{
    AgentProperties, BlobstoreProperties, CloudConfig, CloudConfigError, CloudProperties,
    CloudSection, GoogleProperties, RegistryProperties,
};
pub use self::defaults::{
    DEFAULT_LOG_FILTER, default_log_filter, default_log_filter_string, default_log_format,
    default_serve_mode,
};
pub use self::logging::{LogFormat, LogFormatParseError};
pub use self::serve::ServeMode;

/// Process-level configuration resolved once at startup.
///
/// Values are merged in ascending precedence: built-in defaults, the file
/// named by `--config-path`/`CPI_CONFIG_PATH`, `CPI_*` environment variables,
/// and finally command-line flags.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "CPI")]
pub struct Config {
    /// Tracing filter expression applied to diagnostics.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for process-wide diagnostics.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Whether to answer one request or stay resident.
    #[ortho_config(default = default_serve_mode())]
    #[serde(default = "default_serve_mode")]
    pub serve_mode: ServeMode,
    /// Location of the cloud configuration document.
    #[serde(default)]
    pub cloud_config: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            serve_mode: default_serve_mode(),
            cloud_config: None,
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for process-wide diagnostics.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Transport lifecycle.
    #[must_use]
    pub const fn serve_mode(&self) -> ServeMode {
        self.serve_mode
    }

    /// Path to the cloud configuration document, when one was supplied.
    #[must_use]
    pub fn cloud_config(&self) -> Option<&Utf8Path> {
        self.cloud_config.as_deref()
    }
}
