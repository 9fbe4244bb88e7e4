//! Process-wide diagnostics on stderr.
//!
//! Records emitted outside a dispatch (startup, transport failures) go
//! through the global subscriber installed here. Records emitted while a
//! request is dispatched are routed by the per-dispatch subscriber, whose
//! live mirror uses the same [`RecordFormat`] so stderr never mixes layouts.

use std::io;

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;

use cpi_config::{Config, LogFormat};
use cpi_dispatch::{RecordFormat, record_layer};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Proof that the global subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Reasons the global subscriber could not be installed.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid filter directive.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Something else already owns the global subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Maps the configured stderr layout onto the record layout shared with the
/// per-dispatch live mirror.
#[must_use]
pub const fn record_format(format: LogFormat) -> RecordFormat {
    if format.is_structured() {
        RecordFormat::Json
    } else {
        RecordFormat::Text
    }
}

/// Installs the global subscriber on first use; later calls only hand back
/// a [`TelemetryHandle`].
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] when a global subscriber already exists.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let subscriber = Registry::default()
        .with(filter)
        .with(record_layer(record_format(config.log_format()), io::stderr));
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
