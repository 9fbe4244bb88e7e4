//! The cloud provider interface executable.
//!
//! A host runs the binary, writes a JSON request to its stdin and reads the
//! JSON response from its stdout; diagnostics go to stderr. Startup follows a
//! fixed order:
//!
//! 1. load [`Config`] (defaults, file, `CPI_*` environment, CLI flags);
//! 2. install process-wide telemetry;
//! 3. read the [`CloudConfig`](cpi_config::CloudConfig) document and check its plugin;
//! 4. build the concrete factory and a [`Dispatcher`] whose per-request
//!    diagnostics are mirrored to stderr;
//! 5. serve one request, or every request until stdin closes, according to
//!    [`ServeMode`].
//!
//! [`exec_cpi`] and [`Harness`] drive the same wiring over in-memory buffers.

mod harness;
mod startup;
pub mod telemetry;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use cpi_actions::UuidGenerator;
use cpi_config::{Config, ServeMode};
use cpi_dispatch::{
    DiagnosticSink, Dispatcher, RecordSink, RequestHandler, Transport, TransportError, WriterSink,
};
use ortho_config::OrthoConfig;
use tracing::info;

pub use harness::{Harness, HarnessError, exec_cpi, exec_cpi_with};
pub use startup::{MEMORY_PLUGIN, StartupError, build_dispatcher, load_cloud_config};
pub use telemetry::{TelemetryError, TelemetryHandle, record_format};

const STARTUP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::startup");

/// Runs the executable against the process's standard streams.
///
/// # Errors
///
/// Returns a [`StartupError`] when configuration, telemetry, the cloud
/// document or the factory cannot be prepared, or when stdout breaks.
pub fn launch() -> Result<(), StartupError> {
    let config = Config::load().map_err(|source| StartupError::Configuration { source })?;
    telemetry::initialise(&config).map_err(|source| StartupError::Telemetry { source })?;
    let cloud_config = load_cloud_config(&config)?;

    let live: Arc<dyn RecordSink> = Arc::new(WriterSink::new(io::stderr()));
    let diagnostics = DiagnosticSink::new(live, config.log_filter())
        .map_err(|source| StartupError::Diagnostics { source })?
        .with_live_format(telemetry::record_format(config.log_format()));
    let dispatcher = build_dispatcher(cloud_config, Arc::new(UuidGenerator), diagnostics)?;

    info!(
        target: STARTUP_TARGET,
        serve_mode = %config.serve_mode(),
        "serving requests"
    );
    let stdin = io::stdin();
    serve(
        config.serve_mode(),
        stdin.lock(),
        io::stdout().lock(),
        &dispatcher,
    )
    .map_err(|source| StartupError::Transport { source })
}

/// Writes a startup failure to `stderr` as a single `cpi:` line. A broken
/// stderr is ignored; the exit status still reports the failure.
pub fn report_failure(stderr: &mut impl Write, error: &StartupError) {
    writeln!(stderr, "cpi: {error}").ok();
}

/// Serves requests from `input` in the given mode.
///
/// # Errors
///
/// Returns a [`TransportError`] when either channel fails.
pub fn serve<R, W, H>(mode: ServeMode, input: R, output: W, handler: H) -> Result<(), TransportError>
where
    R: BufRead,
    W: Write,
    H: RequestHandler,
{
    let mut transport = Transport::new(input, output, handler);
    match mode {
        ServeMode::Once => transport.serve_once(),
        ServeMode::Continuous => {
            let served = transport.serve_continuous()?;
            info!(target: STARTUP_TARGET, served, "input closed");
            Ok(())
        }
    }
}

/// The dispatcher [`build_dispatcher`] returns.
pub type ConcreteDispatcher = Dispatcher<cpi_actions::Dependencies>;

#[cfg(test)]
mod tests;
