//! In-process equivalent of running the executable in serve-once mode.

use std::io::Cursor;
use std::sync::Arc;

use cpi_actions::{Dependencies, IdGenerator, UuidGenerator};
use cpi_config::CloudConfig;
use cpi_dispatch::{
    DiagnosticSink, DispatchError, Dispatcher, RecordSink, Response, Transport, TransportError,
};
use thiserror::Error;

use crate::startup::{StartupError, build_dispatcher};

/// Errors raised while driving a harness exchange.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The dispatcher could not be built.
    #[error(transparent)]
    Startup(#[from] StartupError),
    /// The in-memory channel failed.
    #[error("harness transport failed: {0}")]
    Transport(#[from] TransportError),
    /// The bytes written back were not a response envelope.
    #[error("harness received an undecodable response: {0}")]
    Decode(DispatchError),
}

/// A dispatcher over one memory backend, reused across exchanges so that
/// resources created by one request are visible to the next.
#[derive(Debug)]
pub struct Harness {
    dispatcher: Dispatcher<Dependencies>,
}

impl Harness {
    /// Builds a harness whose diagnostics reach only each response's log.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Startup`] when the cloud document is rejected.
    pub fn new(cloud_config: CloudConfig) -> Result<Self, HarnessError> {
        Self::with_parts(cloud_config, Arc::new(UuidGenerator), DiagnosticSink::discard())
    }

    /// Builds a harness that also mirrors diagnostics into `live`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Startup`] when the cloud document is rejected
    /// or `filter` does not parse.
    pub fn with_live_sink(
        cloud_config: CloudConfig,
        live: Arc<dyn RecordSink>,
        filter: &str,
    ) -> Result<Self, HarnessError> {
        let diagnostics = DiagnosticSink::new(live, filter)
            .map_err(|source| StartupError::Diagnostics { source })?;
        Self::with_parts(cloud_config, Arc::new(UuidGenerator), diagnostics)
    }

    /// Builds a harness from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Startup`] when the cloud document is rejected.
    pub fn with_parts(
        cloud_config: CloudConfig,
        ids: Arc<dyn IdGenerator>,
        diagnostics: DiagnosticSink,
    ) -> Result<Self, HarnessError> {
        Ok(Self {
            dispatcher: build_dispatcher(cloud_config, ids, diagnostics)?,
        })
    }

    /// Sends one request through a serve-once exchange and decodes the
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Transport`] or [`HarnessError::Decode`] when
    /// the exchange itself breaks. Dispatch failures are returned inside the
    /// [`Response`].
    pub fn exec(&self, request: &str) -> Result<Response, HarnessError> {
        let mut transport = Transport::new(
            Cursor::new(request.as_bytes()),
            Vec::new(),
            &self.dispatcher,
        );
        transport.serve_once()?;
        Response::decode(&transport.into_output()).map_err(HarnessError::Decode)
    }

    /// Returns the dispatcher the harness drives.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher<Dependencies> {
        &self.dispatcher
    }
}

/// Runs one request against a fresh memory backend.
///
/// # Errors
///
/// See [`Harness::new`] and [`Harness::exec`].
pub fn exec_cpi(request: &str, cloud_config: &CloudConfig) -> Result<Response, HarnessError> {
    Harness::new(cloud_config.clone())?.exec(request)
}

/// Runs one request against a fresh memory backend, mirroring its
/// diagnostics into `live` as well as [`Response::log`].
///
/// # Errors
///
/// See [`Harness::with_live_sink`] and [`Harness::exec`].
pub fn exec_cpi_with(
    request: &str,
    cloud_config: &CloudConfig,
    live: Arc<dyn RecordSink>,
) -> Result<Response, HarnessError> {
    Harness::with_live_sink(cloud_config.clone(), live, "info")?.exec(request)
}
