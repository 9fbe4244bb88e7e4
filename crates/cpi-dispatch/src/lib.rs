//! Action-dispatch protocol core for the cloud provider interface.
//!
//! A host sends a JSON request naming an action, carrying positional
//! arguments and an optional context map. This crate decodes the request,
//! resolves the action by name in an [`ActionRegistry`], binds the arguments
//! to the action's typed parameters, runs it, and encodes a response holding
//! exactly one of a result or a structured error, together with the
//! diagnostics recorded while that one request was handled.
//!
//! The crate is generic over the dependency bundle actions are built from;
//! concrete provisioning actions live elsewhere and register themselves
//! through [`ActionRegistry::register`].
//!
//! ## Flow
//!
//! ```text
//! Transport ─bytes─▶ Dispatcher ─Request─▶ ActionFactory ─▶ Action
//!     ▲                  │
//!     └────bytes─────────┘◀──Response (result | error, log)
//! ```
//!
//! Failures never escape [`Dispatcher::dispatch`]: malformed bytes, unknown
//! methods, argument mismatches, action failures and panics all become a
//! populated `error` field. Only a broken input or output channel surfaces
//! as a [`TransportError`].

pub mod action;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use action::{Acknowledged, Action, ActionContext, ActionFailure, NoArguments, bind};
pub use diagnostics::{
    BufferSink, DiagnosticSink, DiagnosticsError, FanOutSink, RecordFormat, RecordSink, WriterSink,
    record_layer,
};
pub use dispatcher::{Dispatcher, RequestHandler};
pub use error::{DispatchError, RegistryError, TransportError};
pub use protocol::{ErrorDescriptor, ErrorKind, Outcome, Request, Response};
pub use registry::{ActionFactory, ActionRegistry, ResolvedAction};
pub use transport::{MAX_REQUEST_BYTES, Transport};

#[cfg(test)]
mod tests;
