//! Request dispatch.
//!
//! The [`Dispatcher`] turns request bytes into response bytes. Decoding,
//! name resolution, argument binding and execution all run inside one
//! diagnostic capture, and every failure (including a panicking action) is
//! folded into the response's `error` field. Nothing escapes `dispatch`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::action::ActionContext;
use crate::diagnostics::DiagnosticSink;
use crate::error::DispatchError;
use crate::protocol::{Request, Response};
use crate::registry::ActionFactory;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Emitted when a response cannot be encoded; always a valid envelope.
const ENCODE_FAILURE: &[u8] = br#"{"result":null,"error":{"type":"InternalError","message":"internal error: failed to encode response","ok_to_retry":false},"log":""}"#;

/// Converts request payloads into response payloads.
///
/// Transports depend on this seam rather than on [`Dispatcher`] directly.
pub trait RequestHandler {
    /// Handles one request payload and returns the encoded response, without
    /// a trailing newline.
    fn handle(&self, request: &[u8]) -> Vec<u8>;

    /// Encodes a response for a request that was rejected before dispatch,
    /// such as one exceeding the size limit.
    fn reject(&self, error: &DispatchError) -> Vec<u8>;
}

impl<H: RequestHandler + ?Sized> RequestHandler for &H {
    fn handle(&self, request: &[u8]) -> Vec<u8> {
        (**self).handle(request)
    }

    fn reject(&self, error: &DispatchError) -> Vec<u8> {
        (**self).reject(error)
    }
}

/// Resolves and executes requests against an [`ActionFactory`].
#[derive(Debug)]
pub struct Dispatcher<D> {
    factory: ActionFactory<D>,
    diagnostics: DiagnosticSink,
}

impl<D> Dispatcher<D> {
    /// Creates a dispatcher over `factory`, capturing diagnostics through
    /// `diagnostics`.
    #[must_use]
    pub const fn new(factory: ActionFactory<D>, diagnostics: DiagnosticSink) -> Self {
        Self {
            factory,
            diagnostics,
        }
    }

    /// Returns the factory requests are resolved against.
    #[must_use]
    pub const fn factory(&self) -> &ActionFactory<D> {
        &self.factory
    }

    /// Dispatches one request payload.
    ///
    /// The returned response always carries exactly one of a result or an
    /// error, and its `log` holds the diagnostics recorded while handling
    /// this request only.
    #[must_use]
    pub fn dispatch(&self, bytes: &[u8]) -> Response {
        let (outcome, log) = self.diagnostics.capture(|| self.guarded(bytes));
        Response::from_result(outcome).with_log(log)
    }

    /// Builds the response for a request rejected before dispatch.
    #[must_use]
    pub fn rejection(&self, error: &DispatchError) -> Response {
        let ((), log) = self.diagnostics.capture(|| {
            warn!(target: DISPATCH_TARGET, %error, "request rejected");
        });
        Response::failure(error.into()).with_log(log)
    }

    fn guarded(&self, bytes: &[u8]) -> Result<Value, DispatchError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(bytes)))
            .unwrap_or_else(|payload| {
                Err(DispatchError::internal(format!(
                    "action panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        match &outcome {
            Ok(_) => {}
            Err(error @ (DispatchError::Action { .. } | DispatchError::Internal { .. })) => {
                warn!(
                    target: DISPATCH_TARGET,
                    kind = error.kind().as_str(),
                    ok_to_retry = error.ok_to_retry(),
                    %error,
                    "dispatch failed"
                );
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    kind = error.kind().as_str(),
                    %error,
                    "request refused"
                );
            }
        }
        outcome
    }

    fn execute(&self, bytes: &[u8]) -> Result<Value, DispatchError> {
        let request = Request::decode(bytes)?;
        let (method, arguments, context) = request.into_parts();
        debug!(
            target: DISPATCH_TARGET,
            method = method.as_str(),
            arguments = arguments.len(),
            "dispatching request"
        );

        let action = self.factory.create(&method)?;
        let action_context = ActionContext::new(&method, &context);
        let value = action.invoke(arguments, &action_context)?;
        info!(target: DISPATCH_TARGET, method = method.as_str(), "action completed");
        Ok(value)
    }
}

impl<D> RequestHandler for Dispatcher<D> {
    fn handle(&self, request: &[u8]) -> Vec<u8> {
        encode(&self.dispatch(request))
    }

    fn reject(&self, error: &DispatchError) -> Vec<u8> {
        encode(&self.rejection(error))
    }
}

/// Encodes a response, falling back to a fixed internal-error envelope.
#[must_use]
pub fn encode(response: &Response) -> Vec<u8> {
    response.encode().unwrap_or_else(|error| {
        warn!(target: DISPATCH_TARGET, %error, "failed to encode response");
        ENCODE_FAILURE.to_vec()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic payload"))
}
