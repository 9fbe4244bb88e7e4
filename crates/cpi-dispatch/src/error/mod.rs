//! Domain errors raised while dispatching requests.
//!
//! [`DispatchError`] is the closed taxonomy every failure is folded into
//! before it reaches the response channel. Each variant maps to exactly one
//! [`ErrorKind`]; only [`DispatchError::Action`] may be marked as safe to
//! retry, and only when the action said so. JSON errors are wrapped in `Arc`
//! so the type stays `Clone`.

use std::sync::Arc;

use thiserror::Error;

use crate::action::ActionFailure;
use crate::protocol::ErrorKind;

/// Errors surfaced while decoding, resolving, binding or executing a request.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Request bytes were not a well-formed envelope.
    #[error("malformed request: {message}")]
    Protocol {
        /// Description of the malformation.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<Arc<serde_json::Error>>,
    },

    /// The method is not in the registry.
    #[error("unknown action '{method}'")]
    UnknownAction {
        /// Method that was looked up.
        method: String,
    },

    /// Arguments did not match the action's parameters, or a required
    /// envelope field was missing.
    #[error("invalid arguments: {message}")]
    Argument {
        /// Description of the mismatch.
        message: String,
    },

    /// The action ran and reported a failure.
    #[error("action '{method}' failed: {message}")]
    Action {
        /// Method that failed.
        method: String,
        /// The action's own description of the failure.
        message: String,
        /// Whether the action marked the failure as transient.
        ok_to_retry: bool,
    },

    /// An unexpected failure, including panics raised by an action.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl DispatchError {
    /// Returns the wire classification for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::UnknownAction { .. } => ErrorKind::UnknownAction,
            Self::Argument { .. } => ErrorKind::ArgumentError,
            Self::Action { .. } => ErrorKind::ActionError,
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// Returns whether the caller may resend the same request.
    #[must_use]
    pub const fn ok_to_retry(&self) -> bool {
        match self {
            Self::Action { ok_to_retry, .. } => *ok_to_retry,
            Self::Protocol { .. }
            | Self::UnknownAction { .. }
            | Self::Argument { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Creates a protocol error from a serde error.
    #[must_use]
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Protocol {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a protocol error with a custom message.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unknown action error.
    #[must_use]
    pub fn unknown_action(method: impl Into<String>) -> Self {
        Self::UnknownAction {
            method: method.into(),
        }
    }

    /// Creates an argument error.
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Wraps a failure reported by an action.
    #[must_use]
    pub fn action(method: impl Into<String>, failure: ActionFailure) -> Self {
        let ok_to_retry = failure.ok_to_retry();
        Self::Action {
            method: method.into(),
            message: failure.into_message(),
            ok_to_retry,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors raised while populating an action registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An action with the same name is already registered.
    #[error("action '{name}' is already registered")]
    Duplicate {
        /// Name that was registered twice.
        name: String,
    },
    /// The action name is blank.
    #[error("action names must not be empty")]
    EmptyName,
}

/// Errors raised when the transport channels themselves fail.
///
/// These are the only errors that escape a transport: they mean no response
/// could be delivered at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading from the input channel failed.
    #[error("failed to read request: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing to the output channel failed.
    #[error("failed to write response: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
