//! Typed actions and positional argument binding.
//!
//! An [`Action`] declares its parameter names and a typed `Arguments` value
//! (a tuple, or [`NoArguments`]). [`bind`] checks the argument count against
//! the declared parameters and then deserializes the positional values into
//! the typed form. Binding always completes before the action is built, so
//! a mismatched request never reaches the action's constructor.

use std::fmt;

use serde::de::{self, DeserializeOwned, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::DispatchError;

/// A provisioning operation invoked by name.
///
/// # Example
///
/// ```
/// use cpi_dispatch::action::{Action, ActionContext, ActionFailure};
///
/// struct Echo;
///
/// impl Action for Echo {
///     type Dependencies = ();
///     type Arguments = (String,);
///     type Output = String;
///     const PARAMETERS: &'static [&'static str] = &["text"];
///
///     fn new(_dependencies: &()) -> Self {
///         Self
///     }
///
///     fn run(
///         &self,
///         (text,): Self::Arguments,
///         _context: &ActionContext<'_>,
///     ) -> Result<String, ActionFailure> {
///         Ok(text)
///     }
/// }
/// ```
pub trait Action: Sized {
    /// Shared dependencies the action is built from.
    type Dependencies;
    /// Typed positional arguments.
    type Arguments: DeserializeOwned;
    /// Value returned on success.
    type Output: Serialize;
    /// Parameter names in binding order.
    const PARAMETERS: &'static [&'static str];

    /// Builds the action from the factory's shared dependencies.
    fn new(dependencies: &Self::Dependencies) -> Self;

    /// Executes the action.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionFailure`] describing why the action failed and
    /// whether the caller may retry.
    fn run(
        &self,
        arguments: Self::Arguments,
        context: &ActionContext<'_>,
    ) -> Result<Self::Output, ActionFailure>;
}

/// Failure reported by an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionFailure {
    message: String,
    ok_to_retry: bool,
}

impl ActionFailure {
    /// A failure the caller must not retry.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ok_to_retry: false,
        }
    }

    /// A transient failure the caller may retry.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ok_to_retry: true,
        }
    }

    /// Returns the failure description.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns whether the caller may retry.
    #[must_use]
    pub const fn ok_to_retry(&self) -> bool {
        self.ok_to_retry
    }

    /// Consumes the failure, returning its description.
    #[must_use]
    pub fn into_message(self) -> String {
        self.message
    }
}

/// Per-request information passed to a running action.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    method: &'a str,
    context: &'a Map<String, Value>,
}

impl<'a> ActionContext<'a> {
    /// Creates a context for one invocation.
    #[must_use]
    pub const fn new(method: &'a str, context: &'a Map<String, Value>) -> Self {
        Self { method, context }
    }

    /// Returns the method the action was invoked as.
    #[must_use]
    pub const fn method(&self) -> &'a str {
        self.method
    }

    /// Returns the request context, unmodified.
    #[must_use]
    pub const fn values(&self) -> &'a Map<String, Value> {
        self.context
    }

    /// Returns a string value from the request context.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.context.get(key).and_then(Value::as_str)
    }
}

/// Arguments for actions that take none. Binds only an empty list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoArguments;

impl<'de> Deserialize<'de> for NoArguments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EmptySequence;

        impl<'de> Visitor<'de> for EmptySequence {
            type Value = NoArguments;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an empty argument list")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<NoArguments, A::Error> {
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(1, &self));
                }
                Ok(NoArguments)
            }
        }

        deserializer.deserialize_seq(EmptySequence)
    }
}

/// Result of actions that have no natural value; encodes as `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acknowledged;

impl Serialize for Acknowledged {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

/// Binds positional arguments to an action's typed parameters.
///
/// # Errors
///
/// Returns [`DispatchError::Argument`] when the number of arguments differs
/// from `parameters`, or when a value does not fit its parameter's type.
pub fn bind<T: DeserializeOwned>(
    method: &str,
    parameters: &[&str],
    arguments: Vec<Value>,
) -> Result<T, DispatchError> {
    if arguments.len() != parameters.len() {
        return Err(DispatchError::argument(format!(
            "'{method}' expects {expected} argument(s) [{names}], got {actual}",
            expected = parameters.len(),
            names = parameters.join(", "),
            actual = arguments.len(),
        )));
    }

    serde_json::from_value(Value::Array(arguments)).map_err(|error| {
        DispatchError::argument(format!(
            "'{method}' arguments [{names}] do not match: {error}",
            names = parameters.join(", "),
        ))
    })
}

/// Binds, builds and runs an action, returning its encoded output.
///
/// # Errors
///
/// Returns [`DispatchError::Argument`] from binding (before the action is
/// built), [`DispatchError::Action`] when the action fails, and
/// [`DispatchError::Internal`] when its output cannot be encoded.
pub fn invoke<A: Action>(
    dependencies: &A::Dependencies,
    arguments: Vec<Value>,
    context: &ActionContext<'_>,
) -> Result<Value, DispatchError> {
    let bound = bind::<A::Arguments>(context.method(), A::PARAMETERS, arguments)?;
    let action = A::new(dependencies);
    let output = action
        .run(bound, context)
        .map_err(|failure| DispatchError::action(context.method(), failure))?;
    serde_json::to_value(output).map_err(|error| {
        DispatchError::internal(format!(
            "failed to encode result of '{}': {error}",
            context.method()
        ))
    })
}
