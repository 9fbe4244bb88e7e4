//! Wire envelope types for the action-dispatch protocol.
//!
//! A host writes one [`Request`] document and reads back one [`Response`]
//! document. Requests name an action, carry positional arguments and an
//! optional context map:
//!
//! ```json
//! {"method":"create_disk","arguments":[1024,{}],"context":{"director_uuid":"abc"}}
//! ```
//!
//! Responses carry exactly one of `result` or `error`, plus the diagnostic
//! text recorded while the request was handled:
//!
//! ```json
//! {"result":"disk-123","error":null,"log":"..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Request envelope decoded from the host.
///
/// # Example
///
/// ```
/// use cpi_dispatch::protocol::Request;
///
/// let request = Request::decode(br#"{"method":"has_vm","arguments":["vm-1"]}"#)
///     .expect("decode");
/// assert_eq!(request.method(), "has_vm");
/// assert_eq!(request.arguments().len(), 1);
/// assert!(request.context().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    method: String,
    arguments: Vec<Value>,
    context: Map<String, Value>,
}

/// Permissive view of the envelope used to tell missing fields apart from
/// fields of the wrong type.
#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    context: Option<Map<String, Value>>,
}

impl Request {
    /// Creates a request with an empty context.
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            arguments,
            context: Map::new(),
        }
    }

    /// Replaces the context map.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Decodes a request from raw bytes.
    ///
    /// Trailing whitespace (including a newline delimiter) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Protocol`] when the bytes are empty, are not a
    /// JSON object, or carry envelope fields of the wrong type. Returns
    /// [`DispatchError::Argument`] when `method` or `arguments` is missing, or
    /// when `method` is blank.
    pub fn decode(bytes: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_ascii_whitespace(bytes);
        if trimmed.is_empty() {
            return Err(DispatchError::protocol("request was empty"));
        }

        let document: Value =
            serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)?;
        let Value::Object(fields) = document else {
            return Err(DispatchError::protocol("request must be a JSON object"));
        };
        let raw: RawRequest = serde_json::from_value(Value::Object(fields))
            .map_err(DispatchError::from_json_error)?;

        let method = raw
            .method
            .ok_or_else(|| DispatchError::argument("request is missing the 'method' field"))?;
        if method.trim().is_empty() {
            return Err(DispatchError::argument("request 'method' must not be empty"));
        }
        let arguments = raw
            .arguments
            .ok_or_else(|| DispatchError::argument("request is missing the 'arguments' field"))?;

        Ok(Self {
            method,
            arguments,
            context: raw.context.unwrap_or_default(),
        })
    }

    /// Encodes the request as a single JSON line without the newline.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Returns the action name.
    #[must_use]
    pub const fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Returns the auxiliary context.
    #[must_use]
    pub const fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Splits the request into method, arguments and context.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>, Map<String, Value>) {
        (self.method, self.arguments, self.context)
    }
}

/// Classification tag carried in [`ErrorDescriptor::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request bytes were not a well-formed envelope.
    ProtocolError,
    /// The method is not registered.
    UnknownAction,
    /// Arguments did not match the action's parameters.
    ArgumentError,
    /// The action ran and failed.
    ActionError,
    /// Any failure nothing else classified.
    InternalError,
}

impl ErrorKind {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolError => "ProtocolError",
            Self::UnknownAction => "UnknownAction",
            Self::ArgumentError => "ArgumentError",
            Self::ActionError => "ActionError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Structured error carried by a failed [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
    #[serde(default)]
    ok_to_retry: bool,
}

impl ErrorDescriptor {
    /// Creates a descriptor that is not safe to retry.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            ok_to_retry: false,
        }
    }

    /// Sets whether the caller may resend the same request.
    #[must_use]
    pub const fn with_retry(mut self, ok_to_retry: bool) -> Self {
        self.ok_to_retry = ok_to_retry;
        self
    }

    /// Returns the classification tag.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns whether the caller may resend the same request.
    #[must_use]
    pub const fn ok_to_retry(&self) -> bool {
        self.ok_to_retry
    }
}

impl From<&DispatchError> for ErrorDescriptor {
    fn from(error: &DispatchError) -> Self {
        Self::new(error.kind(), error.to_string()).with_retry(error.ok_to_retry())
    }
}

/// Either the action's value or the error that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The action's value. Never JSON `null`.
    Result(Value),
    /// The failure descriptor.
    Error(ErrorDescriptor),
}

/// Response envelope returned to the host.
///
/// The type admits exactly one of a result or an error, so every value
/// encodes to an envelope with exactly one non-null field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse", into = "WireResponse")]
pub struct Response {
    outcome: Outcome,
    log: String,
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorDescriptor>,
    #[serde(default)]
    log: String,
}

impl Response {
    /// Creates a successful response.
    ///
    /// A `null` value is indistinguishable from an absent result on the wire,
    /// so it is recorded as an [`ErrorKind::InternalError`] instead.
    #[must_use]
    pub fn success(result: Value) -> Self {
        let outcome = if result.is_null() {
            Outcome::Error(ErrorDescriptor::new(
                ErrorKind::InternalError,
                "action produced a null result",
            ))
        } else {
            Outcome::Result(result)
        };
        Self {
            outcome,
            log: String::new(),
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub const fn failure(error: ErrorDescriptor) -> Self {
        Self {
            outcome: Outcome::Error(error),
            log: String::new(),
        }
    }

    /// Builds a response from a dispatch result.
    #[must_use]
    pub fn from_result(result: Result<Value, DispatchError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(ErrorDescriptor::from(&error)),
        }
    }

    /// Attaches the diagnostic text for this invocation.
    #[must_use]
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    /// Returns the result value when the request succeeded.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Returns the error descriptor when the request failed.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorDescriptor> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    /// Returns the outcome.
    #[must_use]
    pub const fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns whether the request succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Returns the diagnostic text.
    #[must_use]
    pub const fn log(&self) -> &str {
        self.log.as_str()
    }

    /// Encodes the response as a single JSON line without the newline.
    ///
    /// Object keys inside the result are emitted in sorted order, so equal
    /// responses always encode to identical bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a response, as a host would.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Protocol`] if the bytes are not a response
    /// envelope with exactly one of `result` and `error`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DispatchError> {
        serde_json::from_slice(trim_ascii_whitespace(bytes)).map_err(DispatchError::from_json_error)
    }
}

impl TryFrom<WireResponse> for Response {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let outcome = match (wire.result, wire.error) {
            (Some(value), None) => Outcome::Result(value),
            (None, Some(error)) => Outcome::Error(error),
            (Some(_), Some(_)) => {
                return Err(String::from("response carries both a result and an error"));
            }
            (None, None) => {
                return Err(String::from("response carries neither a result nor an error"));
            }
        };
        Ok(Self {
            outcome,
            log: wire.log,
        })
    }
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        let (result, error) = match response.outcome {
            Outcome::Result(value) => (Some(canonicalize(value)), None),
            Outcome::Error(error) => (None, Some(error)),
        };
        Self {
            result,
            error,
            log: response.log,
        }
    }
}

/// Rebuilds every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields.into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, nested)| (key, canonicalize(nested)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Trims leading and trailing ASCII whitespace from a byte slice.
fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    bytes.trim_ascii()
}
