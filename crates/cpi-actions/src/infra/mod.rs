//! Infrastructure client boundary.
//!
//! Actions reach the target infrastructure only through [`InfraClient`], a
//! small set of create/read/update/delete primitives over typed
//! [`Resource`]s. Every call either returns a value or a classified
//! [`InfraError`]; only [`InfraError::Unavailable`] is transient.

mod memory;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use thiserror::Error;

pub use self::memory::MemoryInfra;

/// Kinds of resource managed through the client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    /// A bootable machine image.
    Stemcell,
    /// A virtual machine instance.
    Vm,
    /// A persistent disk.
    Disk,
}

/// A resource record held by the infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Opaque identifier assigned at creation.
    pub cid: String,
    /// Free-form properties recorded with the resource.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Resource {
    /// Creates a resource with no properties.
    #[must_use]
    pub fn new(kind: ResourceKind, cid: impl Into<String>) -> Self {
        Self {
            kind,
            cid: cid.into(),
            properties: Map::new(),
        }
    }

    /// Sets a property, replacing any previous value.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns a string property.
    #[must_use]
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Classified failures returned by an [`InfraClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfraError {
    /// The resource does not exist.
    #[error("{kind} '{cid}' not found")]
    NotFound {
        /// Kind that was looked up.
        kind: ResourceKind,
        /// Identifier that was looked up.
        cid: String,
    },
    /// The resource already exists or is in a conflicting state.
    #[error("{kind} '{cid}' conflicts with an existing resource: {message}")]
    Conflict {
        /// Kind of the conflicting resource.
        kind: ResourceKind,
        /// Identifier of the conflicting resource.
        cid: String,
        /// Description of the conflict.
        message: String,
    },
    /// The infrastructure could not be reached; the call may succeed later.
    #[error("infrastructure unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },
    /// The request was rejected as invalid.
    #[error("invalid infrastructure request: {message}")]
    Invalid {
        /// Description of the rejection.
        message: String,
    },
    /// Any other failure.
    #[error("infrastructure failure: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl InfraError {
    /// Returns whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: ResourceKind, cid: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            cid: cid.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Create/read/update/delete primitives against the target infrastructure.
pub trait InfraClient: Send + Sync {
    /// Stores a new resource.
    ///
    /// # Errors
    ///
    /// Returns [`InfraError::Conflict`] when a resource with the same kind and
    /// identifier exists.
    fn create(&self, resource: Resource) -> Result<Resource, InfraError>;

    /// Fetches a resource, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`] when the lookup itself fails.
    fn get(&self, kind: ResourceKind, cid: &str) -> Result<Option<Resource>, InfraError>;

    /// Replaces an existing resource.
    ///
    /// # Errors
    ///
    /// Returns [`InfraError::NotFound`] when the resource does not exist.
    fn update(&self, resource: Resource) -> Result<Resource, InfraError>;

    /// Removes a resource.
    ///
    /// # Errors
    ///
    /// Returns [`InfraError::NotFound`] when the resource does not exist.
    fn delete(&self, kind: ResourceKind, cid: &str) -> Result<(), InfraError>;

    /// Lists every resource of `kind`, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`] when the listing fails.
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, InfraError>;
}
