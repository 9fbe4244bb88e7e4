//! Concrete provisioning actions.
//!
//! Each action holds a clone of the shared [`Dependencies`] and talks to the
//! infrastructure only through [`InfraClient`](crate::infra::InfraClient).
//! Infrastructure failures convert into [`ActionFailure`]s that are retryable
//! exactly when the failure is transient.

mod disk;
mod info;
mod stemcell;
mod vm;

use cpi_dispatch::ActionFailure;
use serde_json::Value;

use crate::dependencies::Dependencies;
use crate::infra::{InfraError, Resource, ResourceKind};

pub use self::disk::{AttachDisk, CreateDisk, DeleteDisk, DetachDisk, GetDisks, HasDisk};
pub use self::info::{Info, InfoResult, STEMCELL_FORMATS};
pub use self::stemcell::{CreateStemcell, DeleteStemcell};
pub use self::vm::{CreateVm, DeleteVm, HasVm, RebootVm, SetVmMetadata};

const ACTIONS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::actions");

/// Property naming the VM a disk is attached to.
const ATTACHED_TO: &str = "attached_to";

impl From<InfraError> for ActionFailure {
    fn from(error: InfraError) -> Self {
        if error.is_transient() {
            Self::retryable(error.to_string())
        } else {
            Self::fatal(error.to_string())
        }
    }
}

/// Fetches a resource that must exist.
fn require(
    dependencies: &Dependencies,
    kind: ResourceKind,
    cid: &str,
) -> Result<Resource, ActionFailure> {
    dependencies
        .infra()
        .get(kind, cid)?
        .ok_or_else(|| InfraError::not_found(kind, cid).into())
}

/// Returns whether a resource exists.
fn exists(dependencies: &Dependencies, kind: ResourceKind, cid: &str) -> Result<bool, ActionFailure> {
    Ok(dependencies.infra().get(kind, cid)?.is_some())
}

/// Returns the zone requested in `cloud_properties`, falling back to the
/// configured default zone.
fn zone(dependencies: &Dependencies, cloud_properties: &serde_json::Map<String, Value>) -> Option<String> {
    cloud_properties
        .get("zone")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| dependencies.config().properties().google.default_zone.clone())
}

fn rejects_blank(name: &str, value: &str) -> Result<(), ActionFailure> {
    if value.trim().is_empty() {
        return Err(ActionFailure::fatal(format!("{name} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
