//! In-process infrastructure backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{InfraClient, InfraError, Resource, ResourceKind};

const INFRA_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::infra");

type Store = BTreeMap<(ResourceKind, String), Resource>;

/// Mutex-guarded map of resources, used by the `memory` plugin and tests.
#[derive(Debug, Default)]
pub struct MemoryInfra {
    resources: Mutex<Store>,
}

impl MemoryInfra {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored resources of `kind`.
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.lock().keys().filter(|(stored, _)| *stored == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InfraClient for MemoryInfra {
    fn create(&self, resource: Resource) -> Result<Resource, InfraError> {
        let mut resources = self.lock();
        let key = (resource.kind, resource.cid.clone());
        if resources.contains_key(&key) {
            return Err(InfraError::Conflict {
                kind: resource.kind,
                cid: resource.cid,
                message: String::from("identifier already in use"),
            });
        }
        debug!(target: INFRA_TARGET, kind = %resource.kind, cid = resource.cid.as_str(), "created");
        resources.insert(key, resource.clone());
        Ok(resource)
    }

    fn get(&self, kind: ResourceKind, cid: &str) -> Result<Option<Resource>, InfraError> {
        Ok(self.lock().get(&(kind, cid.to_owned())).cloned())
    }

    fn update(&self, resource: Resource) -> Result<Resource, InfraError> {
        let mut resources = self.lock();
        let entry = resources
            .get_mut(&(resource.kind, resource.cid.clone()))
            .ok_or_else(|| InfraError::not_found(resource.kind, resource.cid.as_str()))?;
        *entry = resource.clone();
        debug!(target: INFRA_TARGET, kind = %resource.kind, cid = resource.cid.as_str(), "updated");
        Ok(resource)
    }

    fn delete(&self, kind: ResourceKind, cid: &str) -> Result<(), InfraError> {
        self.lock()
            .remove(&(kind, cid.to_owned()))
            .ok_or_else(|| InfraError::not_found(kind, cid))?;
        debug!(target: INFRA_TARGET, kind = %kind, cid, "deleted");
        Ok(())
    }

    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, InfraError> {
        Ok(self
            .lock()
            .iter()
            .filter(|((stored, _), _)| *stored == kind)
            .map(|(_, resource)| resource.clone())
            .collect())
    }
}
