//! Virtual machine actions.

use cpi_dispatch::{Acknowledged, Action, ActionContext, ActionFailure};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{ACTIONS_TARGET, ATTACHED_TO, exists, rejects_blank, require, zone};
use crate::dependencies::Dependencies;
use crate::infra::{Resource, ResourceKind};

/// Context key whose value labels every VM created for a director.
const DIRECTOR_UUID: &str = "director_uuid";

/// Boots a VM from a stemcell and returns its cid.
#[derive(Debug)]
pub struct CreateVm {
    dependencies: Dependencies,
}

impl Action for CreateVm {
    type Dependencies = Dependencies;
    type Arguments = (
        String,
        String,
        Map<String, Value>,
        Map<String, Value>,
        Option<Vec<String>>,
        Option<Map<String, Value>>,
    );
    type Output = String;
    const PARAMETERS: &'static [&'static str] = &[
        "agent_id",
        "stemcell_cid",
        "cloud_properties",
        "networks",
        "disk_cids",
        "env",
    ];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (agent_id, stemcell_cid, cloud_properties, networks, disk_cids, env): Self::Arguments,
        context: &ActionContext<'_>,
    ) -> Result<String, ActionFailure> {
        rejects_blank("agent_id", &agent_id)?;
        require(&self.dependencies, ResourceKind::Stemcell, &stemcell_cid)?;
        let disk_locality = disk_cids.unwrap_or_default();
        for disk_cid in &disk_locality {
            require(&self.dependencies, ResourceKind::Disk, disk_cid)?;
        }

        let mut labels = Map::new();
        if let Some(director_uuid) = context.get_str(DIRECTOR_UUID) {
            labels.insert(String::from(DIRECTOR_UUID), Value::from(director_uuid));
        }

        let cid = self.dependencies.next_cid("vm");
        let vm = Resource::new(ResourceKind::Vm, cid.as_str())
            .with_property("agent_id", agent_id)
            .with_property("stemcell_cid", stemcell_cid)
            .with_property("zone", zone(&self.dependencies, &cloud_properties))
            .with_property("cloud_properties", cloud_properties)
            .with_property("networks", networks)
            .with_property("disk_locality", disk_locality)
            .with_property("env", env.unwrap_or_default())
            .with_property("labels", labels)
            .with_property("metadata", Map::new());
        self.dependencies.infra().create(vm)?;
        info!(target: ACTIONS_TARGET, vm_cid = cid.as_str(), "created vm");
        Ok(cid)
    }
}

/// Deletes a VM, detaching any disks still attached to it.
#[derive(Debug)]
pub struct DeleteVm {
    dependencies: Dependencies,
}

impl Action for DeleteVm {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["vm_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (vm_cid,): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        let infra = self.dependencies.infra();
        for mut disk in infra.list(ResourceKind::Disk)? {
            if disk.str_property(ATTACHED_TO) == Some(vm_cid.as_str()) {
                debug!(
                    target: ACTIONS_TARGET,
                    vm_cid = vm_cid.as_str(),
                    disk_cid = disk.cid.as_str(),
                    "detaching disk from deleted vm"
                );
                disk.properties.insert(String::from(ATTACHED_TO), Value::Null);
                infra.update(disk)?;
            }
        }
        infra.delete(ResourceKind::Vm, &vm_cid)?;
        info!(target: ACTIONS_TARGET, vm_cid = vm_cid.as_str(), "deleted vm");
        Ok(Acknowledged)
    }
}

/// Reports whether a VM exists.
#[derive(Debug)]
pub struct HasVm {
    dependencies: Dependencies,
}

impl Action for HasVm {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = bool;
    const PARAMETERS: &'static [&'static str] = &["vm_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(&self, (vm_cid,): Self::Arguments, _: &ActionContext<'_>) -> Result<bool, ActionFailure> {
        exists(&self.dependencies, ResourceKind::Vm, &vm_cid)
    }
}

/// Reboots a VM.
#[derive(Debug)]
pub struct RebootVm {
    dependencies: Dependencies,
}

impl Action for RebootVm {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["vm_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (vm_cid,): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        let mut vm = require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        let reboots = vm
            .property("reboot_count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .saturating_add(1);
        vm.properties
            .insert(String::from("reboot_count"), Value::from(reboots));
        self.dependencies.infra().update(vm)?;
        info!(target: ACTIONS_TARGET, vm_cid = vm_cid.as_str(), reboots, "rebooted vm");
        Ok(Acknowledged)
    }
}

/// Merges metadata into a VM's existing metadata.
#[derive(Debug)]
pub struct SetVmMetadata {
    dependencies: Dependencies,
}

impl Action for SetVmMetadata {
    type Dependencies = Dependencies;
    type Arguments = (String, Map<String, Value>);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["vm_cid", "metadata"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (vm_cid, metadata): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        let mut vm = require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        let mut merged = match vm.properties.remove("metadata") {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        let keys = metadata.len();
        merged.extend(metadata);
        vm.properties
            .insert(String::from("metadata"), Value::Object(merged));
        self.dependencies.infra().update(vm)?;
        debug!(target: ACTIONS_TARGET, vm_cid = vm_cid.as_str(), keys, "set vm metadata");
        Ok(Acknowledged)
    }
}
