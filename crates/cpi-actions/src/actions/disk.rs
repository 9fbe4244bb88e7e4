//! Persistent disk actions.

use cpi_dispatch::{Acknowledged, Action, ActionContext, ActionFailure};
use serde_json::{Map, Value};
use tracing::info;

use super::{ACTIONS_TARGET, ATTACHED_TO, exists, require, zone};
use crate::dependencies::Dependencies;
use crate::infra::{Resource, ResourceKind};

/// Creates a disk of `size` MiB and returns its cid.
#[derive(Debug)]
pub struct CreateDisk {
    dependencies: Dependencies,
}

impl Action for CreateDisk {
    type Dependencies = Dependencies;
    type Arguments = (u64, Map<String, Value>);
    type Output = String;
    const PARAMETERS: &'static [&'static str] = &["size", "cloud_properties"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (size, cloud_properties): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<String, ActionFailure> {
        if size == 0 {
            return Err(ActionFailure::fatal("disk size must be greater than zero"));
        }
        let cid = self.dependencies.next_cid("disk");
        let disk = Resource::new(ResourceKind::Disk, cid.as_str())
            .with_property("size", size)
            .with_property("zone", zone(&self.dependencies, &cloud_properties))
            .with_property("cloud_properties", cloud_properties)
            .with_property(ATTACHED_TO, Value::Null);
        self.dependencies.infra().create(disk)?;
        info!(target: ACTIONS_TARGET, disk_cid = cid.as_str(), size, "created disk");
        Ok(cid)
    }
}

/// Deletes a detached disk.
#[derive(Debug)]
pub struct DeleteDisk {
    dependencies: Dependencies,
}

impl Action for DeleteDisk {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["disk_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (disk_cid,): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        let disk = require(&self.dependencies, ResourceKind::Disk, &disk_cid)?;
        if let Some(vm_cid) = disk.str_property(ATTACHED_TO) {
            return Err(ActionFailure::fatal(format!(
                "disk '{disk_cid}' is still attached to vm '{vm_cid}'"
            )));
        }
        self.dependencies
            .infra()
            .delete(ResourceKind::Disk, &disk_cid)?;
        info!(target: ACTIONS_TARGET, disk_cid = disk_cid.as_str(), "deleted disk");
        Ok(Acknowledged)
    }
}

/// Reports whether a disk exists.
#[derive(Debug)]
pub struct HasDisk {
    dependencies: Dependencies,
}

impl Action for HasDisk {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = bool;
    const PARAMETERS: &'static [&'static str] = &["disk_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(&self, (disk_cid,): Self::Arguments, _: &ActionContext<'_>) -> Result<bool, ActionFailure> {
        exists(&self.dependencies, ResourceKind::Disk, &disk_cid)
    }
}

/// Attaches a disk to a VM. Attaching to the VM that already holds the disk
/// is a no-op.
#[derive(Debug)]
pub struct AttachDisk {
    dependencies: Dependencies,
}

impl Action for AttachDisk {
    type Dependencies = Dependencies;
    type Arguments = (String, String);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["vm_cid", "disk_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (vm_cid, disk_cid): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        let mut disk = require(&self.dependencies, ResourceKind::Disk, &disk_cid)?;
        match disk.str_property(ATTACHED_TO) {
            Some(current) if current == vm_cid => return Ok(Acknowledged),
            Some(other) => {
                return Err(ActionFailure::fatal(format!(
                    "disk '{disk_cid}' is already attached to vm '{other}'"
                )));
            }
            None => {}
        }
        disk.properties
            .insert(String::from(ATTACHED_TO), Value::from(vm_cid.as_str()));
        self.dependencies.infra().update(disk)?;
        info!(
            target: ACTIONS_TARGET,
            vm_cid = vm_cid.as_str(),
            disk_cid = disk_cid.as_str(),
            "attached disk"
        );
        Ok(Acknowledged)
    }
}

/// Detaches a disk from the VM holding it.
#[derive(Debug)]
pub struct DetachDisk {
    dependencies: Dependencies,
}

impl Action for DetachDisk {
    type Dependencies = Dependencies;
    type Arguments = (String, String);
    type Output = Acknowledged;
    const PARAMETERS: &'static [&'static str] = &["vm_cid", "disk_cid"];

    fn new(dependencies: &Dependencies) -> Self {
        Self {
            dependencies: dependencies.clone(),
        }
    }

    fn run(
        &self,
        (vm_cid, disk_cid): Self::Arguments,
        _context: &ActionContext<'_>,
    ) -> Result<Acknowledged, ActionFailure> {
        require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        let mut disk = require(&self.dependencies, ResourceKind::Disk, &disk_cid)?;
        if disk.str_property(ATTACHED_TO) != Some(vm_cid.as_str()) {
            return Err(ActionFailure::fatal(format!(
                "disk '{disk_cid}' is not attached to vm '{vm_cid}'"
            )));
        }
        disk.properties.insert(String::from(ATTACHED_TO), Value::Null);
        self.dependencies.infra().update(disk)?;
        info!(
            target: ACTIONS_TARGET,
            vm_cid = vm_cid.as_str(),
            disk_cid = disk_cid.as_str(),
            "detached disk"
        );
        Ok(Acknowledged)
    }
}

/// Lists the cids of disks attached to a VM.
#[derive(Debug)]
pub struct GetDisks {
    dependencies: Dependencies,
}

impl Action for GetDisks {
    type Dependencies = Dependencies;
    type Arguments = (String,);
    type Output = Vec<String>;
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
    ) -> Result<Vec<String>, ActionFailure> {
        require(&self.dependencies, ResourceKind::Vm, &vm_cid)?;
        Ok(self
            .dependencies
            .infra()
            .list(ResourceKind::Disk)?
            .into_iter()
            .filter(|disk| disk.str_property(ATTACHED_TO) == Some(vm_cid.as_str()))
            .map(|disk| disk.cid)
            .collect())
    }
}
