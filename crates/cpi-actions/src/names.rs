//! The closed set of action names and the concrete factory.

use cpi_dispatch::{ActionFactory, ActionRegistry, RegistryError};
use strum::{Display, EnumString, IntoStaticStr};

use crate::actions::{
    AttachDisk, CreateDisk, CreateStemcell, CreateVm, DeleteDisk, DeleteStemcell, DeleteVm,
    DetachDisk, GetDisks, HasDisk, HasVm, Info, RebootVm, SetVmMetadata,
};
use crate::dependencies::Dependencies;

/// Every method the concrete factory answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ActionName {
    /// `info`
    Info,
    /// `create_stemcell`
    CreateStemcell,
    /// `delete_stemcell`
    DeleteStemcell,
    /// `create_vm`
    CreateVm,
    /// `delete_vm`
    DeleteVm,
    /// `has_vm`
    HasVm,
    /// `reboot_vm`
    RebootVm,
    /// `set_vm_metadata`
    SetVmMetadata,
    /// `create_disk`
    CreateDisk,
    /// `delete_disk`
    DeleteDisk,
    /// `has_disk`
    HasDisk,
    /// `attach_disk`
    AttachDisk,
    /// `detach_disk`
    DetachDisk,
    /// `get_disks`
    GetDisks,
}

impl ActionName {
    /// Every name, in registration order.
    pub const ALL: [Self; 14] = [
        Self::Info,
        Self::CreateStemcell,
        Self::DeleteStemcell,
        Self::CreateVm,
        Self::DeleteVm,
        Self::HasVm,
        Self::RebootVm,
        Self::SetVmMetadata,
        Self::CreateDisk,
        Self::DeleteDisk,
        Self::HasDisk,
        Self::AttachDisk,
        Self::DetachDisk,
        Self::GetDisks,
    ];

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    fn register(self, registry: &mut ActionRegistry<Dependencies>) -> Result<(), RegistryError> {
        let name = self.as_str();
        match self {
            Self::Info => registry.register::<Info>(name),
            Self::CreateStemcell => registry.register::<CreateStemcell>(name),
            Self::DeleteStemcell => registry.register::<DeleteStemcell>(name),
            Self::CreateVm => registry.register::<CreateVm>(name),
            Self::DeleteVm => registry.register::<DeleteVm>(name),
            Self::HasVm => registry.register::<HasVm>(name),
            Self::RebootVm => registry.register::<RebootVm>(name),
            Self::SetVmMetadata => registry.register::<SetVmMetadata>(name),
            Self::CreateDisk => registry.register::<CreateDisk>(name),
            Self::DeleteDisk => registry.register::<DeleteDisk>(name),
            Self::HasDisk => registry.register::<HasDisk>(name),
            Self::AttachDisk => registry.register::<AttachDisk>(name),
            Self::DetachDisk => registry.register::<DetachDisk>(name),
            Self::GetDisks => registry.register::<GetDisks>(name),
        }
    }
}

/// Builds a registry holding every concrete action.
///
/// # Errors
///
/// Returns a [`RegistryError`] if two names collide, which would mean
/// [`ActionName::ALL`] lists a name twice.
pub fn concrete_registry() -> Result<ActionRegistry<Dependencies>, RegistryError> {
    let mut registry = ActionRegistry::new();
    for name in ActionName::ALL {
        name.register(&mut registry)?;
    }
    Ok(registry)
}

/// Builds the concrete factory over `dependencies`.
///
/// # Errors
///
/// Propagates any error from [`concrete_registry`].
pub fn concrete_factory(
    dependencies: Dependencies,
) -> Result<ActionFactory<Dependencies>, RegistryError> {
    Ok(concrete_registry()?.into_factory(dependencies))
}
