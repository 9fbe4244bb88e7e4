//! Concrete provisioning actions for the cloud provider interface.
//!
//! The crate supplies everything the dispatch core is generic over: the
//! [`Dependencies`] bundle (infrastructure client, identifier source and
//! cloud configuration), the closed [`ActionName`] set, and one
//! [`Action`](cpi_dispatch::Action) per name. [`concrete_factory`] wires them
//! into an [`ActionFactory`](cpi_dispatch::ActionFactory) ready for a
//! dispatcher.
//!
//! [`MemoryInfra`] is an in-process [`InfraClient`] used by the `memory`
//! plugin and by tests.

pub mod actions;
mod dependencies;
mod ids;
pub mod infra;
mod names;

pub use dependencies::Dependencies;
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use infra::{InfraClient, InfraError, MemoryInfra, Resource, ResourceKind};
pub use names::{ActionName, concrete_factory, concrete_registry};

#[cfg(test)]
mod tests;
