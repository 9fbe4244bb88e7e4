//! Action registry and factory.
//!
//! The [`ActionRegistry`] maps action names to monomorphised invokers, each
//! carrying the action's declared parameter list. Names are unique and the
//! registry is populated once; [`ActionRegistry::into_factory`] then binds it
//! to the shared dependencies and yields an [`ActionFactory`] with no
//! mutators. Resolving a name never builds the action: construction happens
//! inside [`ResolvedAction::invoke`], after the arguments have been bound.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::action::{self, Action, ActionContext};
use crate::error::{DispatchError, RegistryError};

type Invoker<D> = fn(&D, Vec<Value>, &ActionContext<'_>) -> Result<Value, DispatchError>;

struct Entry<D> {
    parameters: &'static [&'static str],
    invoke: Invoker<D>,
}

/// Name-to-action table populated before dispatch begins.
///
/// # Example
///
/// ```
/// use cpi_dispatch::action::{Action, ActionContext, ActionFailure, NoArguments};
/// use cpi_dispatch::registry::ActionRegistry;
///
/// struct Ping;
///
/// impl Action for Ping {
///     type Dependencies = ();
///     type Arguments = NoArguments;
///     type Output = &'static str;
///     const PARAMETERS: &'static [&'static str] = &[];
///
///     fn new(_dependencies: &()) -> Self {
///         Self
///     }
///
///     fn run(
///         &self,
///         _arguments: NoArguments,
///         _context: &ActionContext<'_>,
///     ) -> Result<&'static str, ActionFailure> {
///         Ok("pong")
///     }
/// }
///
/// let mut registry = ActionRegistry::new();
/// registry.register::<Ping>("ping").expect("registration succeeds");
/// let factory = registry.into_factory(());
/// assert!(factory.create("ping").is_ok());
/// assert!(factory.create("pong").is_err());
/// ```
pub struct ActionRegistry<D> {
    entries: BTreeMap<String, Entry<D>>,
}

impl<D> Default for ActionRegistry<D> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<D> fmt::Debug for ActionRegistry<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ActionRegistry")
            .field("actions", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<D> ActionRegistry<D> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers action `A` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] for a blank name and
    /// [`RegistryError::Duplicate`] if the name is already registered.
    pub fn register<A>(&mut self, name: impl Into<String>) -> Result<(), RegistryError>
    where
        A: Action<Dependencies = D>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        self.entries.insert(
            name,
            Entry {
                parameters: A::PARAMETERS,
                invoke: action::invoke::<A>,
            },
        );
        Ok(())
    }

    /// Returns whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the declared parameters of a registered action.
    #[must_use]
    pub fn parameters(&self, name: &str) -> Option<&'static [&'static str]> {
        self.entries.get(name).map(|entry| entry.parameters)
    }

    /// Returns registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the registry and binds it to the shared dependencies.
    #[must_use]
    pub const fn into_factory(self, dependencies: D) -> ActionFactory<D> {
        ActionFactory {
            registry: self,
            dependencies,
        }
    }
}

/// Immutable registry bound to the dependencies every action shares.
///
/// The factory performs no I/O; it only resolves names.
pub struct ActionFactory<D> {
    registry: ActionRegistry<D>,
    dependencies: D,
}

impl<D> fmt::Debug for ActionFactory<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ActionFactory")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<D> ActionFactory<D> {
    /// Resolves `name` to an action ready to be invoked.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownAction`] when `name` is not registered.
    pub fn create(&self, name: &str) -> Result<ResolvedAction<'_, D>, DispatchError> {
        let (name, entry) = self
            .registry
            .entries
            .get_key_value(name)
            .ok_or_else(|| DispatchError::unknown_action(name))?;
        Ok(ResolvedAction {
            name: name.as_str(),
            entry,
            dependencies: &self.dependencies,
        })
    }

    /// Returns the registry the factory was built from.
    #[must_use]
    pub const fn registry(&self) -> &ActionRegistry<D> {
        &self.registry
    }

    /// Returns the shared dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &D {
        &self.dependencies
    }
}

/// A registered action resolved by name, not yet built.
pub struct ResolvedAction<'f, D> {
    name: &'f str,
    entry: &'f Entry<D>,
    dependencies: &'f D,
}

impl<D> fmt::Debug for ResolvedAction<'_, D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResolvedAction")
            .field("name", &self.name)
            .field("parameters", &self.entry.parameters)
            .finish_non_exhaustive()
    }
}

impl<D> ResolvedAction<'_, D> {
    /// Returns the registered name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name
    }

    /// Returns the declared parameter names.
    #[must_use]
    pub const fn parameters(&self) -> &'static [&'static str] {
        self.entry.parameters
    }

    /// Binds the arguments, builds the action and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Argument`] when binding fails (the action is
    /// not built) or [`DispatchError::Action`] when the action fails.
    pub fn invoke(
        &self,
        arguments: Vec<Value>,
        context: &ActionContext<'_>,
    ) -> Result<Value, DispatchError> {
        (self.entry.invoke)(self.dependencies, arguments, context)
    }
}
