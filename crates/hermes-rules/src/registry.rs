//! ExtensionRegistry mapping extension names to factories.
//!
//! The registry is an explicit object handed to each engine rather than
//! ambient global state. It can still be extended after an engine has been
//! built; an engine looks names up the first time it needs its extensions.

use crate::extension::{Extension, ExtensionArgs, ExtensionFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for building extensions by name.
///
/// Registering a name twice replaces the earlier factory.
///
/// # Example
///
/// ```ignore
/// use hermes_rules::registry::ExtensionRegistry;
///
/// let registry = ExtensionRegistry::new();
///
/// registry.register("audit", |args| {
///     Ok(Box::new(AuditExtension::new(args.sdk)))
/// });
///
/// let engine = RuleEngine::new(config, sdk, Arc::new(registry))?;
/// ```
#[derive(Default)]
pub struct ExtensionRegistry {
    factories: RwLock<HashMap<String, ExtensionFactory>>,
}

impl ExtensionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension factory, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ExtensionArgs) -> anyhow::Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(factory));
    }

    /// Check if an extension is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// List all registered extension names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up the factory registered under `name`.
    pub fn get(&self, name: &str) -> Option<ExtensionFactory> {
        self.read().get(name).cloned()
    }

    /// Build an extension by name.
    ///
    /// Returns `None` if nothing is registered under `name`. The factory
    /// runs outside the registry lock, so it may register other extensions.
    pub fn create(&self, name: &str, args: ExtensionArgs) -> Option<anyhow::Result<Box<dyn Extension>>> {
        let factory = self.get(name)?;
        Some(factory(args))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ExtensionFactory>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.list())
            .finish()
    }
}
