//! Evaluation context for rule predicates.
//!
//! A context carries the named variables exported by extensions. Each
//! variable starts as a supplier and is resolved lazily: the first read
//! invokes the supplier and every later read, concurrent or not, awaits
//! the very same shared future.

use crate::error::RuleError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Deferred computation of a variable value.
pub type Supplier = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<Value>> + Send>;

/// Variables exported by an extension, keyed by name.
pub type VariableMap = HashMap<String, Supplier>;

type SharedValue = Shared<BoxFuture<'static, Result<Value, RuleError>>>;

enum Slot {
    Unresolved(Supplier),
    Resolved(SharedValue),
}

/// Per-dispatch memoizing store of named asynchronous variables.
#[derive(Default)]
pub struct Context {
    variables: Mutex<HashMap<String, Slot>>,
}

impl Context {
    pub fn new(variables: VariableMap) -> Self {
        let variables = variables
            .into_iter()
            .map(|(name, supplier)| (name, Slot::Unresolved(supplier)))
            .collect();

        Self {
            variables: Mutex::new(variables),
        }
    }

    /// Resolve a variable by name.
    ///
    /// Returns `Ok(None)` for a name no extension exported. A supplier
    /// failure is reported to every reader of that variable.
    pub async fn get_variable(&self, name: &str) -> Result<Option<Value>, RuleError> {
        match self.slot(name) {
            Some(value) => value.await.map(Some),
            None => Ok(None),
        }
    }

    /// Check whether a variable was exported, without resolving it.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn slot(&self, name: &str) -> Option<SharedValue> {
        let mut variables = self.lock();

        let value = match variables.remove(name)? {
            Slot::Resolved(value) => value,
            Slot::Unresolved(supplier) => {
                let owned = name.to_string();
                supplier()
                    .map(move |result| result.map_err(|cause| RuleError::variable(&owned, &cause)))
                    .boxed()
                    .shared()
            }
        };

        variables.insert(name.to_string(), Slot::Resolved(value.clone()));

        Some(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.variables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();

        f.debug_struct("Context").field("variables", &names).finish()
    }
}

/// Wrap a ready value as a variable supplier.
pub fn constant(value: impl Into<Value>) -> Supplier {
    let value = value.into();
    Box::new(move || async move { Ok::<_, anyhow::Error>(value) }.boxed())
}

/// Wrap an async computation as a variable supplier.
pub fn deferred<F, Fut>(compute: F) -> Supplier
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Box::new(move || compute().boxed())
}
