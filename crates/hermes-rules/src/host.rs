//! Default host collaborators: tracing-backed logging, in-memory storage
//! and a tab with a fixed location.

use crate::sdk::{Host, Location, Logger, Storage, Tab};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Logger forwarding to `tracing`, tagged with its namespace.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    namespace: String,
}

impl TracingLogger {
    pub fn new(namespace: &[String]) -> Self {
        Self {
            namespace: namespace.join(":"),
        }
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(namespace = %self.namespace, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(namespace = %self.namespace, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(namespace = %self.namespace, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(namespace = %self.namespace, "{}", message);
    }
}

/// Process-local key-value storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Host handing out tracing loggers and one memory storage per namespace.
#[derive(Debug, Default)]
pub struct DefaultHost {
    tab: Mutex<HashMap<String, Arc<MemoryStorage>>>,
    browser: Mutex<HashMap<String, Arc<MemoryStorage>>>,
}

impl DefaultHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn storage(
        storages: &Mutex<HashMap<String, Arc<MemoryStorage>>>,
        namespace: &[String],
    ) -> Arc<dyn Storage> {
        let mut storages = storages.lock().unwrap_or_else(PoisonError::into_inner);

        storages
            .entry(namespace.join(":"))
            .or_insert_with(|| Arc::new(MemoryStorage::new()))
            .clone()
    }
}

impl Host for DefaultHost {
    fn logger(&self, namespace: &[String]) -> Arc<dyn Logger> {
        Arc::new(TracingLogger::new(namespace))
    }

    fn tab_storage(&self, namespace: &[String]) -> Arc<dyn Storage> {
        Self::storage(&self.tab, namespace)
    }

    fn browser_storage(&self, namespace: &[String]) -> Arc<dyn Storage> {
        Self::storage(&self.browser, namespace)
    }
}

/// Tab with a fixed location and an optional loading phase.
#[derive(Debug, Clone)]
pub struct StaticTab {
    location: Location,
    loaded: watch::Receiver<bool>,
}

/// Marks a loading [`StaticTab`] as loaded.
#[derive(Debug)]
pub struct LoadSignal(watch::Sender<bool>);

impl LoadSignal {
    pub fn complete(&self) {
        self.0.send_replace(true);
    }
}

impl StaticTab {
    /// A tab whose document has already loaded.
    pub fn new(location: Location) -> Self {
        let (_, loaded) = watch::channel(true);

        Self { location, loaded }
    }

    /// A tab still loading until the returned signal completes.
    pub fn loading(location: Location) -> (Self, LoadSignal) {
        let (signal, loaded) = watch::channel(false);

        (Self { location, loaded }, LoadSignal(signal))
    }
}

impl Tab for StaticTab {
    fn location(&self) -> Location {
        self.location.clone()
    }

    fn is_loading(&self) -> bool {
        !*self.loaded.borrow()
    }

    fn ready(&self) -> BoxFuture<'static, ()> {
        let mut loaded = self.loaded.clone();

        async move {
            // A dropped signal can never complete; stop waiting.
            let _ = loaded.wait_for(|loaded| *loaded).await;
        }
        .boxed()
    }
}
