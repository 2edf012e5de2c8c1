//! Host collaborators consumed by the engine and handed to extensions.
//!
//! The [`Sdk`] bundles the host's opaque handles with namespace-aware
//! accessors for logging and storage. A scoped view prefixes every
//! namespace it is asked for, which is how each extension gets an
//! isolated namespace without knowing its own registration name.

use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque host handle passed through to extensions unchanged.
pub type Handle = Arc<dyn Any + Send + Sync>;

/// Structured logger provided by the host.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Key-value storage provided by the host.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// The navigation location of a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty
    pub search: String,
    /// Fragment including the leading `#`, or empty
    pub hash: String,
}

impl Location {
    /// Split a path such as `/page?query#fragment` into its parts.
    pub fn parse(path: &str) -> Self {
        let (rest, hash) = match path.find('#') {
            Some(index) => path.split_at(index),
            None => (path, ""),
        };

        let (pathname, search) = match rest.find('?') {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };

        Self {
            pathname: pathname.to_string(),
            search: search.to_string(),
            hash: hash.to_string(),
        }
    }

    /// Path, query and fragment concatenated.
    pub fn path(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

/// The browsing tab the engine runs in.
pub trait Tab: Send + Sync {
    fn location(&self) -> Location;

    /// Whether the document is still loading.
    fn is_loading(&self) -> bool {
        false
    }

    /// Resolves once the document has finished loading.
    fn ready(&self) -> BoxFuture<'static, ()> {
        futures::future::ready(()).boxed()
    }
}

/// Factory for namespaced loggers and storages.
pub trait Host: Send + Sync {
    fn logger(&self, namespace: &[String]) -> Arc<dyn Logger>;
    fn tab_storage(&self, namespace: &[String]) -> Arc<dyn Storage>;
    fn browser_storage(&self, namespace: &[String]) -> Arc<dyn Storage>;
}

/// Facade over the host collaborators.
#[derive(Clone)]
pub struct Sdk {
    pub tracker: Handle,
    pub evaluator: Handle,
    pub user: Handle,
    pub session: Handle,
    pub tab: Arc<dyn Tab>,
    host: Arc<dyn Host>,
    namespace: Vec<String>,
}

impl Sdk {
    pub fn new(tab: Arc<dyn Tab>, host: Arc<dyn Host>) -> Self {
        let none: Handle = Arc::new(());

        Self {
            tracker: none.clone(),
            evaluator: none.clone(),
            user: none.clone(),
            session: none,
            tab,
            host,
            namespace: Vec::new(),
        }
    }

    pub fn with_tracker(mut self, tracker: Handle) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Handle) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_user(mut self, user: Handle) -> Self {
        self.user = user;
        self
    }

    pub fn with_session(mut self, session: Handle) -> Self {
        self.session = session;
        self
    }

    /// Namespace prepended to every logger and storage this view hands out.
    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    /// Derive a view whose namespaces are nested under `namespace`.
    ///
    /// Handles and the tab are shared with the parent view.
    pub fn scoped<I, S>(&self, namespace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scoped = self.clone();
        scoped.namespace.extend(namespace.into_iter().map(Into::into));
        scoped
    }

    pub fn get_logger(&self, namespace: &[&str]) -> Arc<dyn Logger> {
        self.host.logger(&self.qualify(namespace))
    }

    pub fn get_tab_storage(&self, namespace: &[&str]) -> Arc<dyn Storage> {
        self.host.tab_storage(&self.qualify(namespace))
    }

    pub fn get_browser_storage(&self, namespace: &[&str]) -> Arc<dyn Storage> {
        self.host.browser_storage(&self.qualify(namespace))
    }

    fn qualify(&self, namespace: &[&str]) -> Vec<String> {
        self.namespace
            .iter()
            .cloned()
            .chain(namespace.iter().map(|segment| segment.to_string()))
            .collect()
    }
}

impl fmt::Debug for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sdk")
            .field("namespace", &self.namespace)
            .field("location", &self.tab.location())
            .finish()
    }
}
