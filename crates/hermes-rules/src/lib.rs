//! Rule matching and extension dispatch for navigation paths.
//!
//! Given the current path, a set of page patterns mapped to rule sets and
//! a group of pluggable extensions, the engine decides which rules apply
//! and notifies the extensions once per matching rule set.
//!
//! # Example
//!
//! ```ignore
//! use hermes_rules::prelude::*;
//!
//! let registry = Arc::new(ExtensionRegistry::new());
//! registry.register("audit", |args| Ok(Box::new(Audit::new(args.sdk))));
//!
//! let config = EngineConfig::from_file("rules.json")?;
//! let engine = RuleEngine::new(config, sdk, registry)?;
//!
//! let summary = engine.enable().await?;
//! engine.disable().await?;
//! ```
//!
//! Predicates compose with operators:
//!
//! ```ignore
//! let predicate = Expr::variable("returning") & !Expr::contains("segments", "blocked");
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod extension;
pub mod host;
pub mod operators;
pub mod predicate;
pub mod registry;
pub mod rule;
pub mod sdk;

/// Prelude module - import everything you need with `use hermes_rules::prelude::*`
pub mod prelude {
    pub use crate::config::{EngineConfig, PredicateConfig};
    pub use crate::context::{Context, Supplier, VariableMap};
    pub use crate::engine::{DispatchSummary, EXTENSION_NAMESPACE, LoadedExtension, RuleEngine};
    pub use crate::error::{ConfigError, EngineError, EngineResult, RuleError};
    pub use crate::extension::{Extension, ExtensionArgs, ExtensionFactory};
    pub use crate::host::{DefaultHost, LoadSignal, MemoryStorage, StaticTab, TracingLogger};
    pub use crate::operators::Expr;
    pub use crate::predicate::{
        And, BoxedPredicate, Constant, Contains, Not, Or, Predicate, Variable, all_of, any_of,
    };
    pub use crate::registry::ExtensionRegistry;
    pub use crate::rule::{Rule, RuleSet};
    pub use crate::sdk::{Handle, Host, Location, Logger, Sdk, Storage, Tab};
}
