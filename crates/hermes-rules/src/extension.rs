//! Extension capabilities.
//!
//! An extension may implement any subset of the hooks below. Every hook
//! has a no-op default, so a missing capability is never an error.

use crate::context::{Context, VariableMap};
use crate::predicate::BoxedPredicate;
use crate::rule::Rule;
use crate::sdk::Sdk;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Pluggable collaborator driven by the engine.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Called once per dispatch with the current path, before any rule
    /// is evaluated.
    async fn enable(&self, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Lower priorities run first; ties keep declaration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Variables exported into the dispatch context.
    fn variables(&self) -> VariableMap {
        VariableMap::new()
    }

    /// This extension's condition for `rule`, if it has one.
    fn predicate(&self, _rule: &Rule) -> Option<BoxedPredicate> {
        None
    }

    /// Called for the first matching rule of each rule set.
    async fn apply(&self, _rule: &Rule, _context: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn disable(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Arguments handed to an extension factory.
#[derive(Debug, Clone)]
pub struct ExtensionArgs {
    /// Options declared for the extension, `{}` when declared as `true`
    pub options: Map<String, Value>,
    /// SDK view namespaced under `extension:<name>`
    pub sdk: Sdk,
}

/// Builds an extension from its arguments.
pub type ExtensionFactory =
    Arc<dyn Fn(ExtensionArgs) -> anyhow::Result<Box<dyn Extension>> + Send + Sync>;
