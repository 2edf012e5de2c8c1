//! Built-in extensions shipped with the host process.
//!
//! - `conditions` exports static variables and turns each rule's
//!   `condition` property into a predicate
//! - `audit` records every applied rule

use async_trait::async_trait;
use hermes_rules::context::constant;
use hermes_rules::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Rule property holding a predicate document.
pub const CONDITION_PROPERTY: &str = "condition";

/// Tab storage key listing the applied rule names.
pub const APPLIED_KEY: &str = "applied";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionOptions {
    priority: i32,
    variables: Map<String, Value>,
}

/// Evaluates the `condition` property of each rule.
pub struct ConditionExtension {
    options: ConditionOptions,
    logger: Arc<dyn Logger>,
}

impl ConditionExtension {
    pub fn new(args: ExtensionArgs) -> anyhow::Result<Self> {
        let options = serde_json::from_value(Value::Object(args.options))?;

        Ok(Self {
            options,
            logger: args.sdk.get_logger(&[]),
        })
    }
}

#[async_trait]
impl Extension for ConditionExtension {
    fn priority(&self) -> i32 {
        self.options.priority
    }

    fn variables(&self) -> VariableMap {
        self.options
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), constant(value.clone())))
            .collect()
    }

    fn predicate(&self, rule: &Rule) -> Option<BoxedPredicate> {
        let condition = rule.property(CONDITION_PROPERTY)?;

        let built = serde_json::from_value::<PredicateConfig>(condition.clone())
            .map_err(|e| e.to_string())
            .and_then(|config| config.build().map_err(|e| e.to_string()));

        match built {
            Ok(predicate) => Some(predicate),
            Err(error) => {
                // A malformed condition never matches
                self.logger
                    .warn(&format!("Invalid condition on rule \"{}\": {}", rule.name, error));
                Some(Arc::new(Constant(false)))
            }
        }
    }
}

/// Logs and records every applied rule.
pub struct AuditExtension {
    logger: Arc<dyn Logger>,
    storage: Arc<dyn Storage>,
}

impl AuditExtension {
    pub fn new(args: ExtensionArgs) -> Self {
        Self {
            logger: args.sdk.get_logger(&[]),
            storage: args.sdk.get_tab_storage(&[]),
        }
    }

    /// Rule names recorded so far, oldest first.
    pub fn applied(&self) -> Vec<String> {
        read_applied(self.storage.as_ref())
    }
}

#[async_trait]
impl Extension for AuditExtension {
    async fn enable(&self, path: &str) -> anyhow::Result<()> {
        self.logger.debug(&format!("Auditing dispatch for \"{}\".", path));
        Ok(())
    }

    async fn apply(&self, rule: &Rule, _context: &Context) -> anyhow::Result<()> {
        self.logger.info(&format!("Applied rule \"{}\".", rule.name));

        let mut applied = read_applied(self.storage.as_ref());
        applied.push(rule.name.clone());
        self.storage
            .set_item(APPLIED_KEY, &serde_json::to_string(&applied)?);

        Ok(())
    }
}

fn read_applied(storage: &dyn Storage) -> Vec<String> {
    storage
        .get_item(APPLIED_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Registry holding every built-in extension.
pub fn builtin_registry() -> Arc<ExtensionRegistry> {
    let registry = Arc::new(ExtensionRegistry::new());

    registry.register("conditions", |args| Ok(Box::new(ConditionExtension::new(args)?)));
    registry.register("audit", |args| Ok(Box::new(AuditExtension::new(args))));

    registry
}
