//! Orchestration engine.
//!
//! The engine instantiates the configured extensions once, orders them by
//! priority, and drives one match-and-apply cycle per [`RuleEngine::enable`]:
//!
//! 1. every extension's `enable` hook runs, and all must succeed;
//! 2. a fresh [`Context`] is built from the extensions' variables;
//! 3. each page pattern matching the current path schedules its rule sets,
//!    all of which are evaluated concurrently;
//! 4. within a rule set, rules are tested in order and the first match is
//!    applied by every extension.
//!
//! Factory failures are isolated per extension. Every hook in a batch is
//! started and driven to completion even when a sibling fails; the batch
//! then fails with the first error in priority order. Rule sets scheduled
//! by one dispatch are settled the same way.

use crate::config::EngineConfig;
use crate::context::{Context, VariableMap};
use crate::error::{EngineError, EngineResult};
use crate::extension::{Extension, ExtensionArgs, ExtensionFactory};
use crate::predicate::{BoxedPredicate, Predicate, all_of};
use crate::registry::ExtensionRegistry;
use crate::rule::{Rule, RuleSet};
use crate::sdk::{Logger, Sdk};
use futures::future::join_all;
use std::future::Future;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

/// Namespace segment under which every extension's SDK view is nested.
pub const EXTENSION_NAMESPACE: &str = "extension";

/// An instantiated extension together with its registration name.
pub struct LoadedExtension {
    name: String,
    extension: Box<dyn Extension>,
}

impl LoadedExtension {
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn enable(&self, path: &str) -> EngineResult<()> {
        self.extension
            .enable(path)
            .await
            .map_err(|source| self.hook_error("enable", source))
    }

    async fn apply(&self, rule: &Rule, context: &Context) -> EngineResult<()> {
        self.extension
            .apply(rule, context)
            .await
            .map_err(|source| self.hook_error("apply", source))
    }

    async fn disable(&self) -> EngineResult<()> {
        self.extension
            .disable()
            .await
            .map_err(|source| self.hook_error("disable", source))
    }

    fn hook_error(&self, hook: &'static str, source: anyhow::Error) -> EngineError {
        EngineError::Hook {
            extension: self.name.clone(),
            hook,
            source,
        }
    }
}

struct Page {
    pattern: Regex,
    rule_sets: Vec<RuleSet>,
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Path the cycle ran against
    pub path: String,
    /// Patterns that matched the path, in declaration order
    pub matched_patterns: Vec<String>,
    /// Name of the rule each scheduled rule set applied, if any
    pub applied_rules: Vec<Option<String>>,
}

/// Rule matching and dispatch engine.
pub struct RuleEngine {
    extensions: Vec<(String, Value)>,
    pages: Vec<Page>,
    on_page_load: bool,
    sdk: Sdk,
    logger: Arc<dyn Logger>,
    registry: Arc<ExtensionRegistry>,
    loaded: OnceLock<Vec<LoadedExtension>>,
}

impl RuleEngine {
    /// Create an engine, compiling every page pattern.
    pub fn new(config: EngineConfig, sdk: Sdk, registry: Arc<ExtensionRegistry>) -> EngineResult<Self> {
        let pages = config
            .pages
            .into_iter()
            .map(|(pattern, rule_sets)| {
                Regex::new(&pattern)
                    .map(|pattern| Page { pattern, rule_sets })
                    .map_err(|source| EngineError::InvalidPattern { pattern, source })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self {
            extensions: config.extensions,
            pages,
            on_page_load: config.on_page_load,
            logger: sdk.get_logger(&[]),
            sdk,
            registry,
            loaded: OnceLock::new(),
        })
    }

    /// Register an extension factory with this engine's registry.
    ///
    /// Only effective before the engine first instantiates its extensions.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ExtensionArgs) -> anyhow::Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
    }

    /// Run one match-and-apply cycle for the current path.
    ///
    /// With `onPageLoad` set and the document still loading, the returned
    /// future waits for the tab to finish loading and only then dispatches,
    /// so it resolves with the summary of that deferred cycle.
    pub async fn enable(&self) -> EngineResult<DispatchSummary> {
        if self.on_page_load && self.sdk.tab.is_loading() {
            self.logger.debug("Waiting for the page to load.");
            self.sdk.tab.ready().await;
        }

        self.run().await
    }

    async fn run(&self) -> EngineResult<DispatchSummary> {
        let path = self.sdk.tab.location().path();
        let extensions = self.extensions();

        settle_all(extensions.iter().map(|extension| extension.enable(&path))).await?;

        let context = self.create_context();

        let mut summary = DispatchSummary {
            path: path.clone(),
            ..DispatchSummary::default()
        };

        let mut pending = Vec::new();

        for page in self.pages.iter().filter(|page| page.pattern.is_match(&path)) {
            self.logger
                .debug(&format!("Pattern \"{}\" matches path \"{}\".", page.pattern, path));

            summary.matched_patterns.push(page.pattern.to_string());

            pending.extend(
                page.rule_sets
                    .iter()
                    .map(|rule_set| self.apply_rule_set(rule_set, &context)),
            );
        }

        summary.applied_rules = settle_all(pending)
            .await?
            .into_iter()
            .map(|applied| applied.map(|rule| rule.name.clone()))
            .collect();

        Ok(summary)
    }

    /// Tear down every extension.
    ///
    /// The cached extensions are kept, so a later `enable` reuses them.
    pub async fn disable(&self) -> EngineResult<()> {
        settle_all(self.extensions().iter().map(|extension| extension.disable())).await?;

        Ok(())
    }

    /// Apply the first rule of `rule_set` whose predicate holds.
    ///
    /// Rules after the first match are never evaluated. Returns the
    /// applied rule, if any.
    pub async fn apply_rule_set<'a>(
        &self,
        rule_set: &'a RuleSet,
        context: &Context,
    ) -> EngineResult<Option<&'a Rule>> {
        let extensions = self.extensions();

        for rule in &rule_set.rules {
            let predicate = self.predicate(rule);

            self.logger
                .debug(&format!("Evaluating rule \"{}\": {}.", rule.name, predicate));

            let matched = predicate.test(context).await?;

            self.logger.debug(&format!(
                "Rule \"{}\" {}.",
                rule.name,
                if matched { "matches" } else { "does not match" }
            ));

            if !matched {
                continue;
            }

            settle_all(extensions.iter().map(|extension| extension.apply(rule, context))).await?;

            return Ok(Some(rule));
        }

        Ok(None)
    }

    /// Conjunction of every extension's predicate for `rule`.
    pub fn predicate(&self, rule: &Rule) -> BoxedPredicate {
        all_of(
            self.extensions()
                .iter()
                .filter_map(|loaded| loaded.extension.predicate(rule))
                .collect(),
        )
    }

    /// Context merging every extension's variables, later priorities winning.
    pub fn create_context(&self) -> Context {
        let mut variables = VariableMap::new();

        for loaded in self.extensions() {
            variables.extend(loaded.extension.variables());
        }

        Context::new(variables)
    }

    /// Extensions in call order, instantiated on first use.
    pub fn extensions(&self) -> &[LoadedExtension] {
        self.loaded.get_or_init(|| self.load_extensions())
    }

    fn load_extensions(&self) -> Vec<LoadedExtension> {
        let mut loaded = Vec::new();

        for (name, options) in &self.extensions {
            let Some(factory) = self.registry.get(name) else {
                self.logger.error(&format!("Unknown extension \"{}\".", name));
                continue;
            };

            if let Some(extension) = self.instantiate(name, options, factory) {
                loaded.push(LoadedExtension {
                    name: name.clone(),
                    extension,
                });

                self.logger.debug(&format!("Extension \"{}\" initialized.", name));
            }
        }

        // Stable, so equal priorities keep declaration order
        loaded.sort_by_key(|loaded| loaded.extension.priority());

        loaded
    }

    fn instantiate(&self, name: &str, options: &Value, factory: ExtensionFactory) -> Option<Box<dyn Extension>> {
        let options = match options {
            Value::Bool(false) => {
                self.logger
                    .warn(&format!("Extension \"{}\" is declared but not enabled", name));
                return None;
            }
            Value::Bool(true) => Map::new(),
            Value::Object(options) => options.clone(),
            other => {
                self.logger.error(&format!(
                    "Invalid options for extension \"{}\", expected either boolean or object but got {}",
                    name,
                    describe(other)
                ));
                return None;
            }
        };

        let args = ExtensionArgs {
            options,
            sdk: self.sdk.scoped([EXTENSION_NAMESPACE, name]),
        };

        match factory(args) {
            Ok(extension) => Some(extension),
            Err(error) => {
                self.logger
                    .error(&format!("Failed to initialize extension \"{}\": {:#}", name, error));
                None
            }
        }
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("extensions", &self.extensions)
            .field("pages", &self.pages.iter().map(|page| page.pattern.as_str()).collect::<Vec<_>>())
            .field("on_page_load", &self.on_page_load)
            .finish()
    }
}

// Drive every future to completion, then report the first failure in
// iteration order.
async fn settle_all<I, F, T>(futures: I) -> EngineResult<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = EngineResult<T>>,
{
    join_all(futures).await.into_iter().collect()
}

// Human-readable description of an invalid options value.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(number) if number.is_i64() || number.is_u64() => {
            format!("integer ({})", number)
        }
        Value::Number(number) => format!("number ({})", number),
        Value::String(text) => format!("string ({:?})", text),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
