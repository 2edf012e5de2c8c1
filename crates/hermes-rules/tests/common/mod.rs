//! Recording collaborators shared by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hermes_rules::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Ordered record of observable calls.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, with the prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logger keeping every message.
#[derive(Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| *recorded == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn logged(&self, level: Level, needle: &str) -> bool {
        self.messages(level).iter().any(|message| message.contains(needle))
    }

    fn push(&self, level: Level, message: &str) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

/// Host recording which namespaces were requested.
#[derive(Default)]
pub struct RecordingHost {
    pub logger: Arc<RecordingLogger>,
    requests: Mutex<Vec<(&'static str, Vec<String>)>>,
}

impl RecordingHost {
    pub fn requests(&self, kind: &str) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| *recorded == kind)
            .map(|(_, namespace)| namespace.clone())
            .collect()
    }

    fn request(&self, kind: &'static str, namespace: &[String]) {
        self.requests.lock().unwrap().push((kind, namespace.to_vec()));
    }
}

impl Host for RecordingHost {
    fn logger(&self, namespace: &[String]) -> Arc<dyn Logger> {
        self.request("logger", namespace);
        self.logger.clone()
    }

    fn tab_storage(&self, namespace: &[String]) -> Arc<dyn Storage> {
        self.request("tab", namespace);
        Arc::new(MemoryStorage::new())
    }

    fn browser_storage(&self, namespace: &[String]) -> Arc<dyn Storage> {
        self.request("browser", namespace);
        Arc::new(MemoryStorage::new())
    }
}

/// Predicate with a fixed outcome that journals each evaluation.
pub struct Recorded {
    label: String,
    outcome: bool,
    journal: Journal,
}

#[async_trait]
impl Predicate for Recorded {
    async fn test(&self, _context: &Context) -> Result<bool, RuleError> {
        self.journal.record(format!("test:{}", self.label));
        Ok(self.outcome)
    }

    async fn print(&self, _context: &Context) -> Result<String, RuleError> {
        Ok(self.to_string())
    }
}

impl fmt::Display for Recorded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recorded({} = {})", self.label, self.outcome)
    }
}

/// Configurable extension journaling every hook it receives.
#[derive(Clone)]
pub struct Probe {
    pub name: String,
    pub journal: Journal,
    pub priority: Option<i32>,
    /// Rule name to predicate outcome; other rules get no predicate
    pub outcomes: HashMap<String, bool>,
    /// Rule name to an arbitrary predicate
    pub predicates: HashMap<String, BoxedPredicate>,
    pub variables: Vec<(String, Value)>,
    /// Hook name that fails with "<hook> failed"
    pub fail_on: Option<&'static str>,
}

impl Probe {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            priority: None,
            outcomes: HashMap::new(),
            predicates: HashMap::new(),
            variables: Vec::new(),
            fail_on: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn outcome(mut self, rule: &str, outcome: bool) -> Self {
        self.outcomes.insert(rule.to_string(), outcome);
        self
    }

    pub fn predicate(mut self, rule: &str, predicate: BoxedPredicate) -> Self {
        self.predicates.insert(rule.to_string(), predicate);
        self
    }

    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.push((name.to_string(), value.into()));
        self
    }

    pub fn failing(mut self, hook: &'static str) -> Self {
        self.fail_on = Some(hook);
        self
    }

    fn hook(&self, hook: &str, detail: &str) -> anyhow::Result<()> {
        self.journal.record(format!("{}:{}{}", hook, self.name, detail));

        if self.fail_on == Some(hook) {
            anyhow::bail!("{} failed", hook);
        }

        Ok(())
    }
}

#[async_trait]
impl Extension for Probe {
    async fn enable(&self, path: &str) -> anyhow::Result<()> {
        self.hook("enable", &format!("@{}", path))
    }

    fn priority(&self) -> i32 {
        self.journal.record(format!("priority:{}", self.name));
        self.priority.unwrap_or_default()
    }

    fn variables(&self) -> VariableMap {
        self.journal.record(format!("variables:{}", self.name));

        self.variables
            .iter()
            .map(|(name, value)| (name.clone(), hermes_rules::context::constant(value.clone())))
            .collect()
    }

    fn predicate(&self, rule: &Rule) -> Option<BoxedPredicate> {
        self.journal.record(format!("predicate:{}@{}", self.name, rule.name));

        if let Some(predicate) = self.predicates.get(&rule.name) {
            return Some(predicate.clone());
        }

        self.outcomes.get(&rule.name).map(|outcome| {
            Arc::new(Recorded {
                label: format!("{}@{}", self.name, rule.name),
                outcome: *outcome,
                journal: self.journal.clone(),
            }) as BoxedPredicate
        })
    }

    async fn apply(&self, rule: &Rule, _context: &Context) -> anyhow::Result<()> {
        self.hook("apply", &format!("@{}", rule.name))
    }

    async fn disable(&self) -> anyhow::Result<()> {
        self.hook("disable", "")
    }
}

/// Everything a test needs to drive an engine.
pub struct Harness {
    pub registry: Arc<ExtensionRegistry>,
    pub host: Arc<RecordingHost>,
    pub journal: Journal,
    path: String,
}

impl Harness {
    pub fn new(path: &str) -> Self {
        Self {
            registry: Arc::new(ExtensionRegistry::new()),
            host: Arc::new(RecordingHost::default()),
            journal: Journal::default(),
            path: path.to_string(),
        }
    }

    /// Register a probe under its own name.
    pub fn register(&self, probe: Probe) {
        let journal = self.journal.clone();
        let name = probe.name.clone();

        self.registry.register(name.clone(), move |_| {
            journal.record(format!("create:{}", name));
            Ok(Box::new(probe.clone()))
        });
    }

    pub fn sdk(&self) -> Sdk {
        Sdk::new(
            Arc::new(StaticTab::new(Location::parse(&self.path))),
            self.host.clone(),
        )
    }

    pub fn engine(&self, config: EngineConfig) -> RuleEngine {
        RuleEngine::new(config, self.sdk(), self.registry.clone()).unwrap()
    }

    pub fn logger(&self) -> &RecordingLogger {
        &self.host.logger
    }
}

pub fn rule_set(names: &[&str]) -> RuleSet {
    RuleSet::new(names.iter().map(|name| Rule::new(*name)).collect())
}
