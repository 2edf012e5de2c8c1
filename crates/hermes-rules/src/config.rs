//! JSON configuration for the engine and for predicates.
//!
//! Declaration order of `extensions` and `pages` is meaningful (it breaks
//! priority ties and drives fan-out order), so both are kept as ordered
//! entry lists rather than hash maps.

use crate::error::{ConfigError, RuleError};
use crate::predicate::{And, BoxedPredicate, Constant, Contains, Not, Or, Variable};
use crate::rule::RuleSet;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

/// Engine configuration document.
///
/// ```json
/// {
///   "extensions": {"audit": true, "conditions": {"priority": -1}},
///   "pages": {"^/checkout": [{"rules": [{"name": "promo", "properties": {}}]}]},
///   "onPageLoad": true
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Extension name to options (`false`, `true` or an object)
    #[serde(deserialize_with = "ordered_entries")]
    pub extensions: Vec<(String, Value)>,

    /// Regular expression source to the rule sets applied on matching paths
    #[serde(deserialize_with = "ordered_entries")]
    pub pages: Vec<(String, Vec<RuleSet>)>,

    /// Defer dispatch until the document finishes loading
    #[serde(default)]
    pub on_page_load: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn with_extension(mut self, name: impl Into<String>, options: impl Into<Value>) -> Self {
        self.extensions.push((name.into(), options.into()));
        self
    }

    pub fn with_page(mut self, pattern: impl Into<String>, rule_sets: Vec<RuleSet>) -> Self {
        self.pages.push((pattern.into(), rule_sets));
        self
    }

    pub fn with_page_load(mut self, on_page_load: bool) -> Self {
        self.on_page_load = on_page_load;
        self
    }
}

fn ordered_entries<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));

            while let Some((key, value)) = map.next_entry::<String, T>()? {
                match entries.iter().position(|(existing, _): &(String, T)| *existing == key) {
                    // Later duplicates win, as in a JSON object
                    Some(index) => entries[index].1 = value,
                    None => entries.push((key, value)),
                }
            }

            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

/// JSON representation of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredicateConfig {
    /// A fixed outcome
    Constant { value: bool },
    /// A variable that must be exactly `true`
    Variable { name: String },
    /// A list variable that must contain `value`
    Contains { name: String, value: Value },
    /// Negation of a predicate
    Not { predicate: Box<PredicateConfig> },
    /// AND combination of two or more predicates
    And { predicates: Vec<PredicateConfig> },
    /// OR combination of two or more predicates
    Or { predicates: Vec<PredicateConfig> },
}

impl PredicateConfig {
    pub fn variable(name: impl Into<String>) -> Self {
        PredicateConfig::Variable { name: name.into() }
    }

    pub fn contains(name: impl Into<String>, value: impl Into<Value>) -> Self {
        PredicateConfig::Contains {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn not(predicate: PredicateConfig) -> Self {
        PredicateConfig::Not {
            predicate: Box::new(predicate),
        }
    }

    pub fn and(predicates: Vec<PredicateConfig>) -> Self {
        PredicateConfig::And { predicates }
    }

    pub fn or(predicates: Vec<PredicateConfig>) -> Self {
        PredicateConfig::Or { predicates }
    }

    /// Build the predicate tree.
    pub fn build(&self) -> Result<BoxedPredicate, RuleError> {
        let predicate: BoxedPredicate = match self {
            PredicateConfig::Constant { value } => Arc::new(Constant(*value)),
            PredicateConfig::Variable { name } => Arc::new(Variable::new(name.clone())),
            PredicateConfig::Contains { name, value } => {
                Arc::new(Contains::new(name.clone(), value.clone()))
            }
            PredicateConfig::Not { predicate } => Arc::new(Not(predicate.build()?)),
            PredicateConfig::And { predicates } => {
                let (left, right, rest) = Self::operands("and", predicates)?;
                Arc::new(And::new(left, right, rest))
            }
            PredicateConfig::Or { predicates } => {
                let (left, right, rest) = Self::operands("or", predicates)?;
                Arc::new(Or::new(left, right, rest))
            }
        };

        Ok(predicate)
    }

    /// Validate a configuration without building it.
    ///
    /// Returns every problem found, or an empty list.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.validate_recursive(&mut errors);
        errors
    }

    fn validate_recursive(&self, errors: &mut Vec<String>) {
        match self {
            PredicateConfig::Constant { .. } => {}
            PredicateConfig::Variable { name } | PredicateConfig::Contains { name, .. } => {
                if name.is_empty() {
                    errors.push("Empty variable name".to_string());
                }
            }
            PredicateConfig::Not { predicate } => predicate.validate_recursive(errors),
            PredicateConfig::And { predicates } | PredicateConfig::Or { predicates } => {
                if predicates.len() < 2 {
                    errors.push(format!(
                        "AND/OR requires at least two predicates, got {}",
                        predicates.len()
                    ));
                }
                for predicate in predicates {
                    predicate.validate_recursive(errors);
                }
            }
        }
    }

    fn operands(
        operator: &str,
        predicates: &[PredicateConfig],
    ) -> Result<(BoxedPredicate, BoxedPredicate, Vec<BoxedPredicate>), RuleError> {
        let mut built = predicates
            .iter()
            .map(PredicateConfig::build)
            .collect::<Result<Vec<_>, _>>()?;

        if built.len() < 2 {
            return Err(RuleError::InvalidPredicate(format!(
                "\"{}\" requires at least two predicates, got {}",
                operator,
                built.len()
            )));
        }

        let rest = built.split_off(2);
        let right = built.remove(1);
        let left = built.remove(0);

        Ok((left, right, rest))
    }
}
