//! Error types for rule evaluation and engine dispatch.

use thiserror::Error;

/// Errors raised while evaluating predicates against a context.
///
/// This type is `Clone` because a variable's outcome is memoized and
/// shared by every predicate that reads it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A variable supplier failed
    #[error("Failed to resolve variable \"{name}\": {message}")]
    Variable { name: String, message: String },

    /// A predicate configuration is malformed
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
}

impl RuleError {
    pub(crate) fn variable(name: &str, cause: &anyhow::Error) -> Self {
        RuleError::Variable {
            name: name.to_string(),
            message: format!("{:#}", cause),
        }
    }
}

/// Errors raised by the orchestration engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A page pattern is not a valid regular expression
    #[error("Invalid page pattern \"{pattern}\": {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An extension lifecycle hook failed
    #[error("Extension \"{extension}\" failed on {hook}: {source:#}")]
    Hook {
        extension: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A rule predicate failed outside of an `and`/`or` composite
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Errors raised while loading an engine configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON or has the wrong shape
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
