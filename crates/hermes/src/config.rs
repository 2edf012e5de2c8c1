//! Configuration for the Hermes host process

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Hermes configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (development, staging, production)
    pub environment: String,

    /// Path of the rules document
    pub rules_path: PathBuf,

    /// Navigation path to dispatch against, query and fragment included
    pub path: String,

    /// Simulated time until the document finishes loading, if any
    pub loading: Option<Duration>,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            rules_path: PathBuf::from(
                env::var("HERMES_RULES").unwrap_or_else(|_| "rules.json".to_string()),
            ),
            path: env::var("HERMES_PATH").unwrap_or_else(|_| "/".to_string()),
            loading: env::var("HERMES_LOADING")
                .ok()
                .and_then(|v| parse_loading(&v)),
            log_format: match env::var("HERMES_LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

// "true" means a short default delay, a number is milliseconds.
fn parse_loading(value: &str) -> Option<Duration> {
    match value.trim() {
        "" | "0" | "false" => None,
        "true" => Some(Duration::from_millis(100)),
        millis => millis.parse().ok().map(Duration::from_millis),
    }
}
