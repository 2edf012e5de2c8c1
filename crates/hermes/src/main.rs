//! Hermes - rule dispatch host
//!
//! Loads a rules document, dispatches it once against a navigation path
//! with the built-in extensions, then tears the extensions down.

mod config;
mod extensions;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use hermes_rules::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LogFormat};
use crate::extensions::builtin_registry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hermes=debug,hermes_rules=debug".into());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!("Starting Hermes");
    tracing::info!("Environment: {}", config.environment);

    let rules = EngineConfig::from_file(&config.rules_path)
        .with_context(|| format!("Failed to load {}", config.rules_path.display()))?;

    let location = Location::parse(&config.path);
    let tab = match config.loading {
        Some(delay) => {
            let (tab, signal) = StaticTab::loading(location);

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                tracing::debug!("Document loaded");
                signal.complete();
            });

            tab
        }
        None => StaticTab::new(location),
    };

    let sdk = Sdk::new(Arc::new(tab), Arc::new(DefaultHost::new()));
    let engine = RuleEngine::new(rules, sdk, builtin_registry())?;

    let summary = engine.enable().await?;

    tracing::info!(
        path = %summary.path,
        patterns = ?summary.matched_patterns,
        "Dispatch complete"
    );

    for (index, applied) in summary.applied_rules.iter().enumerate() {
        match applied {
            Some(rule) => tracing::info!("Rule set {} applied \"{}\"", index, rule),
            None => tracing::info!("Rule set {} applied nothing", index),
        }
    }

    engine.disable().await?;

    tracing::info!("Hermes shutdown complete");
    Ok(())
}
