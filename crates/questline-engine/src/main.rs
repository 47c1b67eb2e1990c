//! # Questline
//!
//! Loads quest definitions, builds a play state, and replays a session
//! script against it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use questline_core::PlayState;
use questline_engine::{
    EventLogger, QuestLoader, QuestlineConfig, SessionRunner, SessionScript, CONFIG_FILE,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("questline=info".parse()?))
        .init();

    info!("Questline starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let mut config = QuestlineConfig::load_from(&config_path);
    config.validate();

    let quest_path = QuestlineConfig::resolve(&config_path, &config.quest_path);
    let mut loader = QuestLoader::new(&quest_path).with_strict(config.strict_definitions);
    loader
        .load_all()
        .with_context(|| format!("loading quests from {}", quest_path.display()))?;
    let stats = loader.stats().clone();
    info!(
        "Loaded {} quests from {} files ({} files failed, {} invalid definitions)",
        stats.quests_loaded, stats.files_loaded, stats.files_failed, stats.validation_errors
    );

    let mut state = PlayState::new(loader.into_library(), config.play_state.clone());
    if config.log_events {
        state.subscribe(EventLogger);
    }

    let auto_accepted = state.refresh_auto_accept();
    if !auto_accepted.is_empty() {
        info!("Auto-accepted {} quests", auto_accepted.len());
    }

    if let Some(session_path) = &config.session_path {
        let session_path = QuestlineConfig::resolve(&config_path, session_path);
        let script = SessionScript::load(&session_path)
            .with_context(|| format!("loading session {}", session_path.display()))?;
        let report = SessionRunner::new(config.tick_interval).run(&mut state, &script);
        report.log();
    } else {
        info!("No session configured");
    }

    for quest in state.accepted_quests() {
        info!("Active: {} ({})", quest.id(), quest.title());
    }
    for quest in state.archived_quests() {
        info!("Archived: {} [{}]", quest.id(), quest.status().as_str());
    }

    info!("Questline shutdown complete");
    Ok(())
}
