//! Driver configuration.
//!
//! Where to find quest definitions and session scripts, how to drive the
//! play state, and the embedded `[play_state]` table. Configuration can be
//! loaded from and saved to a file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use questline_core::PlayStateConfig;

/// Configuration file name.
pub const CONFIG_FILE: &str = "questline.toml";

/// Driver configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestlineConfig {
    /// Directory holding quest definition files
    pub quest_path: PathBuf,
    /// Abort on the first invalid quest definition instead of skipping it
    pub strict_definitions: bool,
    /// Session script to replay (None = just load and report)
    pub session_path: Option<PathBuf>,
    /// Seconds per simulated frame when replaying ticks
    pub tick_interval: f32,
    /// Log every delivered quest event
    pub log_events: bool,
    /// Play state settings
    pub play_state: PlayStateConfig,
}

impl Default for QuestlineConfig {
    fn default() -> Self {
        Self {
            quest_path: PathBuf::from(crate::quest_loader::DEFAULT_QUEST_PATH),
            strict_definitions: false,
            session_path: None,
            tick_interval: 1.0 / 60.0,
            log_events: true,
            play_state: PlayStateConfig::default(),
        }
    }
}

impl QuestlineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        if !self.tick_interval.is_finite() {
            self.tick_interval = 1.0 / 60.0;
        }
        self.tick_interval = self.tick_interval.clamp(0.001, 1.0);
        self.play_state.validate();
    }

    /// Resolves a configured path relative to the config file's directory.
    #[must_use]
    pub fn resolve(config_path: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        config_path
            .parent()
            .map_or_else(|| path.to_path_buf(), |dir| dir.join(path))
    }
}
