//! Quest definition loading.
//!
//! This module provides:
//! - Loading quest definitions from assets/quests/*.toml
//! - Schema version checks on every file
//! - Validation through the quest library on registration
//! - Load statistics

use std::fs;
use std::path::{Path, PathBuf};

use questline_common::{DefinitionError, SchemaVersion};
use questline_core::{
    ObjectiveDefinition, QuestCompletion, QuestDefinition, QuestLibrary, TaskDefinition,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default asset path for quest definitions.
pub const DEFAULT_QUEST_PATH: &str = "assets/quests";

/// Errors that can occur during quest loading.
#[derive(Debug, Error)]
pub enum QuestLoadError {
    /// Directory or file not found.
    #[error("Quest path not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read quest file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse quest TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Definition rejected by the library.
    #[error("Invalid quest definition: {0}")]
    Definition(#[from] DefinitionError),

    /// File written for a schema this loader cannot read.
    #[error("Unsupported quest file version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version string found in the file
        found: String,
        /// Version this loader reads
        supported: SchemaVersion,
    },
}

/// Result type for quest loading operations.
pub type QuestLoadResult<T> = Result<T, QuestLoadError>;

/// A task as it appears in a quest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTask {
    /// Identifier, unique within the quest.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Whether the task counts toward its objective.
    #[serde(default = "default_true")]
    pub mandatory: bool,
    /// Starting number for countable tasks.
    #[serde(default)]
    pub min: i32,
    /// Target number; present only for countable tasks.
    #[serde(default)]
    pub max: Option<i32>,
    /// Time limit in seconds.
    #[serde(default)]
    pub time_limit: Option<f32>,
}

/// An objective as it appears in a quest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObjective {
    /// Identifier, unique within the quest.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Branch tag.
    #[serde(default)]
    pub branch: Option<String>,
    /// All mandatory tasks required rather than any one.
    #[serde(default = "default_true")]
    pub all_mandatory_tasks_required: bool,
    /// Mandatory tasks are done in order.
    #[serde(default = "default_true")]
    pub sequential: bool,
    /// Description while not completed.
    #[serde(default)]
    pub description: String,
    /// Description once completed.
    #[serde(default)]
    pub description_completed: String,
    /// Tasks in order.
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

/// A quest as it appears in a quest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuest {
    /// Unique quest identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Description while not completed.
    #[serde(default)]
    pub description: String,
    /// Description once completed.
    #[serde(default)]
    pub description_completed: String,
    /// Branch completion policy.
    #[serde(default)]
    pub completion: QuestCompletion,
    /// Accept once prerequisites complete.
    #[serde(default)]
    pub auto_accept: bool,
    /// Quests that must be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Objectives in order.
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
}

fn default_true() -> bool {
    true
}

impl RawTask {
    fn into_definition(self) -> TaskDefinition {
        let mut task = TaskDefinition::new(self.id, self.title).mandatory(self.mandatory);
        if let Some(max) = self.max {
            task = task.with_target(self.min, max);
        }
        if let Some(limit) = self.time_limit {
            task = task.with_time_limit(limit);
        }
        task
    }
}

impl RawObjective {
    fn into_definition(self) -> ObjectiveDefinition {
        let mut objective = ObjectiveDefinition::new(self.id, self.title)
            .all_mandatory_required(self.all_mandatory_tasks_required)
            .sequential(self.sequential)
            .with_descriptions(self.description, self.description_completed);
        if let Some(branch) = self.branch {
            objective = objective.in_branch(branch);
        }
        self.tasks
            .into_iter()
            .fold(objective, |objective, task| {
                objective.with_task(task.into_definition())
            })
    }
}

impl RawQuest {
    /// Converts to a core quest definition.
    #[must_use]
    pub fn into_definition(self) -> QuestDefinition {
        let quest = QuestDefinition::new(self.id, self.title)
            .with_descriptions(self.description, self.description_completed)
            .with_completion(self.completion)
            .auto_accept(self.auto_accept);
        let quest = self
            .prerequisites
            .into_iter()
            .fold(quest, |quest, id| quest.with_prerequisite(id));
        self.objectives
            .into_iter()
            .fold(quest, |quest, objective| {
                quest.with_objective(objective.into_definition())
            })
    }
}

/// A collection of quests from a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestFile {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Quests in this file.
    #[serde(default)]
    pub quests: Vec<RawQuest>,
}

fn default_version() -> String {
    SchemaVersion::QUEST_DEFINITION.to_string()
}

impl QuestFile {
    /// Parses a quest file and checks its schema version.
    pub fn parse(content: &str) -> QuestLoadResult<Self> {
        let file: Self = toml::from_str(content)?;
        let unsupported = || QuestLoadError::UnsupportedVersion {
            found: file.version.clone(),
            supported: SchemaVersion::QUEST_DEFINITION,
        };
        let version: SchemaVersion = file.version.parse().map_err(|_| unsupported())?;
        if !SchemaVersion::QUEST_DEFINITION.can_read(&version) {
            return Err(unsupported());
        }
        Ok(file)
    }
}

/// Statistics for the quest loader.
#[derive(Debug, Default, Clone)]
pub struct QuestLoaderStats {
    /// Number of files loaded.
    pub files_loaded: u32,
    /// Number of files that could not be read or parsed.
    pub files_failed: u32,
    /// Number of quests registered.
    pub quests_loaded: u32,
    /// Number of quests rejected by validation.
    pub validation_errors: u32,
}

/// Loads quest definition files into a [`QuestLibrary`].
#[derive(Debug)]
pub struct QuestLoader {
    /// Base path for quest files.
    base_path: PathBuf,
    /// Definitions loaded so far.
    library: QuestLibrary,
    /// Fail on the first invalid quest instead of skipping it.
    strict: bool,
    /// Statistics.
    stats: QuestLoaderStats,
}

impl QuestLoader {
    /// Creates a new quest loader.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        info!("Initializing quest loader at: {:?}", base_path);

        Self {
            base_path,
            library: QuestLibrary::new(),
            strict: false,
            stats: QuestLoaderStats::default(),
        }
    }

    /// Creates a loader with default path.
    #[must_use]
    pub fn with_default_path() -> Self {
        Self::new(DEFAULT_QUEST_PATH)
    }

    /// Makes an invalid quest an error rather than a logged skip.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the definitions loaded so far.
    #[must_use]
    pub fn library(&self) -> &QuestLibrary {
        &self.library
    }

    /// Consumes the loader, returning its library.
    #[must_use]
    pub fn into_library(self) -> QuestLibrary {
        self.library
    }

    /// Returns loader statistics.
    #[must_use]
    pub fn stats(&self) -> &QuestLoaderStats {
        &self.stats
    }

    /// Loads every `.toml` file in the base path, in file name order.
    ///
    /// Files that fail to load are logged and counted, not fatal. In strict
    /// mode the first failing file aborts the load with its error.
    pub fn load_all(&mut self) -> QuestLoadResult<()> {
        if !self.base_path.is_dir() {
            return Err(QuestLoadError::NotFound(self.base_path.clone()));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.base_path)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        for path in paths {
            if let Err(e) = self.load_file(&path) {
                warn!("Failed to load quest file {:?}: {}", path, e);
                self.stats.files_failed += 1;
                if self.strict {
                    return Err(e);
                }
            }
        }

        info!(
            "Loaded {} quests from {} files",
            self.stats.quests_loaded, self.stats.files_loaded
        );

        Ok(())
    }

    /// Loads quests from a single file. Returns the number registered.
    pub fn load_file(&mut self, path: &Path) -> QuestLoadResult<u32> {
        debug!("Loading quest file: {:?}", path);

        if !path.exists() {
            return Err(QuestLoadError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let loaded = self.load_str(&content, &path.display().to_string())?;

        self.stats.files_loaded += 1;
        debug!("Loaded {} quests from {:?}", loaded, path);
        Ok(loaded)
    }

    /// Loads quests from TOML text. `source` names the text in logs.
    pub fn load_str(&mut self, content: &str, source: &str) -> QuestLoadResult<u32> {
        let file = QuestFile::parse(content)?;

        let mut loaded_count = 0;
        for raw in file.quests {
            let id = raw.id.clone();
            match self.library.insert(raw.into_definition()) {
                Ok(()) => loaded_count += 1,
                Err(e) => {
                    warn!("Invalid quest {} in {}: {}", id, source, e);
                    self.stats.validation_errors += 1;
                    if self.strict {
                        self.stats.quests_loaded += loaded_count;
                        return Err(e.into());
                    }
                },
            }
        }

        self.stats.quests_loaded += loaded_count;
        Ok(loaded_count)
    }
}
