//! Error types for Questline.

use thiserror::Error;

use crate::ids::{ObjectiveId, QuestId, TaskId};

/// Malformed schema version string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid schema version {input:?}, expected MAJOR.MINOR.PATCH")]
pub struct VersionParseError {
    /// Text that failed to parse
    pub input: String,
}

/// Inconsistent quest definition data, reported when definitions are
/// registered rather than while quests are running.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    /// Two definitions share a quest identifier
    #[error("Duplicate quest definition: {0}")]
    DuplicateQuest(QuestId),

    /// Two objectives in one quest share an identifier
    #[error("Duplicate objective {objective} in quest {quest}")]
    DuplicateObjective {
        /// Owning quest
        quest: QuestId,
        /// Repeated objective identifier
        objective: ObjectiveId,
    },

    /// Two tasks in one quest share an identifier
    #[error("Duplicate task {task} in quest {quest}")]
    DuplicateTask {
        /// Owning quest
        quest: QuestId,
        /// Repeated task identifier
        task: TaskId,
    },

    /// Numeric target with min above max
    #[error("Task {task} in quest {quest} has invalid range {min}..={max}")]
    InvalidRange {
        /// Owning quest
        quest: QuestId,
        /// Offending task
        task: TaskId,
        /// Range minimum
        min: i32,
        /// Range maximum
        max: i32,
    },

    /// Time limit that is zero, negative, or not finite
    #[error("Task {task} in quest {quest} has invalid time limit {limit}")]
    InvalidTimeLimit {
        /// Owning quest
        quest: QuestId,
        /// Offending task
        task: TaskId,
        /// Time limit in seconds
        limit: f32,
    },

    /// Identifier left blank
    #[error("Empty identifier in quest {0}")]
    EmptyIdentifier(QuestId),
}
