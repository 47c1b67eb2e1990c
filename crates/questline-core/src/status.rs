//! Status values for tasks, objectives, and quests.

use serde::{Deserialize, Serialize};

/// Status of a task or objective.
///
/// Completed and Failed are both terminal; Failed only clears on an
/// explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProgressStatus {
    /// No progress has been made
    #[default]
    NotStarted,
    /// At least one element of progress has been made
    InProgress,
    /// All required elements have been completed
    Completed,
    /// Failed; cannot progress until reset
    Failed,
}

impl ProgressStatus {
    /// Returns true for NotStarted and InProgress.
    #[must_use]
    pub const fn is_incomplete(self) -> bool {
        matches!(self, Self::NotStarted | Self::InProgress)
    }

    /// Returns true for Completed and Failed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_incomplete()
    }

    /// Short lowercase name, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Status of a quest for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuestStatus {
    /// Never accepted (or removed). Only returned by play state queries,
    /// never held by a live quest state.
    #[default]
    Unavailable,
    /// Accepted and not yet finished
    InProgress,
    /// All required objectives completed
    Completed,
    /// An active objective failed
    Failed,
}

impl QuestStatus {
    /// Returns true for Completed and Failed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Short lowercase name, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}
