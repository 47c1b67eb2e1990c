//! Task runtime state.
//!
//! A task is the leaf of the progress tree. It only knows about itself:
//! every mutation reports whether the task's status changed, and the owning
//! objective re-aggregates when it did.

use std::sync::Arc;

use questline_common::TaskId;
use tracing::debug;

use crate::definition::TaskDefinition;
use crate::events::Cascade;
use crate::status::ProgressStatus;

/// Result of applying numeric progress to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProgress {
    /// Number still required after the change
    pub outstanding: i32,
    /// Whether the task's status changed
    pub status_changed: bool,
}

/// Progress state of one task for one player.
#[derive(Debug, Clone)]
pub struct TaskState {
    definition: Arc<TaskDefinition>,
    status: ProgressStatus,
    number: i32,
    elapsed: f32,
    hidden: bool,
}

impl TaskState {
    pub(crate) fn new(definition: Arc<TaskDefinition>) -> Self {
        let number = definition.target.map_or(0, |t| t.min);
        Self {
            definition,
            status: ProgressStatus::NotStarted,
            number,
            elapsed: 0.0,
            hidden: false,
        }
    }

    /// Returns the task definition.
    #[must_use]
    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    /// Returns the task identifier.
    #[must_use]
    pub fn id(&self) -> &TaskId {
        &self.definition.id
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.definition.title
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    /// Returns the current number.
    #[must_use]
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Returns the number at which the task completes (1 if not numeric).
    #[must_use]
    pub fn target_number(&self) -> i32 {
        self.definition.target.map_or(1, |t| t.max)
    }

    /// Returns how many "things" are still left to do.
    #[must_use]
    pub fn number_outstanding(&self) -> i32 {
        match self.definition.target {
            Some(target) => (target.max - self.number).max(0),
            None => i32::from(self.status != ProgressStatus::Completed),
        }
    }

    /// Returns seconds spent while incomplete.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Returns seconds left before the task fails, if time-limited.
    #[must_use]
    pub fn time_remaining(&self) -> Option<f32> {
        self.definition
            .time_limit
            .map(|limit| (limit - self.elapsed).max(0.0))
    }

    /// Returns whether the task has a time limit.
    #[must_use]
    pub fn is_time_limited(&self) -> bool {
        self.definition.time_limit.is_some()
    }

    /// Returns whether the task counts toward its objective.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.definition.mandatory
    }

    /// Returns whether the task has a numeric range.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.definition.target.is_some()
    }

    /// Returns true if neither completed nor failed.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.status.is_incomplete()
    }

    /// Returns true if completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Returns true if failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == ProgressStatus::Failed
    }

    /// Whether the task should currently be hidden from the player.
    ///
    /// True for mandatory incomplete tasks of a sequential objective that
    /// come after the first outstanding one. Recomputed on every cascade.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Marks the task failed. Idempotent once failed.
    pub(crate) fn fail(&mut self, cx: &mut Cascade<'_>) -> bool {
        if self.status == ProgressStatus::Failed {
            return false;
        }
        debug!("Task {} in quest {} failed", self.id(), cx.quest());
        self.status = ProgressStatus::Failed;
        cx.task_failed(&self.definition.id);
        true
    }

    /// Marks the task completed, filling its number to the target.
    ///
    /// No-op when already completed, and when failed (failure only clears
    /// on reset).
    pub(crate) fn complete(&mut self, cx: &mut Cascade<'_>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if let Some(target) = self.definition.target {
            self.number = target.max;
        }
        debug!("Task {} in quest {} completed", self.id(), cx.quest());
        self.status = ProgressStatus::Completed;
        cx.task_completed(&self.definition.id);
        true
    }

    /// Adds `delta` to the number, clamped to the task's range.
    ///
    /// Returns `None` for tasks without a numeric range; nothing changes and
    /// no event is raised.
    pub(crate) fn progress(&mut self, delta: i32, cx: &mut Cascade<'_>) -> Option<TaskProgress> {
        let value = self.number.saturating_add(delta);
        self.set_number(value, cx)
    }

    /// Sets the number directly, clamped to the task's range.
    pub(crate) fn set_number(&mut self, value: i32, cx: &mut Cascade<'_>) -> Option<TaskProgress> {
        let target = self.definition.target?;

        if self.status.is_terminal() {
            return Some(TaskProgress {
                outstanding: self.number_outstanding(),
                status_changed: false,
            });
        }

        let value = target.clamp(value);
        if value != self.number {
            self.number = value;
            cx.task_updated(&self.definition.id);
        }

        let status_changed = if self.number >= target.max {
            self.complete(cx)
        } else if self.number > target.min && self.status == ProgressStatus::NotStarted {
            self.status = ProgressStatus::InProgress;
            true
        } else {
            false
        };

        Some(TaskProgress {
            outstanding: self.number_outstanding(),
            status_changed,
        })
    }

    /// Advances the time limit clock. Returns true if the task timed out.
    pub(crate) fn tick(&mut self, delta_time: f32, cx: &mut Cascade<'_>) -> bool {
        let Some(limit) = self.definition.time_limit else {
            return false;
        };
        if !self.status.is_incomplete() {
            return false;
        }

        self.elapsed += delta_time;
        if self.elapsed > limit {
            debug!(
                "Task {} in quest {} ran out of time ({:.2}s > {:.2}s)",
                self.id(),
                cx.quest(),
                self.elapsed,
                limit
            );
            self.fail(cx)
        } else {
            false
        }
    }

    /// Returns the task to its initial state. Returns true if the status
    /// changed.
    pub(crate) fn reset(&mut self) -> bool {
        let changed = self.status != ProgressStatus::NotStarted;
        self.status = ProgressStatus::NotStarted;
        self.number = self.definition.target.map_or(0, |t| t.min);
        self.elapsed = 0.0;
        changed
    }
}
