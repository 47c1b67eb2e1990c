//! Objective runtime state.
//!
//! An objective owns its tasks and derives its status from theirs. Every
//! operation that can change a task reports back whether the objective's
//! own status changed, so the owning quest knows when to re-aggregate.

use std::sync::Arc;

use questline_common::{BranchId, ObjectiveId, TaskId};
use tracing::debug;

use crate::definition::ObjectiveDefinition;
use crate::events::Cascade;
use crate::status::ProgressStatus;
use crate::task::TaskState;

/// Progress state of one objective for one player.
#[derive(Debug, Clone)]
pub struct ObjectiveState {
    definition: Arc<ObjectiveDefinition>,
    status: ProgressStatus,
    tasks: Vec<TaskState>,
    mandatory_tasks_needed_to_complete: usize,
}

impl ObjectiveState {
    /// Builds the task states and runs one aggregation pass.
    ///
    /// An objective requiring all mandatory tasks but having none completes
    /// right here, since zero completed tasks satisfies zero needed.
    pub(crate) fn new(definition: Arc<ObjectiveDefinition>, cx: &mut Cascade<'_>) -> Self {
        let tasks: Vec<TaskState> = definition
            .tasks
            .iter()
            .map(|def| TaskState::new(Arc::clone(def)))
            .collect();

        let mandatory_tasks_needed_to_complete = if definition.all_mandatory_tasks_required {
            definition.mandatory_task_count()
        } else {
            1
        };

        let mut objective = Self {
            definition,
            status: ProgressStatus::NotStarted,
            tasks,
            mandatory_tasks_needed_to_complete,
        };
        objective.notify_task_status_changed(cx);
        objective
    }

    /// Returns the objective definition.
    #[must_use]
    pub fn definition(&self) -> &ObjectiveDefinition {
        &self.definition
    }

    /// Returns the objective identifier.
    #[must_use]
    pub fn id(&self) -> &ObjectiveId {
        &self.definition.id
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.definition.title
    }

    /// Returns the branch tag, if any.
    #[must_use]
    pub fn branch(&self) -> Option<&BranchId> {
        self.definition.branch.as_ref()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    /// Returns the tasks in definition order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskState] {
        &self.tasks
    }

    /// Finds a task by identifier.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&TaskState> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    /// Number of completed mandatory tasks needed for completion.
    #[must_use]
    pub fn mandatory_tasks_needed_to_complete(&self) -> usize {
        self.mandatory_tasks_needed_to_complete
    }

    /// Returns whether mandatory tasks are sequential.
    #[must_use]
    pub fn are_tasks_sequential(&self) -> bool {
        self.definition.sequential_tasks
    }

    /// Returns whether all mandatory tasks are required.
    #[must_use]
    pub fn are_all_mandatory_tasks_required(&self) -> bool {
        self.definition.all_mandatory_tasks_required
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

    /// Description for the current status.
    ///
    /// Only a completed objective shows the completed text, even when that
    /// text is blank.
    #[must_use]
    pub fn description(&self) -> &str {
        match self.status {
            ProgressStatus::Completed => &self.definition.description_when_completed,
            ProgressStatus::NotStarted | ProgressStatus::InProgress | ProgressStatus::Failed => {
                &self.definition.description_when_active
            },
        }
    }

    /// First mandatory incomplete task in definition order, hidden or not.
    #[must_use]
    pub fn next_mandatory_task(&self) -> Option<&TaskState> {
        self.tasks
            .iter()
            .find(|t| t.is_mandatory() && t.is_incomplete())
    }

    /// Tasks that are neither completed nor failed.
    #[must_use]
    pub fn incomplete_tasks(&self) -> Vec<&TaskState> {
        self.tasks.iter().filter(|t| t.is_incomplete()).collect()
    }

    /// Tasks that are completed.
    #[must_use]
    pub fn completed_tasks(&self) -> Vec<&TaskState> {
        self.tasks.iter().filter(|t| t.is_completed()).collect()
    }

    /// Tasks that have failed.
    #[must_use]
    pub fn failed_tasks(&self) -> Vec<&TaskState> {
        self.tasks.iter().filter(|t| t.is_failed()).collect()
    }

    pub(crate) fn task_index(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id() == id)
    }

    pub(crate) fn task_mut(&mut self, index: usize) -> Option<&mut TaskState> {
        self.tasks.get_mut(index)
    }

    /// Re-derives hidden flags and status from the tasks.
    ///
    /// Returns true if the objective's status changed.
    pub(crate) fn notify_task_status_changed(&mut self, cx: &mut Cascade<'_>) -> bool {
        let sequential = self.definition.sequential_tasks;
        let mut mandatory_completed = 0usize;
        let mut mandatory_failed = 0usize;
        let mut mandatory_incomplete = 0usize;

        for task in &mut self.tasks {
            task.set_hidden(false);
            if !task.is_mandatory() {
                continue;
            }
            match task.status() {
                ProgressStatus::Completed => mandatory_completed += 1,
                ProgressStatus::Failed => mandatory_failed += 1,
                ProgressStatus::NotStarted | ProgressStatus::InProgress => {
                    if sequential && mandatory_incomplete > 0 {
                        task.set_hidden(true);
                    }
                    mandatory_incomplete += 1;
                },
            }
        }

        let status = if mandatory_failed > 0 {
            ProgressStatus::Failed
        } else if mandatory_completed >= self.mandatory_tasks_needed_to_complete {
            ProgressStatus::Completed
        } else if mandatory_completed > 0 {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        };

        self.change_status(status, cx)
    }

    fn change_status(&mut self, status: ProgressStatus, cx: &mut Cascade<'_>) -> bool {
        if self.status == status {
            return false;
        }

        debug!(
            "Objective {} in quest {}: {} -> {}",
            self.id(),
            cx.quest(),
            self.status.as_str(),
            status.as_str()
        );
        self.status = status;

        match status {
            ProgressStatus::Completed => cx.objective_completed(&self.definition.id),
            ProgressStatus::Failed => cx.objective_failed(&self.definition.id),
            ProgressStatus::NotStarted | ProgressStatus::InProgress => {},
        }
        true
    }

    /// Applies a mutation to one task and re-aggregates if the task's status
    /// changed.
    ///
    /// Returns true if the objective's status changed. Batch operations call
    /// this once per task so the owning quest can settle between tasks.
    pub(crate) fn update_task(
        &mut self,
        index: usize,
        cx: &mut Cascade<'_>,
        f: impl FnOnce(&mut TaskState, &mut Cascade<'_>) -> bool,
    ) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            return false;
        };
        if f(task, cx) {
            self.notify_task_status_changed(cx)
        } else {
            false
        }
    }
}
